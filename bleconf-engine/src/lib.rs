//! # bleconf-engine
//!
//! The provisioning protocol engine: consumes raw transport bytes,
//! reassembles and validates frames, enforces the token authorization
//! gate, dispatches commands to handlers, and emits chunked responses
//! through an outbound channel.
//!
//! The engine is transport-agnostic: whatever owns the radio (or a TCP
//! stand-in) feeds received bytes into [`Engine::handle_bytes`] and
//! drains the outbound receiver through [`chunker::pump`].

pub mod auth;
pub mod chunker;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod session;
pub mod store;

pub use auth::{AuthGate, AuthOutcome};
pub use config::{Config, ConfigError};
pub use device::{hash_authorization, random_salt, DeviceControl, HubGateway, WifiControl};
pub use engine::Engine;
pub use error::EngineError;
pub use session::EngineState;
pub use store::{DeviceSettings, FileStore, MemoryStore, PersistedState, SettingsStore};
