//! # bleconf-client
//!
//! Async client for driving a bleconf device over a stream transport
//! (the agent's TCP stand-in for the BLE notify/write pair).
//!
//! Responses are correlated by command id: the protocol allows one
//! in-flight request per command, and unsolicited push frames
//! (access-point lists, OTA progress, property changes) are delivered
//! separately through a broadcast channel.

pub mod client;
pub mod connection;
pub mod error;

pub use client::{Client, ConnectResult};
pub use connection::{Connection, ConnectionConfig, PushEvent};
pub use error::ClientError;
