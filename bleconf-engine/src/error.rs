//! Engine error types.

use bleconf_protocol::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the engine and its settings store.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("settings store I/O: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error("settings store format: {0}")]
    StoreFormat(#[from] serde_json::Error),
}
