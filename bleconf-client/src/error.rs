//! Client error types.

use bleconf_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timed out")]
    Timeout,

    #[error("command {command} failed with status {status}")]
    CommandFailed { command: u8, status: u8 },

    #[error("hub rejected the request with HTTP status {http_code}")]
    HubRejected { http_code: i16 },

    #[error("malformed response for command {command}")]
    MalformedResponse { command: u8 },
}

impl ClientError {
    /// Whether retrying the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout | ClientError::ConnectionClosed | ClientError::Io(_)
        )
    }
}
