use thiserror::Error;

use crate::error::ErrorClass;

/// Failure of a single request/response exchange.
///
/// The channel never retries on its own. Whether to try again is the
/// caller's decision, driven by [`ChannelError::class`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("request timed out")]
    Timeout,

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ChannelError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ChannelError::Timeout | ChannelError::ConnectionRefused(_) => ErrorClass::Transient,
            ChannelError::Protocol(_) => ErrorClass::ProtocolViolation,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class().is_retryable()
    }
}
