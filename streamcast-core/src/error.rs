//! Error types for streamcast.
//!
//! Configuration errors are detected eagerly at the call that violates the
//! contract. Errors raised by stream methods themselves are never wrapped:
//! they belong to the stream trait's own signature and travel back to the
//! caller unchanged.

use thiserror::Error;

/// A boxed error type for stream methods that want dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Misconfiguration detected by the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Malformed input, such as binding a default type that realizes no
    /// stream trait.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A structurally disallowed call, such as registering a stream that is
    /// owned by a lifecycle binding.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A collaborator broke its contract, such as a default factory that
    /// produced no instance.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl StreamError {
    /// Shorthand for [`StreamError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        StreamError::InvalidArgument(message.into())
    }

    /// Shorthand for [`StreamError::InvalidOperation`].
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        StreamError::InvalidOperation(message.into())
    }

    /// Shorthand for [`StreamError::InvalidState`].
    pub fn invalid_state(message: impl Into<String>) -> Self {
        StreamError::InvalidState(message.into())
    }
}
