use thiserror::Error;

/// Main error type for SML operations
#[derive(Error, Debug)]
pub enum SmlError {
    #[error("source error: {0}")]
    Source(#[from] std::io::Error),

    #[error("read timed out")]
    Timeout,

    #[error("invalid frame: {0}")]
    Framing(String),

    #[error("invalid token: {0}")]
    Token(String),

    #[error("invalid message: {0}")]
    Schema(String),

    #[error("invalid SML file: {0}")]
    File(String),
}

impl SmlError {
    /// Whether the reader may discard the current frame and resume scanning
    /// for the next start marker instead of surfacing the error.
    ///
    /// Source errors and timeouts are terminal for the byte source and are
    /// never retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Framing(_) | Self::Token(_) | Self::Schema(_) | Self::File(_)
        )
    }
}

/// Result type alias for SML operations
pub type SmlResult<T> = Result<T, SmlError>;
