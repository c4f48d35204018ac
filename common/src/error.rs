//! Error type.
//!

/// Errors raised by the frame pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame geometry or plane layout cannot be converted safely.
    #[error("invalid frame: {message}")]
    InvalidFrame { message: String },

    /// Configuration rejected at construction time.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Caller-provided output buffer does not match the crop dimensions.
    #[error("output buffer holds {actual} bytes, expected {expected}")]
    OutputSize { expected: usize, actual: usize },

    /// The processing worker is gone.
    #[error("pipeline is closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: msg.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: msg.into(),
        }
    }
}
