use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: isize, len: usize },
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for argument-class failures (malformed input, shape mismatch, unknown name).
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Error::InvalidArgument(_) | Error::InvalidShape(_))
    }

    pub fn is_state_error(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }

    pub fn is_index_error(&self) -> bool {
        matches!(self, Error::IndexOutOfBounds { .. })
    }

    /// Prefix the message with `context`, keeping the error kind.
    pub(crate) fn context(self, context: &str) -> Self {
        match self {
            Error::InvalidArgument(m) => Error::InvalidArgument(format!("{context}: {m}")),
            Error::InvalidShape(m) => Error::InvalidShape(format!("{context}: {m}")),
            Error::InvalidState(m) => Error::InvalidState(format!("{context}: {m}")),
            Error::Unsupported(m) => Error::Unsupported(format!("{context}: {m}")),
            Error::Serialization(m) => Error::Serialization(format!("{context}: {m}")),
            e @ Error::IndexOutOfBounds { .. } => e,
        }
    }
}
