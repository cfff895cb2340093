use thiserror::Error;

/// Top-level error type for the Confer system.
///
/// Each variant wraps a subsystem-specific failure. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for ConferError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConferError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Assistant error: {0}")]
    Assistant(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for ConferError {
    fn from(err: toml::de::Error) -> Self {
        ConferError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ConferError {
    fn from(err: toml::ser::Error) -> Self {
        ConferError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ConferError {
    fn from(err: serde_json::Error) -> Self {
        ConferError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Confer operations.
pub type Result<T> = std::result::Result<T, ConferError>;
