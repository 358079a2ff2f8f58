use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("A duplicate scan is already running")]
    AlreadyRunning,

    #[error("No duplicate scan has completed yet")]
    NoResultsYet,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Collapse a listing failure into `StorageUnavailable`, keeping its message.
    pub fn into_unavailable(self) -> Error {
        match self {
            Error::StorageUnavailable(_) => self,
            other => Error::StorageUnavailable(other.to_string()),
        }
    }
}
