use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShuttleDbError {
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Missing cached statement: {0}")]
    MissingStatement(String),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),
}
