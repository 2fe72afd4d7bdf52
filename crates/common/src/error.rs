use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynclineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type SynclineResult<T> = Result<T, SynclineError>;
