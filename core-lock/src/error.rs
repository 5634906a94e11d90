use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    /// Another owner holds a live lease on `key`.
    #[error("Lock '{key}' is held by another instance")]
    AcquisitionFailed { key: String },

    #[error("Lock store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for LockError {
    fn from(err: sqlx::Error) -> Self {
        LockError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
