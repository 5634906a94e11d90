use bridge_traits::BridgeError;
use core_library::LibraryError;
use core_lock::LockError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Provider transport error: {0}")]
    Transport(String),

    /// An apply step rolled back; `message` names the record that failed.
    #[error("{message}")]
    ReconciliationStep { step: String, message: String },

    #[error("Lock '{key}' is held by another instance")]
    LockAcquisition { key: String },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Scheduling error: {0}")]
    Scheduling(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        SyncError::Transport(err.to_string())
    }
}

impl From<LibraryError> for SyncError {
    fn from(err: LibraryError) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<LockError> for SyncError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::AcquisitionFailed { key } => SyncError::LockAcquisition { key },
            LockError::Store(message) => SyncError::Database(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_contention_maps_to_lock_acquisition() {
        let err: SyncError = LockError::AcquisitionFailed {
            key: "pda-sync".to_string(),
        }
        .into();

        assert!(matches!(err, SyncError::LockAcquisition { ref key } if key == "pda-sync"));
    }

    #[test]
    fn test_bridge_error_is_transport() {
        let err: SyncError = BridgeError::OperationFailed("timeout".to_string()).into();

        assert!(matches!(err, SyncError::Transport(_)));
        assert!(err.to_string().contains("timeout"));
    }
}
