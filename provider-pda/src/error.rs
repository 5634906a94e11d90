//! Error types for the PDA provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// PDA provider errors
#[derive(Error, Debug)]
pub enum PdaError {
    /// API request returned a non-success status
    #[error("PDA API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Body was not a valid snapshot
    #[error("Failed to parse PDA snapshot: {0}")]
    ParseError(String),

    /// Local snapshot file could not be read
    #[error("Failed to read snapshot file {path}: {message}")]
    FileError { path: String, message: String },

    /// Provider settings are incomplete
    #[error("PDA provider misconfigured: {0}")]
    Configuration(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for PDA operations
pub type Result<T> = std::result::Result<T, PdaError>;

impl From<PdaError> for BridgeError {
    fn from(error: PdaError) -> Self {
        match error {
            PdaError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            PdaError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            PdaError::FileError { path, message } => {
                BridgeError::OperationFailed(format!("Snapshot file {}: {}", path, message))
            }
            PdaError::Configuration(msg) => BridgeError::NotAvailable(msg),
            PdaError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PdaError::ApiError {
            status_code: 401,
            message: "invalid key".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "PDA API error (status 401): invalid key"
        );
    }

    #[test]
    fn test_error_conversion() {
        let bridge_error: BridgeError = PdaError::ParseError("truncated".to_string()).into();
        assert!(matches!(bridge_error, BridgeError::OperationFailed(ref m) if m.contains("truncated")));

        let bridge_error: BridgeError = PdaError::Configuration("no base url".to_string()).into();
        assert!(matches!(bridge_error, BridgeError::NotAvailable(_)));
    }
}
