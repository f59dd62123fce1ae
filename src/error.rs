//! Error types and result aliases for the obsy SDK.
//!
//! This module defines the core error type [`ObsyError`] and the [`Result`] type alias
//! used throughout the library. All public APIs that can fail return `Result<T>` for
//! consistent error handling.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObsyError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Sink error: {0}")]
    SinkError(String),
}

pub type Result<T> = std::result::Result<T, ObsyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ObsyError::ApiError("rate limit exceeded".to_string());
        assert_eq!(err.to_string(), "API error: rate limit exceeded");
    }

    #[test]
    fn test_sink_error_display() {
        let err = ObsyError::SinkError("collector unreachable".to_string());
        assert_eq!(err.to_string(), "Sink error: collector unreachable");
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: ObsyError = json_err.into();

        match err {
            ObsyError::SerializationError(_) => {}
            _ => panic!("Expected SerializationError"),
        }
    }

    #[test]
    fn test_error_debug() {
        let err = ObsyError::ApiError("test".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("ApiError"));
    }
}
