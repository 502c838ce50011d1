//! Error types for flowgate.
//!
//! Remote-side failures (dispatch errors, failed executions, timeouts) are
//! captured in [`crate::engine::ExecutionResult`] and never surface here.
//! The `Error` enum covers programmer misuse and infrastructure faults only,
//! each with a code that callers can branch on programmatically.

use thiserror::Error;

/// Result type alias for flowgate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// flowgate error types.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Execution(_) => "EXECUTION_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Convert to a structured JSON response.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Execution("x".into()).code(), "EXECUTION_ERROR");
        assert_eq!(Error::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(Error::Config("x".into()).code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_error_to_json() {
        let json = Error::Validation("workflow id is empty".into()).to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("workflow id is empty"));
    }
}
