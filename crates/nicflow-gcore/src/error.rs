//! Gcore backend error types

use nicflow_core::ApiError;
use thiserror::Error;

/// Backend messages that no amount of retrying will change
///
/// Matching on message text is a stopgap until the API reports structured
/// error codes; extend this list as new permanent failures are observed.
pub const PERMANENT_ERROR_MARKERS: &[&str] = &["port security must be enabled"];

#[derive(Error, Debug)]
pub enum GcoreError {
    #[error("Environment variable not set: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Gcore API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gcore API returned no task for {0}")]
    MissingTask(String),

    #[error("Invalid interface definition: {0}")]
    Decode(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl GcoreError {
    /// Whether retrying the same request cannot succeed
    pub fn is_permanent(&self) -> bool {
        match self {
            GcoreError::Api { status, message } => {
                matches!(status, 401 | 403) || is_permanent_message(message)
            }
            GcoreError::Http(err) => err.is_builder() || err.is_decode(),
            GcoreError::MissingEnvVar(_)
            | GcoreError::InvalidConfig(_)
            | GcoreError::MissingTask(_)
            | GcoreError::Decode(_)
            | GcoreError::JsonError(_) => true,
        }
    }
}

fn is_permanent_message(message: &str) -> bool {
    let message = message.to_lowercase();
    PERMANENT_ERROR_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

impl From<GcoreError> for ApiError {
    fn from(err: GcoreError) -> Self {
        if err.is_permanent() {
            ApiError::Permanent(err.to_string())
        } else {
            ApiError::Transient(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, GcoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> GcoreError {
        GcoreError::Api {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_port_security_message_is_permanent() {
        let err: ApiError =
            api(400, "Port security must be enabled to use allowed address pairs").into();
        assert!(err.is_permanent());
    }

    #[test]
    fn test_not_found_is_transient() {
        let err: ApiError = api(404, "Port abc not found").into();
        assert!(!err.is_permanent());
        assert!(err.message().contains("Port abc not found"));

        let err: ApiError = api(409, "Instance is locked").into();
        assert!(!err.is_permanent());
    }

    #[test]
    fn test_auth_failures_are_permanent() {
        assert!(api(401, "Invalid token").is_permanent());
        assert!(api(403, "Forbidden").is_permanent());
    }
}
