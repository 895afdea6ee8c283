//! Domain-specific error types for prediction-form

use thiserror::Error;

/// Main error type for the prediction form client and stub service
#[derive(Error, Debug)]
pub enum PredictionFormError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Prediction service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Schema error: {message}")]
    Schema { message: String },

    #[error("Malformed response: {message}")]
    Response { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("A prediction request is already in flight")]
    Busy,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PredictionFormError {
    /// Failures worth offering a retry for (transport and upstream status).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PredictionFormError::Network { .. }
                | PredictionFormError::Http { .. }
                | PredictionFormError::Busy
        )
    }
}

impl From<anyhow::Error> for PredictionFormError {
    fn from(err: anyhow::Error) -> Self {
        PredictionFormError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PredictionFormError {
    fn from(err: serde_json::Error) -> Self {
        PredictionFormError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for PredictionFormError {
    fn from(err: toml::de::Error) -> Self {
        PredictionFormError::Config {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for PredictionFormError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return PredictionFormError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        if err.is_decode() {
            return PredictionFormError::Response {
                message: err.to_string(),
            };
        }
        PredictionFormError::Network {
            message: format!("HTTP request failed: {}", err),
        }
    }
}

/// Result type alias for prediction-form operations
pub type Result<T> = std::result::Result<T, PredictionFormError>;
