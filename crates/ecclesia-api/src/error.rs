//! Error types for ecclesia-api

use ecclesia_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {message}")]
    Decode { message: String },

    #[error("Could not build HTTP client: {message}")]
    Build { message: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode {
                message: err.to_string(),
            }
        } else {
            ApiError::Transport {
                message: err.to_string(),
            }
        }
    }
}

impl From<ApiError> for CoreError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport { message } => CoreError::Network { message },
            ApiError::Status { status, message } => CoreError::Backend { status, message },
            ApiError::Decode { message } => CoreError::Decode { message },
            ApiError::Build { message } => CoreError::ConfigError { message },
        }
    }
}
