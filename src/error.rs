use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Main error type for the Meridian hit propagation service
#[derive(Debug)]
pub enum MeridianError {
    /// Configuration or CLI argument errors
    Config(String),

    /// The multi-region aggregator has been stopped
    Shutdown,

    /// Failure handing a batch to one region
    Dispatch(String),

    /// API/HTTP related errors
    Api(String),

    /// Transport layer errors
    Transport(String),

    /// System I/O errors
    Io(std::io::Error),

    /// JSON serialization/deserialization errors
    Serialization(serde_json::Error),
}

impl fmt::Display for MeridianError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeridianError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MeridianError::Shutdown => write!(f, "Multi-region manager has been shut down"),
            MeridianError::Dispatch(msg) => write!(f, "Dispatch error: {}", msg),
            MeridianError::Api(msg) => write!(f, "API error: {}", msg),
            MeridianError::Transport(msg) => write!(f, "Transport error: {}", msg),
            MeridianError::Io(err) => write!(f, "I/O error: {}", err),
            MeridianError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for MeridianError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeridianError::Io(err) => Some(err),
            MeridianError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, MeridianError>;

impl IntoResponse for MeridianError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.user_message(),
                "type": self.error_type(),
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl MeridianError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            MeridianError::Config(_) => StatusCode::BAD_REQUEST,
            MeridianError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
            MeridianError::Dispatch(_) => StatusCode::BAD_GATEWAY,
            MeridianError::Api(_) => StatusCode::BAD_REQUEST,
            MeridianError::Transport(_) => StatusCode::BAD_GATEWAY,
            MeridianError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MeridianError::Serialization(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            MeridianError::Config(msg) => format!("Configuration error: {}", msg),
            MeridianError::Shutdown => {
                "Service is shutting down. Please try again later.".to_string()
            }
            MeridianError::Dispatch(_) | MeridianError::Transport(_) => {
                "Upstream region unavailable. Please try again later.".to_string()
            }
            MeridianError::Api(msg) => format!("Invalid request: {}", msg),
            MeridianError::Io(_) => "Internal server error. Please try again later.".to_string(),
            MeridianError::Serialization(_) => {
                "Data processing error. Please check your request format.".to_string()
            }
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            MeridianError::Config(_) => "configuration_error",
            MeridianError::Shutdown => "shutdown",
            MeridianError::Dispatch(_) => "dispatch_error",
            MeridianError::Api(_) => "api_error",
            MeridianError::Transport(_) => "transport_error",
            MeridianError::Io(_) => "io_error",
            MeridianError::Serialization(_) => "serialization_error",
        }
    }
}

// Conversions from common error types
impl From<std::io::Error> for MeridianError {
    fn from(err: std::io::Error) -> Self {
        MeridianError::Io(err)
    }
}

impl From<serde_json::Error> for MeridianError {
    fn from(err: serde_json::Error) -> Self {
        MeridianError::Serialization(err)
    }
}

impl From<reqwest::Error> for MeridianError {
    fn from(err: reqwest::Error) -> Self {
        MeridianError::Transport(err.to_string())
    }
}

impl From<url::ParseError> for MeridianError {
    fn from(err: url::ParseError) -> Self {
        MeridianError::Config(format!("Invalid url: {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::MeridianError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MeridianError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! dispatch_error {
    ($msg:expr) => {
        $crate::error::MeridianError::Dispatch($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MeridianError::Dispatch(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! api_error {
    ($msg:expr) => {
        $crate::error::MeridianError::Api($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MeridianError::Api(format!($fmt, $($arg)*))
    };
}
