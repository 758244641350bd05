//! Error types for ecclesia-core
//!
//! Failures fall into three families: transport failures talking to the
//! back office, validation failures reported by the back office, and local
//! precondition violations that are rejected before any request is made.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown when a failure carries nothing more useful
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Transport failure
    NetworkError,
    /// Back office rejected the request
    BackendError,
    /// Local validation error
    ValidationError,
    /// Module is not one the report engine recognizes
    UnknownModule,
    /// Export attempted with no columns selected
    NoFieldsSelected,
    /// Column key not offered by the report
    UnknownField,
    /// No report has been generated yet
    NoReport,
    /// Start date after end date
    InvalidDateRange,
    /// Capability check refused the action
    Unauthorized,
    /// Response body did not have the expected shape
    DecodeError,
    /// IO error
    IoError,
    /// Configuration error
    ConfigError,
    /// Internal error
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::NetworkError => write!(f, "NETWORK_ERROR"),
            ErrorCode::BackendError => write!(f, "BACKEND_ERROR"),
            ErrorCode::ValidationError => write!(f, "VALIDATION_ERROR"),
            ErrorCode::UnknownModule => write!(f, "UNKNOWN_MODULE"),
            ErrorCode::NoFieldsSelected => write!(f, "NO_FIELDS_SELECTED"),
            ErrorCode::UnknownField => write!(f, "UNKNOWN_FIELD"),
            ErrorCode::NoReport => write!(f, "NO_REPORT"),
            ErrorCode::InvalidDateRange => write!(f, "INVALID_DATE_RANGE"),
            ErrorCode::Unauthorized => write!(f, "UNAUTHORIZED"),
            ErrorCode::DecodeError => write!(f, "DECODE_ERROR"),
            ErrorCode::IoError => write!(f, "IO_ERROR"),
            ErrorCode::ConfigError => write!(f, "CONFIG_ERROR"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// Detailed error information for display and logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Suggestions for resolution
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ErrorDetails {
    /// Create a new error detail
    pub fn new(code: ErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            details: None,
            suggestions: vec![],
        }
    }

    /// Add detail information
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.details = Some(detail);
        self
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, "\nDetails: {}", details)?;
        }
        if !self.suggestions.is_empty() {
            write!(f, "\nSuggestions:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n  - {}", suggestion)?;
            }
        }
        Ok(())
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Informational
    Info,
    /// Warning - operator can correct the input and retry
    Warning,
    /// Error - operation failed
    Error,
    /// Critical - engine cannot run as configured
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "info"),
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Main error type for ecclesia-core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Backend rejected the request ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Unknown report module: {module}")]
    UnknownModule { module: String },

    #[error("Select at least one column to export")]
    NoFieldsSelected,

    #[error("Column '{key}' is not available in this report")]
    UnknownField { key: String },

    #[error("Generate a report before exporting")]
    NoReport,

    #[error("Start date {from} is after end date {to}")]
    InvalidDateRange { from: String, to: String },

    #[error("Not allowed to {action} {module}")]
    Unauthorized { module: String, action: String },

    #[error("Unexpected response: {message}")]
    Decode { message: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl CoreError {
    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Network { .. } => ErrorCode::NetworkError,
            CoreError::Backend { .. } => ErrorCode::BackendError,
            CoreError::ValidationError { .. } => ErrorCode::ValidationError,
            CoreError::UnknownModule { .. } => ErrorCode::UnknownModule,
            CoreError::NoFieldsSelected => ErrorCode::NoFieldsSelected,
            CoreError::UnknownField { .. } => ErrorCode::UnknownField,
            CoreError::NoReport => ErrorCode::NoReport,
            CoreError::InvalidDateRange { .. } => ErrorCode::InvalidDateRange,
            CoreError::Unauthorized { .. } => ErrorCode::Unauthorized,
            CoreError::Decode { .. } => ErrorCode::DecodeError,
            CoreError::Io { .. } => ErrorCode::IoError,
            CoreError::ConfigError { .. } => ErrorCode::ConfigError,
            CoreError::InternalError { .. } => ErrorCode::InternalError,
        }
    }

    /// Get the severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::Network { .. } => ErrorSeverity::Error,
            CoreError::Backend { .. } => ErrorSeverity::Error,
            CoreError::ValidationError { .. } => ErrorSeverity::Warning,
            CoreError::UnknownModule { .. } => ErrorSeverity::Warning,
            CoreError::NoFieldsSelected => ErrorSeverity::Warning,
            CoreError::UnknownField { .. } => ErrorSeverity::Warning,
            CoreError::NoReport => ErrorSeverity::Info,
            CoreError::InvalidDateRange { .. } => ErrorSeverity::Warning,
            CoreError::Unauthorized { .. } => ErrorSeverity::Warning,
            CoreError::Decode { .. } => ErrorSeverity::Error,
            CoreError::Io { .. } => ErrorSeverity::Error,
            CoreError::ConfigError { .. } => ErrorSeverity::Critical,
            CoreError::InternalError { .. } => ErrorSeverity::Critical,
        }
    }

    /// True for failures detected before any request was issued
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            CoreError::ValidationError { .. }
                | CoreError::UnknownModule { .. }
                | CoreError::NoFieldsSelected
                | CoreError::UnknownField { .. }
                | CoreError::NoReport
                | CoreError::InvalidDateRange { .. }
                | CoreError::Unauthorized { .. }
        )
    }

    /// Message suitable for an inline banner
    ///
    /// Backend failures surface the backend's own message; local
    /// precondition failures describe themselves; anything else falls back
    /// to a generic string.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Backend { message, .. } if !message.trim().is_empty() => message.clone(),
            err if err.is_local() => err.to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// Convert to detailed error info
    pub fn to_details(&self) -> ErrorDetails {
        let mut details = ErrorDetails::new(self.code(), self.to_string());

        match self {
            CoreError::Network { .. } => {
                details = details.with_suggestion(
                    "Check that the back office is reachable and retry.".to_string(),
                );
            }
            CoreError::Backend { status, message } => {
                details = details.with_detail(serde_json::json!({
                    "status": status,
                    "backend_message": message,
                }));
            }
            CoreError::UnknownModule { module } => {
                details = details.with_detail(serde_json::json!({ "module": module }));
                details = details.with_suggestion(format!(
                    "Pick one of: {}.",
                    crate::report::ReportModule::ALL
                        .iter()
                        .map(|m| m.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
            CoreError::NoFieldsSelected => {
                details = details.with_suggestion(
                    "Tick at least one column, or use select all.".to_string(),
                );
            }
            CoreError::NoReport => {
                details = details.with_suggestion(
                    "Run Generate for a module and date range first.".to_string(),
                );
            }
            CoreError::InvalidDateRange { .. } => {
                details = details.with_suggestion(
                    "Swap the dates or pick a later end date.".to_string(),
                );
            }
            CoreError::Decode { message } => {
                details = details.with_detail(serde_json::json!({ "decode_message": message }));
            }
            _ => {}
        }

        details
    }
}

/// Result type with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl From<std::io::Error> for CoreError {
    fn from(error: std::io::Error) -> Self {
        CoreError::Io {
            message: error.to_string(),
        }
    }
}

impl From<ecclesia_config::ConfigError> for CoreError {
    fn from(error: ecclesia_config::ConfigError) -> Self {
        CoreError::ConfigError {
            message: error.to_string(),
        }
    }
}

/// Error context for reporting
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Request ID for tracing
    pub request_id: Option<String>,
    /// Operation being performed
    pub operation: String,
    /// Additional context data
    pub data: serde_json::Value,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: None,
            operation: operation.into(),
            data: serde_json::json!({}),
        }
    }

    /// Add request ID
    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add context data
    pub fn with_data(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data[key] = value;
        self
    }
}

/// Error logger trait
pub trait ErrorLogger: Send + Sync {
    /// Log an error
    fn log_error(&self, error: &CoreError, context: &ErrorContext);
    /// Log a warning
    fn log_warning(&self, message: &str, context: &ErrorContext);
}

/// Default error logger using log crate
#[derive(Debug, Default)]
pub struct DefaultErrorLogger;

impl ErrorLogger for DefaultErrorLogger {
    fn log_error(&self, error: &CoreError, context: &ErrorContext) {
        log::error!(
            target: "ecclesia::error",
            "ERROR [{}] {} - Operation: {} - Request: {:?} - Data: {}",
            error.code(),
            error.to_details(),
            context.operation,
            context.request_id,
            context.data
        );
    }

    fn log_warning(&self, message: &str, context: &ErrorContext) {
        log::warn!(
            target: "ecclesia::error",
            "WARNING: {} - Operation: {} - Request: {:?}",
            message,
            context.operation,
            context.request_id
        );
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::NetworkError.to_string(), "NETWORK_ERROR");
        assert_eq!(ErrorCode::UnknownModule.to_string(), "UNKNOWN_MODULE");
        assert_eq!(ErrorCode::NoFieldsSelected.to_string(), "NO_FIELDS_SELECTED");
    }

    #[test]
    fn test_error_severity_display() {
        assert_eq!(ErrorSeverity::Info.to_string(), "info");
        assert_eq!(ErrorSeverity::Warning.to_string(), "warning");
        assert_eq!(ErrorSeverity::Critical.to_string(), "critical");
    }

    #[test]
    fn test_local_errors_are_flagged() {
        assert!(CoreError::NoFieldsSelected.is_local());
        assert!(CoreError::UnknownModule { module: "x".to_string() }.is_local());
        assert!(!CoreError::Network { message: "reset".to_string() }.is_local());
        assert!(!CoreError::Backend { status: 400, message: "bad".to_string() }.is_local());
    }

    #[test]
    fn test_user_message_prefers_backend_message() {
        let error = CoreError::Backend {
            status: 422,
            message: "Invalid module".to_string(),
        };
        assert_eq!(error.user_message(), "Invalid module");
    }

    #[test]
    fn test_user_message_falls_back_to_generic() {
        let error = CoreError::Backend {
            status: 500,
            message: "  ".to_string(),
        };
        assert_eq!(error.user_message(), GENERIC_FAILURE_MESSAGE);

        let error = CoreError::Network {
            message: "connection refused".to_string(),
        };
        assert_eq!(error.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_user_message_for_local_error() {
        assert_eq!(
            CoreError::NoFieldsSelected.user_message(),
            "Select at least one column to export"
        );
    }

    #[test]
    fn test_unknown_module_details_list_modules() {
        let details = CoreError::UnknownModule {
            module: "sermons".to_string(),
        }
        .to_details();
        assert_eq!(details.code, ErrorCode::UnknownModule);
        assert!(details.details.is_some());
        assert!(details.suggestions[0].contains("members"));
        assert!(details.suggestions[0].contains("pledges"));
    }

    #[test]
    fn test_error_context() {
        let context = ErrorContext::new("kpi.pledges")
            .with_request_id("gen-7".to_string())
            .with_data("page_size", serde_json::json!(50));

        assert_eq!(context.operation, "kpi.pledges");
        assert_eq!(context.request_id, Some("gen-7".to_string()));
        assert_eq!(context.data["page_size"], 50);
    }

    #[test]
    fn test_io_error_conversion() {
        let error: CoreError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert_eq!(error.code(), ErrorCode::IoError);
        assert_eq!(error.severity(), ErrorSeverity::Error);
    }
}
