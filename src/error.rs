//! Error types and handling for the `WinterReady` service

use std::time::Duration;

use thiserror::Error;

/// Stable, machine-readable error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidCoordinates,
    InvalidRegion,
    InvalidCloudCover,
    MissingTag,
    RateLimited,
    Forbidden,
    UpstreamFailure,
    InternalError,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidCoordinates => "invalid_coordinates",
            ErrorCode::InvalidRegion => "invalid_region",
            ErrorCode::InvalidCloudCover => "invalid_cloud_cover",
            ErrorCode::MissingTag => "missing_tag",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::UpstreamFailure => "upstream_failure",
            ErrorCode::InternalError => "internal_error",
        }
    }
}

/// Main error type for the `WinterReady` service
#[derive(Error, Debug)]
pub enum WinterReadyError {
    /// Malformed or out-of-range client input
    #[error("Invalid input: {message}")]
    Validation { code: ErrorCode, message: String },

    /// Client exhausted its token budget
    #[error("Rate limit exceeded, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Operation not available in the current environment
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// An external provider failed and the failure could not be absorbed
    #[error("Upstream error from {source_name}: {message}")]
    Upstream {
        source_name: &'static str,
        message: String,
    },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Any other unexpected failure
    #[error("Server error: {message}")]
    Server { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl WinterReadyError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    /// Create a new rate-limit error
    #[must_use]
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create a new forbidden error
    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a new upstream error
    pub fn upstream<S: Into<String>>(source_name: &'static str, message: S) -> Self {
        Self::Upstream {
            source_name,
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new server error
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            WinterReadyError::Validation { code, .. } => *code,
            WinterReadyError::RateLimited { .. } => ErrorCode::RateLimited,
            WinterReadyError::Forbidden { .. } => ErrorCode::Forbidden,
            WinterReadyError::Upstream { .. } => ErrorCode::UpstreamFailure,
            WinterReadyError::Config { .. }
            | WinterReadyError::Server { .. }
            | WinterReadyError::Io { .. } => ErrorCode::InternalError,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            WinterReadyError::Validation { message, .. } => message.clone(),
            WinterReadyError::RateLimited { .. } => "Rate limit exceeded".to_string(),
            WinterReadyError::Forbidden { message } => message.clone(),
            WinterReadyError::Upstream { source_name, .. } => {
                format!("Failed to fetch {source_name} data")
            }
            WinterReadyError::Config { .. } => {
                "Configuration error. Please check the service configuration.".to_string()
            }
            WinterReadyError::Server { .. } | WinterReadyError::Io { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
