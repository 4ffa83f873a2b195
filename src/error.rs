//! Error types and handling for the turbcast service

use thiserror::Error;

/// Main error type for turbcast
#[derive(Error, Debug)]
pub enum TurbcastError {
    /// Malformed coordinates, bad spacing, unparsable request values
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A route that cannot be flown, e.g. origin equal to destination
    #[error("Invalid route: {message}")]
    InvalidRoute { message: String },

    /// Unknown airport code or other missing reference data
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Raster or advisory upstream failures
    #[error("Upstream unavailable: {message}")]
    Upstream { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl TurbcastError {
    /// Create a new input validation error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new invalid route error
    pub fn invalid_route<S: Into<String>>(message: S) -> Self {
        Self::InvalidRoute {
            message: message.into(),
        }
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a new upstream error
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the caller supplied something unusable. These are the only
    /// failures the forecast pipeline surfaces; everything else degrades.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            TurbcastError::InvalidInput { .. }
                | TurbcastError::InvalidRoute { .. }
                | TurbcastError::NotFound { .. }
        )
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TurbcastError::InvalidInput { message } | TurbcastError::InvalidRoute { message } => {
                format!("Invalid request: {message}")
            }
            TurbcastError::NotFound { message } => message.clone(),
            TurbcastError::Upstream { .. } => {
                "Weather data providers are currently unreachable.".to_string()
            }
            TurbcastError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
        }
    }
}
