//! Error types for sqlshift.
//!
//! Translation itself never fails: a pass that cannot make sense of its input
//! leaves the statement alone. Errors only come from executing statements and
//! from loading configuration.

use thiserror::Error;

/// The main error type for sqlshift operations.
#[derive(Debug, Error)]
pub enum ShiftError {
    /// A translated statement failed on the target engine.
    #[error("Execution error in `{statement}`: {message}")]
    Execution { statement: String, message: String },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed configuration file.
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShiftError {
    /// Create an execution error for the given statement.
    pub fn execution(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            statement: statement.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for sqlshift operations.
pub type ShiftResult<T> = Result<T, ShiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShiftError::execution("SET IDENTITY_INSERT t ON", "permission denied");
        assert_eq!(
            err.to_string(),
            "Execution error in `SET IDENTITY_INSERT t ON`: permission denied"
        );
    }
}
