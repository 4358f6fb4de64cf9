use thiserror::Error;

use crate::modules::aem::utils::client::HttpClientError;

/// Errors that can occur during module operations
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Invalid arguments: {message}")]
    InvalidArgs { message: String },

    #[error("Module execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] HttpClientError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl ModuleError {
    /// Fatal failure with a descriptive, user-facing message. Any non-2xx
    /// response or missing expected field in an AEM reply ends up here.
    pub fn failed(message: impl Into<String>) -> Self {
        ModuleError::ExecutionFailed {
            message: message.into(),
        }
    }
}

/// Errors that can occur during module argument validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required argument: {arg}")]
    MissingRequiredArg { arg: String },

    #[error("Invalid argument value: {arg} = {value} - {reason}")]
    InvalidArgValue {
        arg: String,
        value: String,
        reason: String,
    },
}

impl From<serde_json::Error> for ModuleError {
    fn from(err: serde_json::Error) -> Self {
        ModuleError::ExecutionFailed {
            message: format!("JSON error: {err}"),
        }
    }
}

impl From<serde_yaml::Error> for ModuleError {
    fn from(err: serde_yaml::Error) -> Self {
        ModuleError::InvalidArgs {
            message: format!("invalid YAML value: {err}"),
        }
    }
}

impl From<std::io::Error> for ModuleError {
    fn from(err: std::io::Error) -> Self {
        ModuleError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Module execution error
pub type ModuleExecutionError = ModuleError;
