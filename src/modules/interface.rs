//! Module interface traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::modules::error::{ModuleExecutionError, ValidationError};

/// Unified interface for all AEM administration modules
#[async_trait]
pub trait ExecutionModule: Send + Sync {
    /// Module name (e.g., "osgi", "bundle", "package")
    fn name(&self) -> &'static str;

    /// Module version
    fn version(&self) -> &'static str;

    /// Execute the module with given arguments
    async fn execute(
        &self,
        args: &ModuleArgs,
        context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleExecutionError>;

    /// Validate module arguments before execution
    fn validate_args(&self, args: &ModuleArgs) -> Result<(), ValidationError>;

    /// Check if module operation would make changes (dry-run)
    async fn check_mode(
        &self,
        args: &ModuleArgs,
        context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleExecutionError>;

    /// Get module documentation
    fn documentation(&self) -> ModuleDocumentation;
}

/// Module execution arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleArgs {
    /// Direct module arguments
    pub args: HashMap<String, serde_json::Value>,
    /// Special parameters
    pub special: SpecialParameters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecialParameters {
    pub check_mode: bool,
    pub diff: bool,
}

impl ModuleArgs {
    /// Required string argument; fails validation when missing or not a string.
    pub fn required_str(&self, name: &str) -> Result<String, ValidationError> {
        match self.args.get(name) {
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(ValidationError::InvalidArgValue {
                arg: name.to_string(),
                value: other.to_string(),
                reason: "expected a string".to_string(),
            }),
            None => Err(ValidationError::MissingRequiredArg {
                arg: name.to_string(),
            }),
        }
    }

    pub fn opt_str(&self, name: &str) -> Option<String> {
        self.args
            .get(name)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    pub fn opt_bool(&self, name: &str, default: bool) -> bool {
        self.args
            .get(name)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    pub fn opt_u64(&self, name: &str) -> Option<u64> {
        self.args.get(name).and_then(|v| v.as_u64())
    }

    /// List argument in Ansible's permissive style: a JSON array of strings
    /// or a single comma-separated string.
    pub fn opt_str_list(&self, name: &str) -> Option<Vec<String>> {
        match self.args.get(name)? {
            serde_json::Value::Array(items) => Some(
                items
                    .iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            serde_json::Value::String(s) => Some(
                s.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Module execution context
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub check_mode: bool,
    pub diff_mode: bool,
    pub verbosity: u8,
}

/// Module execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleResult {
    pub changed: bool,
    pub failed: bool,
    pub msg: Option<String>,
    pub results: HashMap<String, serde_json::Value>,
    pub warnings: Vec<String>,
    pub facts: HashMap<String, serde_json::Value>,
}

impl ModuleResult {
    pub fn changed(msg: impl Into<String>) -> Self {
        Self {
            changed: true,
            failed: false,
            msg: Some(msg.into()),
            results: HashMap::new(),
            warnings: Vec::new(),
            facts: HashMap::new(),
        }
    }

    pub fn unchanged(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            failed: false,
            msg: Some(msg.into()),
            results: HashMap::new(),
            warnings: Vec::new(),
            facts: HashMap::new(),
        }
    }
}

/// Module documentation
#[derive(Debug, Clone)]
pub struct ModuleDocumentation {
    pub description: String,
    pub arguments: Vec<ArgumentSpec>,
    pub examples: Vec<String>,
    pub return_values: Vec<ReturnValueSpec>,
}

#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub argument_type: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReturnValueSpec {
    pub name: String,
    pub description: String,
    pub returned: String,
    pub value_type: String,
}
