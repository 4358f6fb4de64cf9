//! Password hash module - returns a SHA-256 password digest as a fact

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::modules::{
    error::{ModuleExecutionError, ValidationError},
    interface::{
        ArgumentSpec, ExecutionContext, ExecutionModule, ModuleArgs, ModuleDocumentation,
        ModuleResult, ReturnValueSpec,
    },
};

/// Password hash module - returns a SHA-256 password digest as a fact
pub struct PasswordHashModule;

#[async_trait]
impl ExecutionModule for PasswordHashModule {
    fn name(&self) -> &'static str {
        "password_hash"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    async fn execute(
        &self,
        args: &ModuleArgs,
        _context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let user = args.required_str("user")?;
        let password = args.required_str("password")?;

        let digest = Sha256::digest(password.as_bytes());
        let hash = STANDARD.encode(digest);

        let mut result = ModuleResult::unchanged(String::new());
        result
            .facts
            .insert(format!("{user}_password_sha256"), json!(hash));
        Ok(result)
    }

    async fn check_mode(
        &self,
        args: &ModuleArgs,
        context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        // Computing a fact changes nothing; check mode behaves identically.
        self.execute(args, context).await
    }

    fn validate_args(&self, args: &ModuleArgs) -> Result<(), ValidationError> {
        args.required_str("user")?;
        args.required_str("password")?;
        Ok(())
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Hash a password to a SHA-256, base64 encoded value and return it as a fact"
                .to_string(),
            arguments: vec![
                ArgumentSpec {
                    name: "user".to_string(),
                    description: "User name used to key the fact".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "password".to_string(),
                    description: "Password to hash".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
            ],
            examples: vec![r#"{"user": "admin", "password": "S3cr3t-Enough"}"#.to_string()],
            return_values: vec![ReturnValueSpec {
                name: "<user>_password_sha256".to_string(),
                description: "Base64 encoded SHA-256 digest".to_string(),
                returned: "always".to_string(),
                value_type: "str".to_string(),
            }],
        }
    }
}
