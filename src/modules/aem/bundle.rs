//! Bundle module - starts, stops and refreshes Felix bundles

use async_trait::async_trait;
use tracing::debug;

use crate::modules::{
    aem::utils::{AemClient, ConnectionSpec},
    error::{ModuleExecutionError, ValidationError},
    interface::{
        ArgumentSpec, ExecutionContext, ExecutionModule, ModuleArgs, ModuleDocumentation,
        ModuleResult, ReturnValueSpec,
    },
};

const ACTIONS: &[&str] = &["start", "stop", "refresh"];

/// Bundle module - starts, stops and refreshes Felix bundles
pub struct BundleModule;

#[async_trait]
impl ExecutionModule for BundleModule {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    async fn execute(
        &self,
        args: &ModuleArgs,
        _context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        self.apply(args, false).await
    }

    async fn check_mode(
        &self,
        args: &ModuleArgs,
        _context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        self.apply(args, true).await
    }

    fn validate_args(&self, args: &ModuleArgs) -> Result<(), ValidationError> {
        args.required_str("name")?;
        if let Some(action) = args.opt_str("action") {
            if !ACTIONS.contains(&action.as_str()) {
                return Err(ValidationError::InvalidArgValue {
                    arg: "action".to_string(),
                    value: action,
                    reason: format!("must be one of {ACTIONS:?}"),
                });
            }
        }
        args.required_str("url")?;
        args.required_str("admin_user")?;
        args.required_str("admin_password")?;
        Ok(())
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Start, stop or refresh an AEM bundle".to_string(),
            arguments: vec![
                ArgumentSpec {
                    name: "name".to_string(),
                    description: "Symbolic name of the bundle".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "action".to_string(),
                    description: "start, stop or refresh".to_string(),
                    required: false,
                    argument_type: "str".to_string(),
                    default: Some("start".to_string()),
                },
            ],
            examples: vec![
                r#"{"name": "com.day.crx.crxde-support", "action": "stop", "url": "https://aem01:4502", "admin_user": "admin", "admin_password": "admin"}"#
                    .to_string(),
            ],
            return_values: vec![ReturnValueSpec {
                name: "msg".to_string(),
                description: "Action performed, if any".to_string(),
                returned: "changed".to_string(),
                value_type: "str".to_string(),
            }],
        }
    }
}

impl BundleModule {
    async fn apply(&self, args: &ModuleArgs, check: bool) -> Result<ModuleResult, ModuleExecutionError> {
        let conn = ConnectionSpec::from_url_args(args)?;
        let client = AemClient::new(&conn)?;
        let name = args.required_str("name")?;
        let action = args.opt_str("action").unwrap_or_else(|| "start".to_string());

        let active = self.bundle_active(&client, &name).await?;

        let needed = match action.as_str() {
            "start" => !active,
            "stop" => active,
            // refresh is not observable from the status JSON
            _ => true,
        };
        if !needed {
            return Ok(ModuleResult::unchanged(format!(
                "bundle {name} already in desired state"
            )));
        }
        if check {
            return Ok(ModuleResult::changed(format!(
                "action {action} would be performed on bundle {name}"
            )));
        }

        debug!(name, action, "posting bundle action");
        let fields = vec![("action".to_string(), action.clone())];
        let response = client
            .post_form(&format!("/system/console/bundles/{name}"), &fields)
            .await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "failed to perform {action} action on bundle {name} - {} - {}",
                response.status, response.content
            )));
        }
        Ok(ModuleResult::changed(format!(
            "action {action} was performed on bundle {name}"
        )))
    }

    async fn bundle_active(
        &self,
        client: &AemClient,
        name: &str,
    ) -> Result<bool, ModuleExecutionError> {
        let response = client
            .get(&format!("/system/console/bundles/{name}.json"))
            .await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "can't find bundle '{name}'"
            )));
        }
        let info = response.json()?;
        let state = info
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .and_then(|b| b.get("state"))
            .and_then(|s| s.as_str())
            .ok_or_else(|| {
                ModuleExecutionError::failed(format!("no state in bundle status for '{name}'"))
            })?;
        Ok(state == "Active")
    }
}
