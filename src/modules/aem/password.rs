//! Password module - rotates a user's password
//!
//! Mostly used to change the admin password away from the default. The
//! module authenticates as the target user itself: it first probes whether
//! the new password already works, then which of the old candidates still
//! does, and only then posts the change.

use async_trait::async_trait;
use tracing::debug;

use crate::modules::{
    aem::utils::{security, AemClient, ConnectionSpec},
    error::{ModuleExecutionError, ValidationError},
    interface::{
        ArgumentSpec, ExecutionContext, ExecutionModule, ModuleArgs, ModuleDocumentation,
        ModuleResult, ReturnValueSpec,
    },
};

/// Password module - rotates a user's password
pub struct PasswordModule;

enum Probe {
    AlreadySet,
    OldValid(String),
    NoneValid,
}

#[async_trait]
impl ExecutionModule for PasswordModule {
    fn name(&self) -> &'static str {
        "password"
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
        args.required_str("id")?;
        args.required_str("new_password")?;
        if args.opt_str_list("old_password").map_or(true, |l| l.is_empty()) {
            return Err(ValidationError::MissingRequiredArg {
                arg: "old_password".to_string(),
            });
        }
        args.required_str("host")?;
        if !args.args.contains_key("port") {
            return Err(ValidationError::MissingRequiredArg {
                arg: "port".to_string(),
            });
        }
        Ok(())
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Change an AEM user's password".to_string(),
            arguments: vec![
                ArgumentSpec {
                    name: "id".to_string(),
                    description: "The user ID".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "old_password".to_string(),
                    description: "Candidate old passwords, tried in order".to_string(),
                    required: true,
                    argument_type: "list".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "new_password".to_string(),
                    description: "The password to set".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "ignore_err".to_string(),
                    description: "Return ok when neither old nor new passwords are valid"
                        .to_string(),
                    required: false,
                    argument_type: "bool".to_string(),
                    default: Some("false".to_string()),
                },
            ],
            examples: vec![
                r#"{"id": "admin", "old_password": ["admin"], "new_password": "S3cr3t-Enough", "host": "http://localhost", "port": 4502}"#
                    .to_string(),
            ],
            return_values: vec![ReturnValueSpec {
                name: "msg".to_string(),
                description: "Probe and change trace".to_string(),
                returned: "always".to_string(),
                value_type: "str".to_string(),
            }],
        }
    }
}

impl PasswordModule {
    async fn apply(&self, args: &ModuleArgs, check: bool) -> Result<ModuleResult, ModuleExecutionError> {
        let id = args.required_str("id")?;
        let new_password = args.required_str("new_password")?;
        let old_passwords = args.opt_str_list("old_password").unwrap_or_default();
        let ignore_err = args.opt_bool("ignore_err", false);

        let conn = ConnectionSpec::from_host_args_with(args, id.clone(), new_password.clone())?;
        let client = AemClient::new(&conn)?;

        match self
            .probe(&client, &id, &new_password, &old_passwords)
            .await?
        {
            Probe::AlreadySet => Ok(ModuleResult::unchanged("password doesn't need to be changed")),
            Probe::NoneValid => {
                if ignore_err {
                    Ok(ModuleResult::unchanged(
                        "Ignoring that neither old nor new passwords are valid",
                    ))
                } else {
                    Err(ModuleExecutionError::failed(
                        "Neither old nor new passwords are valid",
                    ))
                }
            }
            Probe::OldValid(old_password) => {
                if check {
                    return Ok(ModuleResult::changed("password would be changed"));
                }
                self.set_password(&client, &id, &old_password, &new_password)
                    .await
            }
        }
    }

    /// Authentication probe against querybuilder; 200 means the credentials
    /// are valid.
    async fn probe(
        &self,
        client: &AemClient,
        id: &str,
        new_password: &str,
        old_passwords: &[String],
    ) -> Result<Probe, ModuleExecutionError> {
        let query = security::authorizable_query("/home/users", id);

        debug!(id, "checking whether the new password is already set");
        let response = client.get_with_auth(&query, id, new_password).await?;
        if response.is_success() {
            return Ok(Probe::AlreadySet);
        }

        for candidate in old_passwords {
            let response = client.get_with_auth(&query, id, candidate).await?;
            if response.is_success() {
                return Ok(Probe::OldValid(candidate.clone()));
            }
        }
        Ok(Probe::NoneValid)
    }

    async fn set_password(
        &self,
        client: &AemClient,
        id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let fields = vec![
            ("plain".to_string(), new_password.to_string()),
            ("verify".to_string(), new_password.to_string()),
            ("old".to_string(), old_password.to_string()),
        ];
        let response = client
            .post_form_with_auth("/crx/explorer/ui/setpassword.jsp", &fields, id, old_password)
            .await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "failed to change password: {} - {}",
                response.status, response.content
            )));
        }
        Ok(ModuleResult::changed("password changed"))
    }
}
