//! User module - manages AEM user accounts
//!
//! The password given at creation time is the initial password only; an
//! existing account's password is never touched here (see the password
//! module for rotation).

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::modules::{
    aem::utils::{
        credentials::{check_password_strength, generate_password},
        security::find_authorizable_path,
        AemClient, ConnectionSpec,
    },
    error::{ModuleExecutionError, ValidationError},
    interface::{
        ArgumentSpec, ExecutionContext, ExecutionModule, ModuleArgs, ModuleDocumentation,
        ModuleResult, ReturnValueSpec,
    },
};

/// User module - manages AEM user accounts
pub struct UserModule;

struct UserInfo {
    path: String,
    name: String,
    groups: Vec<String>,
}

#[async_trait]
impl ExecutionModule for UserModule {
    fn name(&self) -> &'static str {
        "user"
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
        let state = args.required_str("state")?;
        if state != "present" && state != "absent" {
            return Err(ValidationError::InvalidArgValue {
                arg: "state".to_string(),
                value: state,
                reason: "must be 'present' or 'absent'".to_string(),
            });
        }
        args.required_str("host")?;
        args.required_str("admin_user")?;
        args.required_str("admin_password")?;
        if !args.args.contains_key("port") {
            return Err(ValidationError::MissingRequiredArg {
                arg: "port".to_string(),
            });
        }
        Ok(())
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Create, modify and delete AEM users".to_string(),
            arguments: vec![
                ArgumentSpec {
                    name: "id".to_string(),
                    description: "The AEM user name".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "state".to_string(),
                    description: "Create or delete the account".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "first_name".to_string(),
                    description: "First name; required when creating".to_string(),
                    required: false,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "last_name".to_string(),
                    description: "Last name; required when creating".to_string(),
                    required: false,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "password".to_string(),
                    description: "Initial password; generated when omitted".to_string(),
                    required: false,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "groups".to_string(),
                    description: "Group memberships; 'everyone' is implied".to_string(),
                    required: false,
                    argument_type: "list".to_string(),
                    default: None,
                },
            ],
            examples: vec![
                r#"{"id": "bbaggins", "first_name": "Bilbo", "last_name": "Baggins", "password": "Myprecious-2024", "groups": ["immortality"], "host": "http://auth01", "port": 4502, "admin_user": "admin", "admin_password": "admin", "state": "present"}"#
                    .to_string(),
            ],
            return_values: vec![ReturnValueSpec {
                name: "msg".to_string(),
                description: "What was changed".to_string(),
                returned: "always".to_string(),
                value_type: "str".to_string(),
            }],
        }
    }
}

impl UserModule {
    async fn apply(&self, args: &ModuleArgs, check: bool) -> Result<ModuleResult, ModuleExecutionError> {
        let conn = ConnectionSpec::from_host_args(args)?;
        let client = AemClient::new(&conn)?;
        let id = args.required_str("id")?;
        let state = args.required_str("state")?;
        let groups = args.opt_str_list("groups").map(with_everyone);

        let current = self.lookup(&client, &id).await?;

        match state.as_str() {
            "present" => match current {
                Some(info) => self.update(&client, args, &id, &info, groups.as_deref(), check).await,
                None => self.create(&client, args, &id, groups.as_deref(), check).await,
            },
            "absent" => match current {
                Some(info) => {
                    if check {
                        return Ok(ModuleResult::changed(format!("user '{id}' would be deleted")));
                    }
                    self.delete(&client, &id, &info.path).await
                }
                None => Ok(ModuleResult::unchanged(format!("user '{id}' absent"))),
            },
            other => Err(ModuleExecutionError::InvalidArgs {
                message: format!("Invalid state: {other}"),
            }),
        }
    }

    async fn lookup(
        &self,
        client: &AemClient,
        id: &str,
    ) -> Result<Option<UserInfo>, ModuleExecutionError> {
        let Some(path) = find_authorizable_path(client, "/home/users", id).await? else {
            return Ok(None);
        };
        let response = client.get(&format!("{path}.rw.json?props=*")).await?;
        if !response.is_success() {
            return Ok(None);
        }
        let info = response.json()?;
        let name = info
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();
        let groups = info
            .get("declaredMemberOf")
            .and_then(|m| m.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("authorizableId").and_then(|v| v.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(UserInfo { path, name, groups }))
    }

    async fn update(
        &self,
        client: &AemClient,
        args: &ModuleArgs,
        id: &str,
        info: &UserInfo,
        groups: Option<&[String]>,
        check: bool,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let first_name = args.opt_str("first_name");
        let last_name = args.opt_str("last_name");
        let mut msgs = Vec::new();
        let mut changed = false;

        match (&first_name, &last_name) {
            (Some(first), Some(last)) => {
                let full_name = format!("{first} {last}");
                if info.name != full_name {
                    if !check {
                        let fields = vec![
                            ("profile/givenName".to_string(), first.clone()),
                            ("profile/familyName".to_string(), last.clone()),
                        ];
                        let response = client
                            .post_form(&format!("{}.rw.html", info.path), &fields)
                            .await?;
                        if !response.is_success() {
                            return Err(ModuleExecutionError::failed(format!(
                                "failed to update name: {} - {}",
                                response.status, response.content
                            )));
                        }
                    }
                    changed = true;
                    msgs.push(format!(
                        "name updated from '{}' to '{full_name}'",
                        info.name
                    ));
                }
            }
            (Some(_), None) => {
                return Err(ModuleExecutionError::failed(
                    "Missing required argument: last_name",
                ))
            }
            (None, Some(_)) => {
                return Err(ModuleExecutionError::failed(
                    "Missing required argument: first_name",
                ))
            }
            (None, None) => {}
        }

        if let Some(desired) = groups {
            if memberships_differ(&info.groups, desired) {
                if !check {
                    let fields: Vec<(String, String)> = desired
                        .iter()
                        .map(|g| ("membership".to_string(), g.clone()))
                        .collect();
                    let response = client
                        .post_form(&format!("{}.rw.html", info.path), &fields)
                        .await?;
                    if !response.is_success() {
                        return Err(ModuleExecutionError::failed(format!(
                            "failed to update groups: {} - {}",
                            response.status, response.content
                        )));
                    }
                }
                changed = true;
                msgs.push(format!(
                    "groups updated from {:?} to {desired:?}",
                    info.groups
                ));
            }
        }

        if changed {
            Ok(ModuleResult::changed(msgs.join(",")))
        } else {
            Ok(ModuleResult::unchanged(format!("user '{id}' unchanged")))
        }
    }

    async fn create(
        &self,
        client: &AemClient,
        args: &ModuleArgs,
        id: &str,
        groups: Option<&[String]>,
        check: bool,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let first_name = args.opt_str("first_name").ok_or_else(|| {
            ModuleExecutionError::failed("Missing required argument: first_name")
        })?;
        let last_name = args
            .opt_str("last_name")
            .ok_or_else(|| ModuleExecutionError::failed("Missing required argument: last_name"))?;
        let groups = groups
            .ok_or_else(|| ModuleExecutionError::failed("Missing required argument: groups"))?;

        let mut generated = false;
        let password = match args.opt_str("password") {
            Some(password) => {
                check_password_strength(&password).map_err(ModuleExecutionError::failed)?;
                password
            }
            None => {
                generated = true;
                generate_password()
            }
        };

        if check {
            return Ok(ModuleResult::changed(format!("user '{id}' would be created")));
        }

        let mut fields = vec![
            ("createUser".to_string(), String::new()),
            ("authorizableId".to_string(), id.to_string()),
            ("profile/givenName".to_string(), first_name),
            ("profile/familyName".to_string(), last_name),
            ("rep:password".to_string(), password.clone()),
        ];
        for group in groups {
            fields.push(("membership".to_string(), group.clone()));
        }

        debug!(id, "creating user");
        let response = client
            .post_form("/libs/granite/security/post/authorizables", &fields)
            .await?;
        let exists = self.lookup(client, id).await?.is_some();
        if response.status != 201 || !exists {
            return Err(ModuleExecutionError::failed(format!(
                "failed to create user: {} - {}",
                response.status, response.content
            )));
        }

        let mut result = ModuleResult::changed(format!("user '{id}' created"));
        if generated {
            result
                .results
                .insert("generated_password".to_string(), json!(password));
        }
        Ok(result)
    }

    async fn delete(
        &self,
        client: &AemClient,
        id: &str,
        path: &str,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let fields = vec![("deleteAuthorizable".to_string(), String::new())];
        let response = client.post_form(&format!("{path}.rw.html"), &fields).await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "failed to delete user: {} - {}",
                response.status, response.content
            )));
        }
        Ok(ModuleResult::changed(format!("user '{id}' deleted")))
    }
}

/// The everyone group is implicit in AEM; keep it in the desired list so
/// the comparison against current memberships stays stable.
fn with_everyone(mut groups: Vec<String>) -> Vec<String> {
    if !groups.iter().any(|g| g == "everyone") {
        groups.push("everyone".to_string());
    }
    groups
}

fn memberships_differ(current: &[String], desired: &[String]) -> bool {
    let mut current: Vec<&str> = current.iter().map(|s| s.as_str()).collect();
    let mut desired: Vec<&str> = desired.iter().map(|s| s.as_str()).collect();
    current.sort_unstable();
    desired.sort_unstable();
    current != desired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everyone_is_appended_once() {
        let groups = with_everyone(vec!["immortality".to_string()]);
        assert_eq!(groups, vec!["immortality", "everyone"]);
        let groups = with_everyone(groups);
        assert_eq!(groups.iter().filter(|g| *g == "everyone").count(), 1);
    }

    #[test]
    fn membership_comparison_ignores_order() {
        let current = vec!["everyone".to_string(), "immortality".to_string()];
        let desired = vec!["immortality".to_string(), "everyone".to_string()];
        assert!(!memberships_differ(&current, &desired));
        assert!(memberships_differ(&current, &["everyone".to_string()]));
    }
}
