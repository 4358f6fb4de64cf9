//! Group module - manages AEM groups, their members, parents and ACLs

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::modules::{
    aem::utils::{security::find_authorizable_path, AemClient, ConnectionSpec},
    error::{ModuleExecutionError, ValidationError},
    interface::{
        ArgumentSpec, ExecutionContext, ExecutionModule, ModuleArgs, ModuleDocumentation,
        ModuleResult, ReturnValueSpec,
    },
};

/// Group module - manages AEM groups
pub struct GroupModule;

struct GroupInfo {
    path: String,
    name: String,
    members: Vec<String>,
    member_of: Vec<String>,
}

#[async_trait]
impl ExecutionModule for GroupModule {
    fn name(&self) -> &'static str {
        "group"
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
            description: "Create, modify, delete and manage permissions of AEM groups".to_string(),
            arguments: vec![
                ArgumentSpec {
                    name: "id".to_string(),
                    description: "The AEM group ID".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "state".to_string(),
                    description: "Create or delete the group".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "name".to_string(),
                    description: "Descriptive name; required when creating".to_string(),
                    required: false,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "groups".to_string(),
                    description: "Members of the group".to_string(),
                    required: false,
                    argument_type: "list".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "root_groups".to_string(),
                    description: "Parent groups this group is added to".to_string(),
                    required: false,
                    argument_type: "list".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "permissions".to_string(),
                    description: "Permission changelog entries, e.g. 'path:/,read:true'".to_string(),
                    required: false,
                    argument_type: "list".to_string(),
                    default: None,
                },
            ],
            examples: vec![
                r#"{"id": "sysadmin", "name": "Systems Administrators", "root_groups": ["everyone"], "permissions": ["path:/,read:true"], "host": "http://example.com", "port": 4502, "admin_user": "admin", "admin_password": "admin", "state": "present"}"#
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

impl GroupModule {
    async fn apply(&self, args: &ModuleArgs, check: bool) -> Result<ModuleResult, ModuleExecutionError> {
        let conn = ConnectionSpec::from_host_args(args)?;
        let client = AemClient::new(&conn)?;
        let id = args.required_str("id")?;
        let state = args.required_str("state")?;

        let current = self.lookup(&client, &id).await?;

        match state.as_str() {
            "present" => {
                let mut result = match current {
                    Some(info) => self.update(&client, args, &id, &info, check).await?,
                    None => self.create(&client, args, &id, check).await?,
                };
                // Permission and parent-group posts mirror the console UI and
                // do not participate in change detection.
                if !check {
                    let path = match find_authorizable_path(&client, "/home/groups", &id).await? {
                        Some(path) => path,
                        None => return Ok(result),
                    };
                    self.add_permissions(&client, args, &id).await?;
                    self.add_to_root_groups(&client, args, &id, &mut result).await?;
                    result.results.insert("path".to_string(), json!(path));
                }
                Ok(result)
            }
            "absent" => match current {
                Some(info) => {
                    if check {
                        return Ok(ModuleResult::changed(format!("group '{id}' would be deleted")));
                    }
                    self.delete(&client, &id, &info.path).await
                }
                None => Ok(ModuleResult::unchanged(format!("group '{id}' absent"))),
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
    ) -> Result<Option<GroupInfo>, ModuleExecutionError> {
        let Some(path) = find_authorizable_path(client, "/home/groups", id).await? else {
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
        let members = collect_field(&info, "declaredMembers", "authorizableId");
        let member_of = collect_field(&info, "memberOf", "name");
        Ok(Some(GroupInfo {
            path,
            name,
            members,
            member_of,
        }))
    }

    async fn update(
        &self,
        client: &AemClient,
        args: &ModuleArgs,
        id: &str,
        info: &GroupInfo,
        check: bool,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let mut msgs = Vec::new();
        let mut changed = false;

        if let Some(name) = args.opt_str("name") {
            if info.name != name {
                if !check {
                    let fields = vec![("profile/givenName".to_string(), name.clone())];
                    let response = client
                        .post_form(&format!("{}/.rw.html", info.path), &fields)
                        .await?;
                    if !response.is_success() {
                        return Err(ModuleExecutionError::failed(format!(
                            "failed to update name: {} - {}",
                            response.status, response.content
                        )));
                    }
                }
                changed = true;
                msgs.push(format!("name changed from '{}' to '{name}'", info.name));
            }
        }

        if let Some(desired) = args.opt_str_list("groups") {
            if members_differ(&info.members, &desired) {
                if !check {
                    for member in &desired {
                        let fields = vec![("addMembers".to_string(), member.clone())];
                        let response = client
                            .post_form(&format!("{}/.rw.html", info.path), &fields)
                            .await?;
                        if !response.is_success() {
                            return Err(ModuleExecutionError::failed(format!(
                                "failed to update groups: {} - {}",
                                response.status, response.content
                            )));
                        }
                    }
                }
                changed = true;
                msgs.push(format!(
                    "members updated from {:?} to {desired:?}",
                    info.members
                ));
            }
        }

        let mut result = if changed {
            ModuleResult::changed(msgs.join(","))
        } else {
            ModuleResult::unchanged(format!("group '{id}' unchanged"))
        };
        result
            .results
            .insert("member_of".to_string(), json!(info.member_of));
        Ok(result)
    }

    async fn create(
        &self,
        client: &AemClient,
        args: &ModuleArgs,
        id: &str,
        check: bool,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let name = args
            .opt_str("name")
            .ok_or_else(|| ModuleExecutionError::failed("Missing required argument: name"))?;

        if check {
            return Ok(ModuleResult::changed(format!("group '{id}' would be created")));
        }

        let fields = vec![
            ("createGroup".to_string(), String::new()),
            ("authorizableId".to_string(), id.to_string()),
            ("./profile/givenName".to_string(), name),
        ];
        debug!(id, "creating group");
        let response = client
            .post_form("/libs/granite/security/post/authorizables", &fields)
            .await?;
        let exists = self.lookup(client, id).await?.is_some();
        if response.status != 201 || !exists {
            return Err(ModuleExecutionError::failed(format!(
                "failed to create group: {} - {}",
                response.status, response.content
            )));
        }
        Ok(ModuleResult::changed(format!("group '{id}' created")))
    }

    async fn add_permissions(
        &self,
        client: &AemClient,
        args: &ModuleArgs,
        id: &str,
    ) -> Result<(), ModuleExecutionError> {
        let Some(permissions) = args.opt_str_list("permissions") else {
            return Ok(());
        };
        for permission in &permissions {
            let fields = vec![
                ("authorizableId".to_string(), id.to_string()),
                ("_charset_".to_string(), "utf-8".to_string()),
                ("changelog".to_string(), permission.clone()),
            ];
            let response = client.post_form("/.cqactions.html", &fields).await?;
            if !response.is_success() {
                return Err(ModuleExecutionError::failed(format!(
                    "failed to add permissions to group '{id}': {} - {}",
                    response.status, response.content
                )));
            }
        }
        Ok(())
    }

    async fn add_to_root_groups(
        &self,
        client: &AemClient,
        args: &ModuleArgs,
        id: &str,
        result: &mut ModuleResult,
    ) -> Result<(), ModuleExecutionError> {
        let Some(root_groups) = args.opt_str_list("root_groups") else {
            return Ok(());
        };
        for root_group in &root_groups {
            let Some(path) = find_authorizable_path(client, "/home/groups", root_group).await?
            else {
                continue;
            };
            let fields = vec![("addMembers".to_string(), id.to_string())];
            let response = client.post_form(&format!("{path}/.rw.html"), &fields).await?;
            if !response.is_success() {
                return Err(ModuleExecutionError::failed(format!(
                    "failed to add to root group: {} - {}",
                    response.status, response.content
                )));
            }
            result.warnings.push(format!("group added to '{path}'"));
        }
        Ok(())
    }

    async fn delete(
        &self,
        client: &AemClient,
        id: &str,
        path: &str,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let fields = vec![("deleteAuthorizable".to_string(), String::new())];
        let response = client.post_form(&format!("{path}/.rw.html"), &fields).await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "failed to delete group: {} - {}",
                response.status, response.content
            )));
        }
        Ok(ModuleResult::changed(format!("group '{id}' deleted")))
    }
}

fn collect_field(info: &serde_json::Value, list: &str, key: &str) -> Vec<String> {
    info.get(list)
        .and_then(|m| m.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get(key).and_then(|v| v.as_str()))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Member lists are compared case-insensitively, matching the console's
/// handling of authorizable IDs.
fn members_differ(current: &[String], desired: &[String]) -> bool {
    let mut current: Vec<String> = current.iter().map(|s| s.to_lowercase()).collect();
    let mut desired: Vec<String> = desired.iter().map(|s| s.to_lowercase()).collect();
    current.sort();
    desired.sort();
    current != desired
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn member_comparison_is_case_insensitive() {
        let current = vec!["Administrators".to_string(), "devs".to_string()];
        let desired = vec!["devs".to_string(), "administrators".to_string()];
        assert!(!members_differ(&current, &desired));
        assert!(members_differ(&current, &["devs".to_string()]));
    }

    #[test]
    fn collects_authorizable_ids_from_rw_json() {
        let info = json!({
            "name": "Systems Administrators",
            "declaredMembers": [
                {"authorizableId": "alice"},
                {"authorizableId": "bob"},
            ],
            "memberOf": [{"name": "everyone"}],
        });
        assert_eq!(
            collect_field(&info, "declaredMembers", "authorizableId"),
            vec!["alice", "bob"]
        );
        assert_eq!(collect_field(&info, "memberOf", "name"), vec!["everyone"]);
    }
}
