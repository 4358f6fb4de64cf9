//! OSGi module - manages Felix Config Manager settings
//!
//! Handles plain string, array and append-to-array properties as well as
//! factory configurations. Factory instances have generated PIDs, so they
//! are located by matching every desired property against the instances
//! listed in Configurations.txt; an ambiguous match is an error.

use async_trait::async_trait;
use tracing::debug;

use crate::modules::{
    aem::utils::{
        config_text::{
            canonical_value, find_factory_match, parse_factory_instances, FactoryInstance,
            FactoryMatch,
        },
        AemClient, ConnectionSpec,
    },
    error::{ModuleExecutionError, ValidationError},
    interface::{
        ArgumentSpec, ExecutionContext, ExecutionModule, ModuleArgs, ModuleDocumentation,
        ModuleResult, ReturnValueSpec,
    },
};

const MODES: &[&str] = &["string", "array", "arrayappend", "factory"];

/// OSGi module - manages Felix Config Manager settings
pub struct OsgiModule;

#[async_trait]
impl ExecutionModule for OsgiModule {
    fn name(&self) -> &'static str {
        "osgi"
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
        let mode = args.required_str("osgimode")?;
        if !MODES.contains(&mode.as_str()) {
            return Err(ValidationError::InvalidArgValue {
                arg: "osgimode".to_string(),
                value: mode,
                reason: format!("must be one of {MODES:?}"),
            });
        }
        if mode != "factory" {
            args.required_str("property")?;
        }
        if !args.args.contains_key("value") {
            return Err(ValidationError::MissingRequiredArg {
                arg: "value".to_string(),
            });
        }
        args.required_str("url")?;
        args.required_str("admin_user")?;
        args.required_str("admin_password")?;
        Ok(())
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Manage AEM OSGi settings via the Felix Config Manager".to_string(),
            arguments: vec![
                ArgumentSpec {
                    name: "id".to_string(),
                    description: "OSGi configuration PID (factory PID in factory mode)".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "state".to_string(),
                    description: "present or absent (absent only for factory mode)".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "property".to_string(),
                    description: "Property to change; unused in factory mode".to_string(),
                    required: false,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "value".to_string(),
                    description: "Desired value; YAML literal, list or mapping".to_string(),
                    required: true,
                    argument_type: "raw".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "osgimode".to_string(),
                    description: "string, array, arrayappend or factory".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
            ],
            examples: vec![
                r#"{"id": "com.adobe.cq.cdn.rewriter.impl.CDNRewriter", "property": "service.ranking", "value": "5", "osgimode": "string", "state": "present", "url": "http://aem01:4502", "admin_user": "admin", "admin_password": "admin"}"#
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

impl OsgiModule {
    async fn apply(&self, args: &ModuleArgs, check: bool) -> Result<ModuleResult, ModuleExecutionError> {
        let conn = ConnectionSpec::from_url_args(args)?;
        let client = AemClient::new(&conn)?;
        let id = args.required_str("id")?;
        let state = args.required_str("state")?;
        let mode = args.required_str("osgimode")?;
        let desired = parse_value(args)?;

        if mode == "factory" {
            return self.apply_factory(&client, &id, &state, &desired, check).await;
        }

        if state == "absent" {
            return Err(ModuleExecutionError::failed(
                "state 'absent' is only supported for factory configurations",
            ));
        }

        let property = args.required_str("property")?;
        self.apply_property(&client, &id, &mode, &property, &desired, check)
            .await
    }

    async fn apply_property(
        &self,
        client: &AemClient,
        id: &str,
        mode: &str,
        property: &str,
        desired: &serde_json::Value,
        check: bool,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let path = format!("/system/console/configMgr/{id}");
        // A bare POST to the config endpoint returns the current settings.
        let response = client.post_form(&path, &[]).await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "Error searching for osgi id {id}. status={} output={}",
                response.status, response.content
            )));
        }
        let info = response.json()?;
        let props = info
            .get("properties")
            .and_then(|p| p.as_object())
            .ok_or_else(|| {
                ModuleExecutionError::failed(format!("no properties in configMgr response for {id}"))
            })?;
        let prop = props.get(property).ok_or_else(|| {
            ModuleExecutionError::failed(format!("No such property {property} in {id}"))
        })?;

        let value_key = if mode == "string" { "value" } else { "values" };
        let current = prop.get(value_key).ok_or_else(|| {
            ModuleExecutionError::failed(format!(
                "property {property} in {id} has no '{value_key}' entry"
            ))
        })?;

        if !property_needs_update(mode, current, desired)? {
            return Ok(ModuleResult::unchanged(format!(
                "property {property} already up to date"
            )));
        }
        if check {
            return Ok(ModuleResult::changed(format!(
                "property {property} would be updated"
            )));
        }

        // The console wants the complete property set back; re-submit every
        // current property and substitute the one being changed.
        let mut fields: Vec<(String, String)> = vec![
            ("apply".to_string(), "true".to_string()),
            ("action".to_string(), "ajaxConfigManager".to_string()),
        ];
        for (key, propdef) in props {
            let flag = if propdef.get("values").is_some() {
                "values"
            } else {
                "value"
            };
            let submitted = if key.as_str() == property {
                if mode == "arrayappend" {
                    appended_values(current, desired)?
                } else {
                    desired.clone()
                }
            } else {
                propdef.get(flag).cloned().unwrap_or(serde_json::Value::Null)
            };
            push_fields(&mut fields, key, &submitted);
        }
        let propertylist: Vec<&str> = props.keys().map(|k| k.as_str()).collect();
        fields.push(("propertylist".to_string(), propertylist.join(",")));

        debug!(id, property, "updating osgi property");
        let response = client.post_form(&path, &fields).await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "failed to update property {property} in {id}: {} - {}",
                response.status, response.content
            )));
        }
        Ok(ModuleResult::changed("property updated"))
    }

    async fn apply_factory(
        &self,
        client: &AemClient,
        id: &str,
        state: &str,
        desired: &serde_json::Value,
        check: bool,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let desired = desired.as_object().ok_or_else(|| ModuleExecutionError::InvalidArgs {
            message: "factory value must be a mapping of properties".to_string(),
        })?;

        let instances = self.fetch_factory_instances(client, id).await?;
        let matched = find_factory_match(&instances, desired);

        match (state, matched) {
            (_, FactoryMatch::Ambiguous) => Err(ModuleExecutionError::failed(format!(
                "Factory {id} matches more than one existing instance, this SHOULD not happen"
            ))),
            ("present", FactoryMatch::One(pid)) => {
                Ok(ModuleResult::unchanged(format!("factory {pid} present")))
            }
            ("present", FactoryMatch::NoMatch) => {
                if check {
                    return Ok(ModuleResult::changed(format!("factory {id} would be created")));
                }
                self.create_factory(client, id, desired).await
            }
            ("absent", FactoryMatch::One(pid)) => {
                if check {
                    return Ok(ModuleResult::changed(format!("factory {pid} would be deleted")));
                }
                self.delete_factory(client, &pid).await
            }
            ("absent", FactoryMatch::NoMatch) => {
                Ok(ModuleResult::unchanged("factory already absent"))
            }
            (other, _) => Err(ModuleExecutionError::InvalidArgs {
                message: format!("Invalid state: {other}"),
            }),
        }
    }

    async fn fetch_factory_instances(
        &self,
        client: &AemClient,
        id: &str,
    ) -> Result<Vec<FactoryInstance>, ModuleExecutionError> {
        let response = client.get("/system/console/config/Configurations.txt").await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "failed to fetch configuration dump: status={} output={}",
                response.status, response.content
            )));
        }
        Ok(parse_factory_instances(&response.content, id))
    }

    async fn create_factory(
        &self,
        client: &AemClient,
        id: &str,
        desired: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let mut fields: Vec<(String, String)> = vec![
            ("apply".to_string(), "true".to_string()),
            ("action".to_string(), "ajaxConfigManager".to_string()),
            ("factoryPid".to_string(), id.to_string()),
        ];
        for (key, value) in desired {
            push_fields(&mut fields, key, value);
        }
        let propertylist: Vec<&str> = desired.keys().map(|k| k.as_str()).collect();
        fields.push(("propertylist".to_string(), propertylist.join(",")));

        // The placeholder PID is replaced by a real one when the console saves.
        let response = client
            .post_form(
                "/system/console/configMgr/%5BTemporary%20PID%20replaced%20by%20real%20PID%20upon%20save%5D",
                &fields,
            )
            .await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "failed to create factory {id}: {} - {}",
                response.status, response.content
            )));
        }

        let instances = self.fetch_factory_instances(client, id).await?;
        match find_factory_match(&instances, desired) {
            FactoryMatch::One(pid) => Ok(ModuleResult::changed(format!("factory {pid} created"))),
            FactoryMatch::NoMatch => Err(ModuleExecutionError::failed(format!(
                "factory {id} was created but no matching instance was found afterwards"
            ))),
            FactoryMatch::Ambiguous => Err(ModuleExecutionError::failed(format!(
                "Factory {id} matches more than one existing instance, this SHOULD not happen"
            ))),
        }
    }

    async fn delete_factory(
        &self,
        client: &AemClient,
        pid: &str,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        let fields = vec![
            ("delete".to_string(), "true".to_string()),
            ("apply".to_string(), "true".to_string()),
        ];
        let response = client
            .post_form(&format!("/system/console/configMgr/{pid}"), &fields)
            .await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "failed to delete {pid}: {} - {}",
                response.status, response.content
            )));
        }
        Ok(ModuleResult::changed(format!("factory {pid} deleted")))
    }
}

/// The desired `value` argument; strings are YAML literals, anything else
/// is taken as-is.
fn parse_value(args: &ModuleArgs) -> Result<serde_json::Value, ModuleExecutionError> {
    let raw = args
        .args
        .get("value")
        .ok_or_else(|| ModuleExecutionError::InvalidArgs {
            message: "value is required".to_string(),
        })?;
    match raw {
        serde_json::Value::String(s) => {
            let parsed: serde_yaml::Value = serde_yaml::from_str(s)?;
            Ok(serde_json::to_value(parsed)?)
        }
        other => Ok(other.clone()),
    }
}

/// Whether the current property value differs from the desired one.
fn property_needs_update(
    mode: &str,
    current: &serde_json::Value,
    desired: &serde_json::Value,
) -> Result<bool, ModuleExecutionError> {
    match mode {
        "string" => Ok(canonical_value(current) != canonical_value(desired)),
        "array" => {
            let current = sorted_strings(current)?;
            let desired = sorted_strings(desired)?;
            Ok(current != desired)
        }
        "arrayappend" => {
            let current = sorted_strings(current)?;
            let mut combined = current.clone();
            combined.extend(sorted_strings(desired)?);
            combined.sort();
            combined.dedup();
            Ok(combined != current)
        }
        other => Err(ModuleExecutionError::InvalidArgs {
            message: format!("osgimode {other} not recognized"),
        }),
    }
}

/// Current array plus the desired items not already present.
fn appended_values(
    current: &serde_json::Value,
    desired: &serde_json::Value,
) -> Result<serde_json::Value, ModuleExecutionError> {
    let mut merged = current
        .as_array()
        .cloned()
        .ok_or_else(|| ModuleExecutionError::InvalidArgs {
            message: "arrayappend requires an array property".to_string(),
        })?;
    for item in as_array(desired)? {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    Ok(serde_json::Value::Array(merged))
}

fn as_array(value: &serde_json::Value) -> Result<&Vec<serde_json::Value>, ModuleExecutionError> {
    value.as_array().ok_or_else(|| ModuleExecutionError::InvalidArgs {
        message: "expected a list value for this osgimode".to_string(),
    })
}

fn sorted_strings(value: &serde_json::Value) -> Result<Vec<String>, ModuleExecutionError> {
    let mut items: Vec<String> = as_array(value)?.iter().map(canonical_value).collect();
    items.sort();
    Ok(items)
}

/// Form fields for one property; multi-valued properties repeat the field.
fn push_fields(fields: &mut Vec<(String, String)>, key: &str, value: &serde_json::Value) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                fields.push((key.to_string(), canonical_value(item)));
            }
        }
        other => fields.push((key.to_string(), canonical_value(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_mode_compares_rendered_values() {
        assert!(!property_needs_update("string", &json!("5"), &json!("5")).unwrap());
        assert!(!property_needs_update("string", &json!(5), &json!("5")).unwrap());
        assert!(property_needs_update("string", &json!("4"), &json!("5")).unwrap());
        assert!(!property_needs_update("string", &json!(true), &json!(true)).unwrap());
    }

    #[test]
    fn array_mode_ignores_ordering() {
        assert!(!property_needs_update(
            "array",
            &json!(["perl", "python"]),
            &json!(["python", "perl"])
        )
        .unwrap());
        assert!(property_needs_update(
            "array",
            &json!(["perl"]),
            &json!(["python", "perl"])
        )
        .unwrap());
    }

    #[test]
    fn arrayappend_is_idempotent_for_subsets() {
        assert!(!property_needs_update(
            "arrayappend",
            &json!(["a", "b", "c"]),
            &json!(["b", "a"])
        )
        .unwrap());
        assert!(property_needs_update(
            "arrayappend",
            &json!(["a", "b"]),
            &json!(["c"])
        )
        .unwrap());
    }

    #[test]
    fn appended_values_keeps_existing_order_and_skips_duplicates() {
        let merged = appended_values(&json!(["x", "y"]), &json!(["y", "z"])).unwrap();
        assert_eq!(merged, json!(["x", "y", "z"]));
    }

    #[test]
    fn fields_repeat_for_multi_valued_properties() {
        let mut fields = Vec::new();
        push_fields(&mut fields, "cdnrewriter.attributes", &json!(["a", "b"]));
        push_fields(&mut fields, "service.ranking", &json!(5));
        assert_eq!(
            fields,
            vec![
                ("cdnrewriter.attributes".to_string(), "a".to_string()),
                ("cdnrewriter.attributes".to_string(), "b".to_string()),
                ("service.ranking".to_string(), "5".to_string()),
            ]
        );
    }
}
