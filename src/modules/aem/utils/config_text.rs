//! Parsing of the Felix console's Configurations.txt dump
//!
//! Factory configurations have no stable PID known up front; instances are
//! discovered by scanning the plain-text configuration dump for
//! `PID = <factory pid>.<uuid>` blocks and comparing their properties
//! against the desired values.

use regex::Regex;
use std::collections::HashMap;

/// One factory configuration instance as printed by the console.
#[derive(Debug, Clone)]
pub struct FactoryInstance {
    pub pid: String,
    pub properties: HashMap<String, String>,
}

/// Outcome of matching desired properties against existing instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryMatch {
    NoMatch,
    One(String),
    Ambiguous,
}

/// Extract all instances of the given factory PID from Configurations.txt.
pub fn parse_factory_instances(text: &str, factory_pid: &str) -> Vec<FactoryInstance> {
    let pid_re = Regex::new(&format!(
        r"^{}\.[0-9a-fA-F]{{8}}-[0-9a-fA-F]{{4}}-[0-9a-fA-F]{{4}}-[0-9a-fA-F]{{4}}-[0-9a-fA-F]{{12}}$",
        regex::escape(factory_pid)
    ))
    .expect("factory pid pattern is valid");

    let mut instances = Vec::new();
    let mut current: Option<FactoryInstance> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(pid) = trimmed.strip_prefix("PID = ") {
            if let Some(instance) = current.take() {
                instances.push(instance);
            }
            let pid = pid.trim();
            if pid_re.is_match(pid) {
                let mut properties = HashMap::new();
                properties.insert("PID".to_string(), pid.to_string());
                current = Some(FactoryInstance {
                    pid: pid.to_string(),
                    properties,
                });
            }
        } else if trimmed.is_empty() {
            if let Some(instance) = current.take() {
                instances.push(instance);
            }
        } else if let Some(instance) = current.as_mut() {
            if let Some((key, value)) = trimmed.split_once('=') {
                instance
                    .properties
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
    }
    if let Some(instance) = current.take() {
        instances.push(instance);
    }
    instances
}

/// Render a desired value the way the console prints it: scalars bare,
/// lists bracketed and comma-joined without quoting.
pub fn canonical_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_value).collect();
            format!("[{}]", parts.join(", "))
        }
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Find the instance whose properties equal every desired key/value pair.
pub fn find_factory_match(
    instances: &[FactoryInstance],
    desired: &serde_json::Map<String, serde_json::Value>,
) -> FactoryMatch {
    let mut matched = Vec::new();
    for instance in instances {
        let all_equal = desired.iter().all(|(key, value)| {
            instance.properties.get(key) == Some(&canonical_value(value))
        });
        if all_equal && !desired.is_empty() {
            matched.push(instance.pid.clone());
        }
    }
    let mut pids = matched.into_iter();
    match (pids.next(), pids.next()) {
        (None, _) => FactoryMatch::NoMatch,
        (Some(pid), None) => FactoryMatch::One(pid),
        _ => FactoryMatch::Ambiguous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONFIG_DUMP: &str = "\
Apache Felix OSGi Configuration Admin Status

PID = org.apache.sling.commons.log.LogManager.factory.config.8bc13b0a-3cbd-4ca8-a18b-e56a5e5520e7
  BundleLocation = launchpad:resources/install/15/org.apache.sling.commons.log.jar
  org.apache.sling.commons.log.file = logs/standby.log
  org.apache.sling.commons.log.level = debug
  org.apache.sling.commons.log.names = [org.apache.jackrabbit.oak.segment]
  service.factoryPid = org.apache.sling.commons.log.LogManager.factory.config

PID = org.apache.sling.commons.log.LogManager.factory.config.11111111-2222-3333-4444-555555555555
  org.apache.sling.commons.log.file = logs/error.log
  org.apache.sling.commons.log.level = info

PID = some.other.Configuration
  unrelated = true
";

    #[test]
    fn parses_only_matching_factory_instances() {
        let instances = parse_factory_instances(
            CONFIG_DUMP,
            "org.apache.sling.commons.log.LogManager.factory.config",
        );
        assert_eq!(instances.len(), 2);
        assert!(instances[0]
            .pid
            .ends_with("8bc13b0a-3cbd-4ca8-a18b-e56a5e5520e7"));
        assert_eq!(
            instances[0].properties.get("org.apache.sling.commons.log.level"),
            Some(&"debug".to_string())
        );
    }

    #[test]
    fn matches_single_instance() {
        let instances = parse_factory_instances(
            CONFIG_DUMP,
            "org.apache.sling.commons.log.LogManager.factory.config",
        );
        let desired = json!({
            "org.apache.sling.commons.log.file": "logs/standby.log",
            "org.apache.sling.commons.log.level": "debug",
            "org.apache.sling.commons.log.names": ["org.apache.jackrabbit.oak.segment"],
        });
        let matched = find_factory_match(&instances, desired.as_object().unwrap());
        assert_eq!(
            matched,
            FactoryMatch::One(
                "org.apache.sling.commons.log.LogManager.factory.config.8bc13b0a-3cbd-4ca8-a18b-e56a5e5520e7"
                    .to_string()
            )
        );
    }

    #[test]
    fn reports_no_match_for_different_values() {
        let instances = parse_factory_instances(
            CONFIG_DUMP,
            "org.apache.sling.commons.log.LogManager.factory.config",
        );
        let desired = json!({"org.apache.sling.commons.log.file": "logs/brand-new.log"});
        assert_eq!(
            find_factory_match(&instances, desired.as_object().unwrap()),
            FactoryMatch::NoMatch
        );
    }

    #[test]
    fn reports_ambiguity_when_several_instances_match() {
        let mut instances = parse_factory_instances(
            CONFIG_DUMP,
            "org.apache.sling.commons.log.LogManager.factory.config",
        );
        instances[1]
            .properties
            .insert("shared".to_string(), "yes".to_string());
        instances[0]
            .properties
            .insert("shared".to_string(), "yes".to_string());
        let desired = json!({"shared": "yes"});
        assert_eq!(
            find_factory_match(&instances, desired.as_object().unwrap()),
            FactoryMatch::Ambiguous
        );
    }

    #[test]
    fn canonical_rendering_matches_console_output() {
        assert_eq!(canonical_value(&json!("plain")), "plain");
        assert_eq!(canonical_value(&json!(5)), "5");
        assert_eq!(canonical_value(&json!(["a", "b"])), "[a, b]");
        assert_eq!(canonical_value(&json!([1, 2])), "[1, 2]");
    }
}
