//! Integration tests for the AEM module registry and argument validation

use serde_json::json;
use std::collections::HashMap;

use aem_console::modules::{
    ExecutionContext, ModuleArgs, ModuleError, ModuleRegistry, SpecialParameters,
};

fn args(pairs: &[(&str, serde_json::Value)]) -> ModuleArgs {
    ModuleArgs {
        args: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<HashMap<_, _>>(),
        special: SpecialParameters::default(),
    }
}

#[test]
fn registry_contains_all_aem_modules() {
    let registry = ModuleRegistry::with_aem_modules();
    assert_eq!(
        registry.list_modules(),
        vec![
            "bundle",
            "group",
            "osgi",
            "package",
            "password",
            "password_hash",
            "user"
        ]
    );
}

#[test]
fn every_module_documents_its_arguments() {
    let registry = ModuleRegistry::with_aem_modules();
    for name in registry.list_modules() {
        let module = registry.get_module(name).unwrap();
        let docs = module.documentation();
        assert!(!docs.description.is_empty(), "{name} has no description");
        assert!(!docs.arguments.is_empty(), "{name} documents no arguments");
    }
}

#[tokio::test]
async fn unknown_module_is_reported() {
    let registry = ModuleRegistry::with_aem_modules();
    let result = registry
        .execute_module("replication", &args(&[]), &ExecutionContext::default())
        .await;
    assert!(matches!(result, Err(ModuleError::ModuleNotFound(_))));
}

#[tokio::test]
async fn password_hash_returns_the_fact_and_never_changes() {
    let registry = ModuleRegistry::with_aem_modules();
    let args = args(&[("user", json!("admin")), ("password", json!("S3cr3t-Enough"))]);
    let context = ExecutionContext::default();

    for _ in 0..2 {
        let result = registry
            .execute_module("password_hash", &args, &context)
            .await
            .unwrap();
        assert!(!result.changed);
        assert!(!result.failed);
        assert_eq!(
            result.facts.get("admin_password_sha256"),
            Some(&json!("P8vLOIUsNBQOsJ4zBQjr+PeAZLDrqFcYuJspCtpg/ps="))
        );
    }
}

#[tokio::test]
async fn password_hash_works_in_check_mode() {
    let registry = ModuleRegistry::with_aem_modules();
    let args = args(&[("user", json!("admin")), ("password", json!("S3cr3t-Enough"))]);
    let context = ExecutionContext {
        check_mode: true,
        ..Default::default()
    };
    let result = registry
        .execute_module("password_hash", &args, &context)
        .await
        .unwrap();
    assert!(result.facts.contains_key("admin_password_sha256"));
}

#[tokio::test]
async fn osgi_validation_rejects_bad_mode_and_missing_value() {
    let registry = ModuleRegistry::with_aem_modules();
    let context = ExecutionContext::default();

    let bad_mode = args(&[
        ("id", json!("com.adobe.cq.cdn.rewriter.impl.CDNRewriter")),
        ("state", json!("present")),
        ("property", json!("service.ranking")),
        ("value", json!("5")),
        ("osgimode", json!("scalar")),
        ("url", json!("http://aem01:4502")),
        ("admin_user", json!("admin")),
        ("admin_password", json!("admin")),
    ]);
    assert!(registry.execute_module("osgi", &bad_mode, &context).await.is_err());

    let missing_value = args(&[
        ("id", json!("com.adobe.cq.cdn.rewriter.impl.CDNRewriter")),
        ("state", json!("present")),
        ("property", json!("service.ranking")),
        ("osgimode", json!("string")),
        ("url", json!("http://aem01:4502")),
        ("admin_user", json!("admin")),
        ("admin_password", json!("admin")),
    ]);
    assert!(registry
        .execute_module("osgi", &missing_value, &context)
        .await
        .is_err());
}

#[tokio::test]
async fn user_validation_requires_host_and_port() {
    let registry = ModuleRegistry::with_aem_modules();
    let context = ExecutionContext::default();
    let incomplete = args(&[
        ("id", json!("bbaggins")),
        ("state", json!("present")),
        ("admin_user", json!("admin")),
        ("admin_password", json!("admin")),
        ("host", json!("http://auth01")),
    ]);
    let result = registry.execute_module("user", &incomplete, &context).await;
    assert!(matches!(result, Err(ModuleError::Validation(_))));
}

#[tokio::test]
async fn group_validation_rejects_unknown_state() {
    let registry = ModuleRegistry::with_aem_modules();
    let context = ExecutionContext::default();
    let bad_state = args(&[
        ("id", json!("sysadmin")),
        ("state", json!("recreated")),
        ("host", json!("http://example.com")),
        ("port", json!(4502)),
        ("admin_user", json!("admin")),
        ("admin_password", json!("admin")),
    ]);
    let result = registry.execute_module("group", &bad_state, &context).await;
    assert!(matches!(result, Err(ModuleError::Validation(_))));
}

#[tokio::test]
async fn bundle_validation_rejects_unknown_action() {
    let registry = ModuleRegistry::with_aem_modules();
    let context = ExecutionContext::default();
    let bad_action = args(&[
        ("name", json!("com.day.crx.crxde-support")),
        ("action", json!("restart")),
        ("url", json!("http://aem01:4502")),
        ("admin_user", json!("admin")),
        ("admin_password", json!("admin")),
    ]);
    let result = registry.execute_module("bundle", &bad_action, &context).await;
    assert!(matches!(result, Err(ModuleError::Validation(_))));
}

#[tokio::test]
async fn package_validation_requires_path_for_present_only() {
    let registry = ModuleRegistry::with_aem_modules();

    let present = args(&[
        ("state", json!("present")),
        ("pkg_name", json!("test-all")),
        ("aem_user", json!("admin")),
        ("aem_passwd", json!("admin")),
        ("aem_url", json!("http://auth01:4502")),
    ]);
    let module = registry.get_module("package").unwrap();
    assert!(module.validate_args(&present).is_err());

    let absent = args(&[
        ("state", json!("absent")),
        ("pkg_name", json!("test-all")),
        ("aem_user", json!("admin")),
        ("aem_passwd", json!("admin")),
        ("aem_url", json!("http://auth01:4502")),
    ]);
    assert!(module.validate_args(&absent).is_ok());
}

#[tokio::test]
async fn password_validation_requires_old_password_candidates() {
    let registry = ModuleRegistry::with_aem_modules();
    let module = registry.get_module("password").unwrap();

    let no_candidates = args(&[
        ("id", json!("admin")),
        ("new_password", json!("S3cr3t-Enough")),
        ("host", json!("http://localhost")),
        ("port", json!(4502)),
    ]);
    assert!(module.validate_args(&no_candidates).is_err());

    let with_candidates = args(&[
        ("id", json!("admin")),
        ("new_password", json!("S3cr3t-Enough")),
        ("old_password", json!(["admin"])),
        ("host", json!("http://localhost")),
        ("port", json!(4502)),
    ]);
    assert!(module.validate_args(&with_candidates).is_ok());
}
