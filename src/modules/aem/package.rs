//! Package module - uploads, installs and removes CRX content packages
//!
//! The install sequence is upload, install, verify; when the install step
//! reports a failure the freshly uploaded package is removed again so a
//! re-run starts clean.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use crate::modules::{
    aem::utils::{packmgr_xml, AemClient, ConnectionSpec},
    error::{ModuleExecutionError, ValidationError},
    interface::{
        ArgumentSpec, ExecutionContext, ExecutionModule, ModuleArgs, ModuleDocumentation,
        ModuleResult, ReturnValueSpec,
    },
};

const SERVICE: &str = "/crx/packmgr/service.jsp";

/// Package module - uploads, installs and removes CRX content packages
pub struct PackageModule;

#[async_trait]
impl ExecutionModule for PackageModule {
    fn name(&self) -> &'static str {
        "package"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    async fn execute(
        &self,
        args: &ModuleArgs,
        _context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        self.apply(args).await
    }

    async fn check_mode(
        &self,
        args: &ModuleArgs,
        _context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleExecutionError> {
        // The package manager offers no dry-run; report only whether the
        // package is currently installed.
        let conn = ConnectionSpec::from_packmgr_args(args)?;
        let client = AemClient::new(&conn)?;
        let pkg_name = args.required_str("pkg_name")?;
        let state = args.opt_str("state").unwrap_or_else(|| "present".to_string());
        let installed = self.package_exists(&client, &pkg_name).await?;
        let would_change = match state.as_str() {
            "present" => args.opt_bool("aem_force", false) || !installed,
            _ => installed,
        };
        Ok(if would_change {
            ModuleResult::changed(format!("package {pkg_name} would be changed"))
        } else {
            ModuleResult::unchanged("no changes")
        })
    }

    fn validate_args(&self, args: &ModuleArgs) -> Result<(), ValidationError> {
        args.required_str("pkg_name")?;
        let state = args.opt_str("state").unwrap_or_else(|| "present".to_string());
        if state != "present" && state != "absent" {
            return Err(ValidationError::InvalidArgValue {
                arg: "state".to_string(),
                value: state,
                reason: "must be 'present' or 'absent'".to_string(),
            });
        }
        if state == "present" {
            args.required_str("pkg_path")?;
        }
        args.required_str("aem_url")?;
        args.required_str("aem_user")?;
        args.required_str("aem_passwd")?;
        Ok(())
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Manage AEM content packages through the CRX Package Manager".to_string(),
            arguments: vec![
                ArgumentSpec {
                    name: "pkg_name".to_string(),
                    description: "Package name as listed by the package manager".to_string(),
                    required: true,
                    argument_type: "str".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "pkg_path".to_string(),
                    description: "Local path of the package zip; required for present".to_string(),
                    required: false,
                    argument_type: "path".to_string(),
                    default: None,
                },
                ArgumentSpec {
                    name: "state".to_string(),
                    description: "present or absent".to_string(),
                    required: false,
                    argument_type: "str".to_string(),
                    default: Some("present".to_string()),
                },
                ArgumentSpec {
                    name: "aem_force".to_string(),
                    description: "Install even when already listed".to_string(),
                    required: false,
                    argument_type: "bool".to_string(),
                    default: Some("false".to_string()),
                },
                ArgumentSpec {
                    name: "pkg_validate".to_string(),
                    description: "Validate the package before installing".to_string(),
                    required: false,
                    argument_type: "bool".to_string(),
                    default: Some("false".to_string()),
                },
            ],
            examples: vec![
                r#"{"state": "present", "pkg_name": "test-all", "pkg_path": "/tmp/test-all-2.2-SNAPSHOT.zip", "aem_user": "admin", "aem_passwd": "admin", "aem_url": "http://auth01:4502"}"#
                    .to_string(),
            ],
            return_values: vec![ReturnValueSpec {
                name: "msg".to_string(),
                description: "Installation or removal outcome".to_string(),
                returned: "always".to_string(),
                value_type: "str".to_string(),
            }],
        }
    }
}

impl PackageModule {
    async fn apply(&self, args: &ModuleArgs) -> Result<ModuleResult, ModuleExecutionError> {
        let conn = ConnectionSpec::from_packmgr_args(args)?;
        let client = AemClient::new(&conn)?;
        let pkg_name = args.required_str("pkg_name")?;
        let state = args.opt_str("state").unwrap_or_else(|| "present".to_string());
        let force = args.opt_bool("aem_force", false);
        let validate = args.opt_bool("pkg_validate", false);

        match state.as_str() {
            "present" => {
                if !force && self.package_exists(&client, &pkg_name).await? {
                    return Ok(ModuleResult::unchanged("no changes"));
                }
                let pkg_path = args.required_str("pkg_path")?;
                if validate && !self.validate_package(&client, &pkg_name, &pkg_path).await? {
                    return Err(ModuleExecutionError::failed(format!(
                        "validation of package {pkg_name} is failed"
                    )));
                }
                self.install_package(&client, &pkg_name, &pkg_path).await?;
                Ok(ModuleResult::changed(format!(
                    "Installation package {pkg_name} was successful"
                )))
            }
            _ => {
                if !self.package_exists(&client, &pkg_name).await? {
                    return Ok(ModuleResult::unchanged("no changes"));
                }
                let response = client
                    .post_form(&format!("{SERVICE}?cmd=rm&name={pkg_name}"), &[])
                    .await?;
                if !packmgr_xml::status_ok(&response.content) {
                    return Err(ModuleExecutionError::failed(format!(
                        "Removing package {pkg_name} is failed: {}",
                        response.content
                    )));
                }
                Ok(ModuleResult::changed(format!(
                    "Removing package {pkg_name} was successful"
                )))
            }
        }
    }

    async fn package_exists(
        &self,
        client: &AemClient,
        pkg_name: &str,
    ) -> Result<bool, ModuleExecutionError> {
        let response = client.get(&format!("{SERVICE}?cmd=ls")).await?;
        if !response.is_success() {
            return Err(ModuleExecutionError::failed(format!(
                "failed to list packages: status={} output={}",
                response.status, response.content
            )));
        }
        Ok(packmgr_xml::package_listed(&response.content, pkg_name))
    }

    async fn validate_package(
        &self,
        client: &AemClient,
        pkg_name: &str,
        pkg_path: &str,
    ) -> Result<bool, ModuleExecutionError> {
        let form = Form::new().part("file", package_part(pkg_name, pkg_path).await?);
        let response = client
            .post_multipart(
                &format!("{SERVICE}?cmd=validate&type=osgiPackageImports,overlays,acls"),
                form,
            )
            .await?;
        Ok(packmgr_xml::status_ok(&response.content))
    }

    async fn install_package(
        &self,
        client: &AemClient,
        pkg_name: &str,
        pkg_path: &str,
    ) -> Result<(), ModuleExecutionError> {
        let form = Form::new()
            .part("file", package_part(pkg_name, pkg_path).await?)
            .text("install", "false")
            .text("strict", "true");
        debug!(pkg_name, "uploading package");
        let response = client.post_multipart(SERVICE, form).await?;
        if !packmgr_xml::status_ok(&response.content) {
            return Err(ModuleExecutionError::failed(format!(
                "Installation package {pkg_name} is failed: {}",
                response.content
            )));
        }
        let uploaded = packmgr_xml::uploaded_package_name(&response.content).ok_or_else(|| {
            ModuleExecutionError::failed(format!(
                "upload response carries no package name: {}",
                response.content
            ))
        })?;

        let install = client
            .post_form(&format!("{SERVICE}?cmd=inst&name={uploaded}"), &[])
            .await?;
        // AEM reports install failures with HTTP 200 and a non-200 XML status.
        if !packmgr_xml::status_ok(&install.content) {
            warn!(pkg_name, "install failed, removing uploaded package");
            let removed = client
                .post_form(&format!("{SERVICE}?cmd=rm&name={uploaded}"), &[])
                .await?;
            if !packmgr_xml::status_ok(&removed.content) {
                warn!(pkg_name, "rollback removal failed as well");
            }
            return Err(ModuleExecutionError::failed(format!(
                "Installation package {pkg_name} is failed: {}",
                install.content
            )));
        }
        Ok(())
    }
}

async fn package_part(pkg_name: &str, pkg_path: &str) -> Result<Part, ModuleExecutionError> {
    let bytes = tokio::fs::read(pkg_path).await.map_err(|e| {
        ModuleExecutionError::failed(format!("cannot read package file {pkg_path}: {e}"))
    })?;
    Part::bytes(bytes)
        .file_name(pkg_name.to_string())
        .mime_str("application/zip")
        .map_err(|e| ModuleExecutionError::failed(format!("invalid package part: {e}")))
}
