//! Connection parameters shared by the AEM modules
//!
//! The historical module surfaces differ: some take a full `url`, some a
//! `host` plus `port` pair, and the package manager spells its parameters
//! `aem_url` / `aem_user` / `aem_passwd`. All of them converge here.

use crate::modules::error::ValidationError;
use crate::modules::interface::ModuleArgs;

#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub base_url: String,
    pub user: String,
    pub password: String,
    pub timeout: Option<u64>,
    pub validate_certs: bool,
}

impl ConnectionSpec {
    /// `url` + `admin_user` + `admin_password` (osgi, bundle).
    pub fn from_url_args(args: &ModuleArgs) -> Result<Self, ValidationError> {
        Ok(Self {
            base_url: args.required_str("url")?,
            user: args.required_str("admin_user")?,
            password: args.required_str("admin_password")?,
            timeout: args.opt_u64("timeout"),
            validate_certs: args.opt_bool("validate_certs", true),
        })
    }

    /// `host` + `port` + `admin_user` + `admin_password` (user, group).
    pub fn from_host_args(args: &ModuleArgs) -> Result<Self, ValidationError> {
        Ok(Self {
            base_url: host_port_url(args)?,
            user: args.required_str("admin_user")?,
            password: args.required_str("admin_password")?,
            timeout: args.opt_u64("timeout"),
            validate_certs: args.opt_bool("validate_certs", true),
        })
    }

    /// `aem_url` + `aem_user` + `aem_passwd` (package manager).
    pub fn from_packmgr_args(args: &ModuleArgs) -> Result<Self, ValidationError> {
        Ok(Self {
            base_url: args.required_str("aem_url")?,
            user: args.required_str("aem_user")?,
            password: args.required_str("aem_passwd")?,
            timeout: args.opt_u64("timeout"),
            validate_certs: args.opt_bool("validate_certs", true),
        })
    }

    /// `host` + `port` with per-request credentials (password module, which
    /// authenticates as the target user rather than as an admin).
    pub fn from_host_args_with(
        args: &ModuleArgs,
        user: String,
        password: String,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            base_url: host_port_url(args)?,
            user,
            password,
            timeout: args.opt_u64("timeout"),
            validate_certs: args.opt_bool("validate_certs", true),
        })
    }
}

fn host_port_url(args: &ModuleArgs) -> Result<String, ValidationError> {
    let host = args.required_str("host")?;
    let port = match args.args.get("port") {
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(ValidationError::InvalidArgValue {
                arg: "port".to_string(),
                value: other.to_string(),
                reason: "expected a port number".to_string(),
            })
        }
        None => {
            return Err(ValidationError::MissingRequiredArg {
                arg: "port".to_string(),
            })
        }
    };
    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn args(pairs: &[(&str, serde_json::Value)]) -> ModuleArgs {
        ModuleArgs {
            args: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
            special: Default::default(),
        }
    }

    #[test]
    fn host_and_port_are_joined() {
        let args = args(&[
            ("host", json!("http://aem01")),
            ("port", json!(4502)),
            ("admin_user", json!("admin")),
            ("admin_password", json!("admin")),
        ]);
        let conn = ConnectionSpec::from_host_args(&args).unwrap();
        assert_eq!(conn.base_url, "http://aem01:4502");
        assert!(conn.validate_certs);
    }

    #[test]
    fn missing_url_is_a_validation_error() {
        let args = args(&[("admin_user", json!("admin")), ("admin_password", json!("x"))]);
        assert!(ConnectionSpec::from_url_args(&args).is_err());
    }
}
