//! CLI command dispatch

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::io::Read;

use crate::cli::options::CliOptions;
use crate::cli::output::print_result;
use crate::modules::{
    ExecutionContext, ModuleArgs, ModuleRegistry, ModuleResult, SpecialParameters,
};

/// Run the selected module and return the process exit code.
pub async fn run(options: &CliOptions) -> Result<i32> {
    let registry = ModuleRegistry::with_aem_modules();

    if options.list_modules {
        for name in registry.list_modules() {
            println!("{name}");
        }
        return Ok(0);
    }

    let Some(module) = options.module.as_deref() else {
        bail!("no module given; see --help");
    };

    let raw = load_args(options)?;
    let args_map: HashMap<String, serde_json::Value> =
        serde_json::from_str(&raw).context("module arguments must be a JSON object")?;
    let args = ModuleArgs {
        args: args_map,
        special: SpecialParameters {
            check_mode: options.check,
            diff: false,
        },
    };
    let context = ExecutionContext {
        check_mode: options.check,
        diff_mode: false,
        verbosity: u8::from(options.verbose),
    };

    match registry.execute_module(module, &args, &context).await {
        Ok(result) => {
            let code = i32::from(result.failed);
            print_result(&result)?;
            Ok(code)
        }
        Err(err) => {
            print_result(&failure_result(err.to_string()))?;
            Ok(1)
        }
    }
}

fn failure_result(msg: String) -> ModuleResult {
    ModuleResult {
        changed: false,
        failed: true,
        msg: Some(msg),
        results: HashMap::new(),
        warnings: Vec::new(),
        facts: HashMap::new(),
    }
}

fn load_args(options: &CliOptions) -> Result<String> {
    if let Some(inline) = &options.args {
        return Ok(inline.clone());
    }
    if let Some(path) = &options.args_file {
        if path.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            return Ok(buf);
        }
        return std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()));
    }
    Ok("{}".to_string())
}
