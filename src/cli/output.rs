//! Result rendering

use anyhow::Result;

use crate::modules::ModuleResult;

/// Print the module result as pretty JSON on stdout.
pub fn print_result(result: &ModuleResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
