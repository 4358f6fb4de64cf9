//! Command line options

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aem-console")]
#[command(about = "Idempotent administration modules for the AEM web console")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct CliOptions {
    /// Module to run (osgi, user, group, bundle, package, password, password_hash)
    pub module: Option<String>,

    /// Module arguments as inline JSON
    #[arg(long)]
    pub args: Option<String>,

    /// Module arguments as a JSON file ("-" for stdin)
    #[arg(long)]
    pub args_file: Option<PathBuf>,

    /// Report what would change without touching mutating endpoints
    #[arg(long)]
    pub check: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// List registered modules and exit
    #[arg(long)]
    pub list_modules: bool,
}
