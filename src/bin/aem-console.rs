use aem_console::cli::{run, CliOptions};
use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let options = CliOptions::parse();

    // Logs go to stderr so the result JSON on stdout stays parseable.
    let level = if options.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let code = run(&options).await?;
    std::process::exit(code);
}
