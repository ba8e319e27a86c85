use clap::Parser;
use cloud_census::{cli::Cli, config, run_command};
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> cloud_census::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    // Load configuration
    let cwd = std::env::current_dir().ok();
    let config = config::load_config(cli.config.as_deref(), cwd.as_deref())?;

    run_command(cli.command, &config).await
}
