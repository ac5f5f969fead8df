use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sparky_sp::args::{Cli, usage};
use sparky_sp::{Settings, SparkPostClient, commands};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sparky=warn,sparky_sp=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Unknown or incomplete actions are not an error
    let Some(command) = cli.command() else {
        let program = std::env::args().next().unwrap_or_else(|| "sparky".to_string());
        print!("{}", usage(&program));
        return Ok(());
    };

    let settings = Settings::load(&cli.config).context("Failed to load settings")?;
    let client = SparkPostClient::new(&settings).context("Failed to build HTTP client")?;

    if let Some(summary) = commands::execute(&client, command).await? {
        println!("{}", summary);
    }
    Ok(())
}
