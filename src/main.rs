use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pingsweep::cli::{Cli, OutputFormat};
use pingsweep::config::Config;
use pingsweep::output::{OutputWriter, ShowFilter};
use pingsweep::{scanner, targets};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    debug!("Effective configuration: {:?}", config);

    let input = read_input(&cli)?;
    let targets = targets::parse_target_bytes(&input);
    if targets.is_empty() {
        info!("No valid addresses in input, nothing to do");
        return Ok(());
    }

    let result = scanner::sweep(&targets, &config.probe).await?;

    let format = OutputFormat::from_str(&config.output.format, true)
        .map_err(anyhow::Error::msg)?;
    let filter = ShowFilter::new(config.output.show_reachable, config.output.show_unreachable);
    OutputWriter::new(format, filter, cli.output_file.clone()).write(&result)?;

    Ok(())
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "warn,pingsweep=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_input(cli: &Cli) -> Result<Vec<u8>> {
    match &cli.input {
        Some(path) => fs::read(path)
            .with_context(|| format!("Cannot read {}", path.display())),
        None => {
            let mut data = Vec::new();
            io::stdin()
                .read_to_end(&mut data)
                .context("Cannot read addresses from stdin")?;
            Ok(data)
        }
    }
}
