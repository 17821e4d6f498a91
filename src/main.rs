use anyhow::Context;
use clap::Parser;

use folio_plan::api::{
    self,
    cli::{Cli, Command},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = api::build_config(&cli.engine).map_err(anyhow::Error::msg)?;
    tracing::debug!(?config, "resolved engine configuration");

    match cli.command {
        Command::Serve(args) => api::run_http_server(args.port, config)
            .await
            .with_context(|| format!("HTTP server on port {} failed", args.port))?,
        command => {
            let output = api::run_command(command, &config).map_err(anyhow::Error::msg)?;
            println!("{output}");
        }
    }

    Ok(())
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("FOLIO_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
