use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use watchtower_logging::init_tracing;
use watchtower_server::{load_config, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Production monitoring and alerting engine", long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration, print the effective config and exit
    #[arg(long)]
    check: bool,

    /// Run a single collection round, write one snapshot and one report, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    if args.check {
        println!("{}", config.to_toml_string().context("failed to render config")?);
        return Ok(());
    }

    init_tracing(&config.logging)?;
    tracing::info!(
        name = %config.engine.name,
        systems = config.systems.len(),
        config = ?args.config,
        "Starting monitoring engine"
    );

    let state = AppState::new(config)?;
    state.install_panic_hook();

    if args.once {
        let summary = state.run_once().await?;
        tracing::info!(report = %summary.report_path.display(), "Report written");
        return Ok(());
    }

    let report = state.run().await?;
    tracing::info!(signal = ?report.signal, drained = report.drained, "Monitoring engine stopped");
    Ok(())
}
