//! Vigil CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod handlers;

use commands::Commands;
use config::VigilConfig;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(
    author,
    version,
    about = "Schedule OS validation jobs and report their results",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = VigilConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Compose(args) => handlers::compose(&config, args).await?,
        Commands::Update { advisory, args } => {
            handlers::update(&config, handlers::advisory(advisory), args).await?
        }
        Commands::Task { id, args } => handlers::update(&config, handlers::task(id), args).await?,
        Commands::Tag { tag, args } => handlers::update(&config, handlers::tag(tag), args).await?,
        Commands::Copr { project, args } => {
            handlers::update(&config, handlers::copr(&project)?, args).await?
        }
        Commands::Report { job_ids, inspect } => {
            handlers::report(&config, &job_ids, inspect).await?
        }
        Commands::ReportBuild { build, inspect } => {
            handlers::report_build(&config, &build, inspect).await?
        }
        Commands::CheckRules => handlers::check_rules(&config)?,
        Commands::Schema { table } => handlers::schema(table)?,
    }

    Ok(())
}
