use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::FmtSubscriber;

use gatewarden::cli::{Cli, Commands};
use gatewarden::commands;
use gatewarden::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LevelFilter::WARN
    } else if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { force } => commands::init::run(&cli.config, force),
        Commands::Sync { force, dry_run } => {
            let config = Config::load(&cli.config)?;
            commands::sync::run(&config, force, dry_run).await
        }
        Commands::Nuke { dry_run, yes } => {
            let config = Config::load(&cli.config)?;
            commands::nuke::run(&config, dry_run, yes).await
        }
        Commands::Status => {
            let config = Config::load(&cli.config)?;
            commands::status::run(&config).await
        }
    }
}
