use std::io::stdout;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pt_cli::commands::{export, ingest, leaderboard, status, total, zone, zones};
use pt_cli::{Cli, Commands, Config};
use pt_tracker::SharedDatabase;

/// Load config and open the store, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(SharedDatabase, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = pt_tracker::open_shared(&config.database_path).with_context(|| {
        format!("failed to open database {}", config.database_path.display())
    })?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so CSV and JSON output stay clean.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (db, config) = open_database(cli.config.as_deref())?;
    let stdout = stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Ingest { file } => ingest::run(&mut out, db, &config, file.as_deref())?,
        Commands::Zone(action) => zone::run(&mut out, db, &config, action)?,
        Commands::Total {
            group,
            subject,
            range,
            json,
        } => total::run(&mut out, db, &config, group, subject, range, *json)?,
        Commands::Zones {
            group,
            subject,
            range,
            top,
            json,
        } => zones::run(&mut out, db, &config, group, subject, range, *top, *json)?,
        Commands::Leaderboard {
            group,
            range,
            top,
            json,
        } => leaderboard::run(&mut out, db, &config, group, range, *top, *json)?,
        Commands::Export {
            group,
            subject,
            range,
            output,
        } => export::run(
            &mut out,
            db,
            &config,
            group,
            subject.as_deref(),
            range,
            output.as_deref(),
        )?,
        Commands::Status => status::run(&mut out, &db, &config)?,
    }

    Ok(())
}
