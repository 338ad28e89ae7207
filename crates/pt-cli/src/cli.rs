//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Voice presence tracker.
///
/// Records how long members spend in monitored voice zones and reports
/// totals, per-zone breakdowns and leaderboards.
#[derive(Debug, Parser)]
#[command(name = "pt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the ingest pipeline over JSON-lines commands.
    ///
    /// Reads one command per line from stdin (or --file) until end of input.
    Ingest {
        /// Read commands from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Manage monitored zones.
    #[command(subcommand)]
    Zone(ZoneAction),

    /// Total time a member spent in monitored zones.
    Total {
        group: String,
        subject: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Per-zone breakdown of a member's time.
    Zones {
        group: String,
        subject: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Number of zones to show.
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Members ranked by total time.
    Leaderboard {
        group: String,
        #[command(flatten)]
        range: RangeArgs,
        /// Number of members to show.
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export raw intervals as CSV.
    Export {
        group: String,
        /// Restrict the export to one member.
        #[arg(long)]
        subject: Option<String>,
        #[command(flatten)]
        range: RangeArgs,
        /// Write to this file (or into this directory) instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show store status.
    Status,
}

/// Zone administration.
#[derive(Debug, Subcommand)]
pub enum ZoneAction {
    /// Start monitoring a zone.
    Add { group: String, zone: String },
    /// Stop monitoring a zone.
    Remove { group: String, zone: String },
    /// List monitored zones.
    List {
        group: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Calendar date bounds, in the organization's timezone.
#[derive(Debug, Clone, Default, Args)]
pub struct RangeArgs {
    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<String>,
    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<String>,
}
