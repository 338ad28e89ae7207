//! CLI subcommand implementations.

pub mod export;
pub mod ingest;
pub mod leaderboard;
pub mod status;
pub mod total;
pub mod util;
pub mod zone;
pub mod zones;
