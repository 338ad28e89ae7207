//! Implementation of the `pt leaderboard` command.

use std::io::Write;

use anyhow::{Context, Result};
use pt_tracker::{LeaderboardEntry, QueryEngine, SharedDatabase, format_duration};
use serde::Serialize;

use super::util::{found, parse_group, parse_range, subject_label};
use crate::{Config, RangeArgs};

#[derive(Debug, Serialize)]
struct LeaderboardRow<'a> {
    #[serde(flatten)]
    entry: &'a LeaderboardEntry,
    name: Option<&'a str>,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: SharedDatabase,
    config: &Config,
    group: &str,
    range: &RangeArgs,
    top: usize,
    json: bool,
) -> Result<()> {
    let group_id = parse_group(group)?;
    let engine = QueryEngine::new(db, config.date_policy());
    let range = parse_range(&engine, range)?;

    let entries = found(engine.leaderboard(&group_id, &range, top))
        .context("failed to compute leaderboard")?
        .unwrap_or_default();

    if json {
        let rows: Vec<LeaderboardRow<'_>> = entries
            .iter()
            .map(|entry| LeaderboardRow {
                entry,
                name: config
                    .subject_names
                    .get(entry.subject_id.as_str())
                    .map(String::as_str),
            })
            .collect();
        serde_json::to_writer_pretty(&mut *writer, &rows)?;
        writeln!(writer)?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(writer, "No records for group {group_id} ({range}).")?;
        return Ok(());
    }

    let names = config.names();
    writeln!(writer, "Leaderboard for group {group_id} ({range}):")?;
    for entry in &entries {
        writeln!(
            writer,
            "{:>3}. {} - {}",
            entry.rank,
            subject_label(&names, &group_id, &entry.subject_id),
            format_duration(entry.seconds)
        )?;
    }
    Ok(())
}
