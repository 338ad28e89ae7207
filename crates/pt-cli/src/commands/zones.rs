//! Implementation of the `pt zones` command: a member's per-zone breakdown.

use std::io::Write;

use anyhow::{Context, Result};
use pt_tracker::{QueryEngine, SharedDatabase, ZoneBreakdown, format_duration};

use super::util::{found, parse_group, parse_range, parse_subject, subject_label, zone_label};
use crate::{Config, RangeArgs};

#[expect(clippy::too_many_arguments, reason = "mirrors the CLI arguments")]
pub fn run<W: Write>(
    writer: &mut W,
    db: SharedDatabase,
    config: &Config,
    group: &str,
    subject: &str,
    range: &RangeArgs,
    top: usize,
    json: bool,
) -> Result<()> {
    let group_id = parse_group(group)?;
    let subject_id = parse_subject(subject)?;
    let engine = QueryEngine::new(db, config.date_policy());
    let range = parse_range(&engine, range)?;

    let rows = found(engine.per_zone_breakdown(&group_id, &subject_id, &range, top))
        .context("failed to compute zone breakdown")?
        .unwrap_or_default();

    if json {
        serde_json::to_writer_pretty(&mut *writer, &rows)?;
        writeln!(writer)?;
        return Ok(());
    }

    let names = config.names();
    let who = subject_label(&names, &group_id, &subject_id);
    if rows.is_empty() {
        writeln!(writer, "No records for {who} ({range}).")?;
        return Ok(());
    }

    writeln!(writer, "Zones for {who} ({range}):")?;
    for (index, ZoneBreakdown { zone_id, seconds }) in rows.iter().enumerate() {
        writeln!(
            writer,
            "{:>3}. {} - {}",
            index + 1,
            zone_label(&names, &group_id, zone_id),
            format_duration(*seconds)
        )?;
    }
    Ok(())
}
