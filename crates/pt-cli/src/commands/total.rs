//! Implementation of the `pt total` command.

use std::io::Write;

use anyhow::{Context, Result};
use pt_tracker::{QueryEngine, SharedDatabase, format_duration};
use serde::Serialize;

use super::util::{parse_group, parse_range, parse_subject, subject_label};
use crate::{Config, RangeArgs};

#[derive(Debug, Serialize)]
struct TotalOutput {
    group_id: String,
    subject_id: String,
    range: String,
    seconds: i64,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: SharedDatabase,
    config: &Config,
    group: &str,
    subject: &str,
    range: &RangeArgs,
    json: bool,
) -> Result<()> {
    let group_id = parse_group(group)?;
    let subject_id = parse_subject(subject)?;
    let engine = QueryEngine::new(db, config.date_policy());
    let range = parse_range(&engine, range)?;

    let seconds = engine
        .total_for_subject(&group_id, &subject_id, &range)
        .context("failed to compute total")?;

    if json {
        let output = TotalOutput {
            group_id: group_id.to_string(),
            subject_id: subject_id.to_string(),
            range: range.to_string(),
            seconds,
        };
        serde_json::to_writer_pretty(&mut *writer, &output)?;
        writeln!(writer)?;
    } else {
        let names = config.names();
        writeln!(
            writer,
            "{} ({range}): {}",
            subject_label(&names, &group_id, &subject_id),
            format_duration(seconds)
        )?;
    }
    Ok(())
}
