//! Implementation of the `pt export` command.
//!
//! Writes CSV to stdout, or to `--output`. An existing directory given as
//! `--output` receives a file with the suggested export name. A filter with
//! no matches still writes the header row; the note goes to the log.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use pt_tracker::{QueryEngine, SharedDatabase, export_intervals};

use super::util::{parse_group, parse_range, parse_subject};
use crate::{Config, RangeArgs};

pub fn run<W: Write>(
    writer: &mut W,
    db: SharedDatabase,
    config: &Config,
    group: &str,
    subject: Option<&str>,
    range: &RangeArgs,
    output: Option<&Path>,
) -> Result<()> {
    let group_id = parse_group(group)?;
    let subject_id = subject.map(parse_subject).transpose()?;
    let engine = QueryEngine::new(db.clone(), config.date_policy());
    let range = parse_range(&engine, range)?;

    let names = config.names();
    let export = export_intervals(&db, &names, &group_id, subject_id.as_ref(), &range)
        .context("failed to export intervals")?;
    if export.row_count == 0 {
        tracing::warn!(group = %group_id, %range, "no records to export");
    }

    let Some(output) = output else {
        writer.write_all(&export.bytes)?;
        return Ok(());
    };

    let path = if output.is_dir() {
        output.join(&export.filename)
    } else {
        output.to_path_buf()
    };
    fs::write(&path, &export.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writeln!(
        writer,
        "Exported {} intervals to {}",
        export.row_count,
        path.display()
    )?;
    Ok(())
}
