//! Implementation of the `pt ingest` command.
//!
//! Feeds JSON-lines [`IngressCommand`]s through the tracker's ingest pipeline
//! until end of input, then waits for every finalized interval to be written.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use pt_core::IngressCommand;
use pt_tracker::{IngestReport, SharedDatabase, start_ingest};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::Config;

/// Input and pipeline counters for one ingest run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub lines: u64,
    pub skipped: u64,
    pub report: IngestReport,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: SharedDatabase,
    config: &Config,
    file: Option<&Path>,
) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let summary = runtime.block_on(async {
        match file {
            Some(path) => {
                let input = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("failed to open {}", path.display()))?;
                ingest_lines(BufReader::new(input), db, config.queue_capacity).await
            }
            None => {
                ingest_lines(BufReader::new(tokio::io::stdin()), db, config.queue_capacity).await
            }
        }
    })?;
    write_summary(writer, &summary)
}

/// Drains `reader` into a fresh ingest pipeline.
///
/// Malformed lines are logged and skipped; they never stop the run.
pub async fn ingest_lines<R>(reader: R, db: SharedDatabase, capacity: usize) -> Result<IngestSummary>
where
    R: AsyncBufRead + Unpin,
{
    let (handle, task) = start_ingest(db, capacity).context("failed to start ingest")?;
    let mut summary = IngestSummary::default();
    let mut lines = reader.lines();
    let mut line_number = 0_u64;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        summary.lines += 1;
        match serde_json::from_str::<IngressCommand>(line) {
            Ok(command) => handle.send(command).await?,
            Err(err) => {
                summary.skipped += 1;
                tracing::warn!(line = line_number, error = %err, "skipping malformed command");
            }
        }
    }

    drop(handle);
    summary.report = task.finish().await.context("ingest workers failed")?;
    Ok(summary)
}

fn write_summary<W: Write>(writer: &mut W, summary: &IngestSummary) -> Result<()> {
    let ingest = &summary.report.ingest;
    writeln!(
        writer,
        "Read {} commands ({} malformed).",
        summary.lines, summary.skipped
    )?;
    writeln!(writer, "Intervals recorded: {}", summary.report.writer.written)?;
    writeln!(writer, "Intervals discarded: {}", ingest.intervals_discarded)?;
    writeln!(writer, "Failed commands: {}", ingest.failed_commands)?;
    if ingest.open_sessions_dropped > 0 {
        writeln!(
            writer,
            "Open sessions dropped: {}",
            ingest.open_sessions_dropped
        )?;
    }
    let lost = summary.report.lost_intervals();
    if lost > 0 {
        writeln!(writer, "WARNING: {lost} intervals were lost")?;
    }
    Ok(())
}
