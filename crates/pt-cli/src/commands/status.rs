//! Status command for showing what the store holds.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::DateTime;
use pt_core::to_org_time;
use pt_tracker::SharedDatabase;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &SharedDatabase, config: &Config) -> Result<()> {
    let summary = db
        .lock()
        .map_err(|_| anyhow::anyhow!("database lock poisoned"))?
        .summary()
        .context("failed to read store summary")?;

    writeln!(writer, "Presence tracker status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Monitored zones: {}", summary.zone_count)?;
    writeln!(writer, "Intervals: {}", summary.interval_count)?;

    match summary.last_interval_end {
        None => writeln!(writer, "No intervals recorded.")?,
        Some(raw) => {
            let rendered = DateTime::parse_from_rfc3339(&raw).map_or(raw, |end| {
                to_org_time(end.to_utc())
                    .format("%Y-%m-%d %H:%M:%S %:z")
                    .to_string()
            });
            writeln!(writer, "Last interval ended: {rendered}")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use pt_core::{ClosedInterval, GroupId, SessionKey, SubjectId, ZoneId};
    use pt_db::Database;
    use pt_tracker::share;

    #[test]
    fn status_command_outputs_counts() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("pt.db");
        let mut db = Database::open(&db_path).unwrap();

        let group = GroupId::new("g1").unwrap();
        let zone = ZoneId::new("z1").unwrap();
        db.register_zone(&group, &zone, "2024-01-01T00:00:00Z".parse().unwrap())
            .unwrap();
        let key = SessionKey::new(group, zone, SubjectId::new("u1").unwrap());
        db.insert_interval(
            &ClosedInterval::new(
                key,
                "2024-01-01T23:00:00Z".parse().unwrap(),
                "2024-01-02T01:00:00Z".parse().unwrap(),
            )
            .unwrap(),
        )
        .unwrap();

        let config = Config {
            database_path: db_path.clone(),
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &share(db), &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/pt.db");
        assert_snapshot!(output.trim_end(), @r"
        Presence tracker status
        Database: [TEMP]/pt.db
        Monitored zones: 1
        Intervals: 1
        Last interval ended: 2024-01-02 10:00:00 +09:00
        ");
    }

    #[test]
    fn status_on_empty_store() {
        let mut output = Vec::new();
        run(
            &mut output,
            &share(Database::open_in_memory().unwrap()),
            &Config::default(),
        )
        .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.ends_with("Intervals: 0\nNo intervals recorded.\n"));
    }
}
