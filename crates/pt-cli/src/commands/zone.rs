//! Zone administration: `pt zone add|remove|list`.

use std::io::Write;

use anyhow::{Context, Result};
use pt_tracker::{SharedDatabase, ZoneRegistry};
use serde::Serialize;

use super::util::{parse_group, parse_zone, zone_label};
use crate::{Config, ZoneAction};

#[derive(Debug, Serialize)]
struct ZoneEntry {
    zone_id: String,
    name: Option<String>,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: SharedDatabase,
    config: &Config,
    action: &ZoneAction,
) -> Result<()> {
    let mut registry = ZoneRegistry::new(db);
    match action {
        ZoneAction::Add { group, zone } => {
            let (group_id, zone_id) = (parse_group(group)?, parse_zone(zone)?);
            let added = registry
                .register(&group_id, &zone_id)
                .context("failed to register zone")?;
            if added {
                writeln!(writer, "Now monitoring zone {zone_id} in group {group_id}.")?;
            } else {
                writeln!(writer, "Zone {zone_id} is already monitored in group {group_id}.")?;
            }
        }
        ZoneAction::Remove { group, zone } => {
            let (group_id, zone_id) = (parse_group(group)?, parse_zone(zone)?);
            let removed = registry
                .unregister(&group_id, &zone_id)
                .context("failed to unregister zone")?;
            if removed {
                writeln!(writer, "Stopped monitoring zone {zone_id} in group {group_id}.")?;
            } else {
                writeln!(writer, "Zone {zone_id} was not monitored in group {group_id}.")?;
            }
        }
        ZoneAction::List { group, json } => {
            let group_id = parse_group(group)?;
            let zones = registry.zones(&group_id).context("failed to list zones")?;
            let names = config.names();
            if *json {
                let entries: Vec<ZoneEntry> = zones
                    .iter()
                    .map(|zone_id| ZoneEntry {
                        zone_id: zone_id.to_string(),
                        name: config.zone_names.get(zone_id.as_str()).cloned(),
                    })
                    .collect();
                serde_json::to_writer_pretty(&mut *writer, &entries)?;
                writeln!(writer)?;
            } else if zones.is_empty() {
                writeln!(writer, "No monitored zones in group {group_id}.")?;
            } else {
                writeln!(writer, "Monitored zones in group {group_id}:")?;
                for zone_id in &zones {
                    writeln!(writer, "- {}", zone_label(&names, &group_id, zone_id))?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use pt_db::Database;
    use pt_tracker::share;

    fn output_of(db: &SharedDatabase, config: &Config, action: ZoneAction) -> String {
        let mut output = Vec::new();
        run(&mut output, db.clone(), config, &action).unwrap();
        String::from_utf8(output).unwrap()
    }

    fn add(zone: &str) -> ZoneAction {
        ZoneAction::Add {
            group: "g1".to_string(),
            zone: zone.to_string(),
        }
    }

    #[test]
    fn add_remove_and_list_zones() {
        let db = share(Database::open_in_memory().unwrap());
        let mut config = Config::default();
        config
            .zone_names
            .insert("z2".to_string(), "Study Hall".to_string());

        let mut transcript = String::new();
        transcript.push_str(&output_of(&db, &config, add("z2")));
        transcript.push_str(&output_of(&db, &config, add("z1")));
        transcript.push_str(&output_of(&db, &config, add("z1")));
        transcript.push_str(&output_of(
            &db,
            &config,
            ZoneAction::List {
                group: "g1".to_string(),
                json: false,
            },
        ));
        transcript.push_str(&output_of(
            &db,
            &config,
            ZoneAction::Remove {
                group: "g1".to_string(),
                zone: "z1".to_string(),
            },
        ));
        transcript.push_str(&output_of(
            &db,
            &config,
            ZoneAction::Remove {
                group: "g1".to_string(),
                zone: "z1".to_string(),
            },
        ));

        assert_snapshot!(transcript.trim_end(), @r"
        Now monitoring zone z2 in group g1.
        Now monitoring zone z1 in group g1.
        Zone z1 is already monitored in group g1.
        Monitored zones in group g1:
        - z1
        - Study Hall (z2)
        Stopped monitoring zone z1 in group g1.
        Zone z1 was not monitored in group g1.
        ");
    }

    #[test]
    fn list_json_includes_names() {
        let db = share(Database::open_in_memory().unwrap());
        let mut config = Config::default();
        config
            .zone_names
            .insert("z1".to_string(), "Lounge".to_string());
        output_of(&db, &config, add("z1"));

        let output = output_of(
            &db,
            &config,
            ZoneAction::List {
                group: "g1".to_string(),
                json: true,
            },
        );
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["zone_id"], "z1");
        assert_eq!(parsed[0]["name"], "Lounge");
    }

    #[test]
    fn empty_group_lists_nothing() {
        let db = share(Database::open_in_memory().unwrap());
        let output = output_of(
            &db,
            &Config::default(),
            ZoneAction::List {
                group: "g9".to_string(),
                json: false,
            },
        );
        assert_eq!(output, "No monitored zones in group g9.\n");
    }
}
