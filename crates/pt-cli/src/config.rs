//! Configuration loading and management.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use pt_core::DateParsePolicy;
use pt_tracker::StaticNames;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Capacity of the ingest and writer queues.
    pub queue_capacity: usize,
    /// Reject malformed dates instead of treating them as unbounded.
    pub strict_dates: bool,
    /// Display names for zones, keyed by zone ID.
    #[serde(default)]
    pub zone_names: HashMap<String, String>,
    /// Display names for members, keyed by subject ID.
    #[serde(default)]
    pub subject_names: HashMap<String, String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("queue_capacity", &self.queue_capacity)
            .field("strict_dates", &self.strict_dates)
            .field("zone_names", &self.zone_names.len())
            .field("subject_names", &self.subject_names.len())
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("pt.db"),
            queue_capacity: 1024,
            strict_dates: true,
            zone_names: HashMap::new(),
            subject_names: HashMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, the user config file, `config_path`,
    /// then `PT_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("PT_"));

        figment.extract()
    }

    pub const fn date_policy(&self) -> DateParsePolicy {
        if self.strict_dates {
            DateParsePolicy::Strict
        } else {
            DateParsePolicy::Lenient
        }
    }

    /// Display names for exports and reports.
    pub fn names(&self) -> StaticNames {
        StaticNames {
            zones: self.zone_names.clone(),
            subjects: self.subject_names.clone(),
        }
    }
}

/// Returns the platform-specific config directory for pt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pt"))
}

/// Returns the platform-specific data directory for pt.
///
/// On Linux: `~/.local/share/pt`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("pt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_pt() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "pt");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_path, dirs_data_path().unwrap().join("pt.db"));
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.date_policy(), DateParsePolicy::Strict);
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pt.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/tmp/presence.db"
strict_dates = false

[zone_names]
"10" = "Study Hall"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/presence.db"));
        assert_eq!(config.date_policy(), DateParsePolicy::Lenient);
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(
            config.names().zones.get("10").map(String::as_str),
            Some("Study Hall")
        );
    }
}
