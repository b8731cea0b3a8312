use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::clock::SystemClock;
use crate::error::ConfigError;
use crate::recurrence::DEFAULT_MAX_LOOKAHEAD_DAYS;

/// Environment variable overriding the data directory.
pub const DB_ENV: &str = "CHOREBOARD_DB";
/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "CHOREBOARD_CONFIG";

/// Due instant of occurrences whose rule has no time of day.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuePolicy {
    /// Due at the last second of the occurrence date, family time.
    #[default]
    EndOfDay,
    /// No due instant at all.
    Undated,
}

/// Runtime settings.
///
/// Resolved in this order, later sources winning:
/// 1. Built-in defaults.
/// 2. The TOML file named by `CHOREBOARD_CONFIG`, or
///    `<config dir>/choreboard/config.toml` if it exists.
/// 3. `CHOREBOARD_DB` for the data directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the JSON data files.
    pub data_dir: PathBuf,
    /// Family whose board the CLI shows.
    pub family: String,
    /// The family's wall clock as an offset from UTC. Unset means the host's
    /// local offset.
    pub utc_offset_minutes: Option<i32>,
    pub due_policy: DuePolicy,
    /// How far `upcoming` looks ahead for rules without an end date.
    pub max_lookahead_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            family: "home".to_string(),
            utc_offset_minutes: None,
            due_policy: DuePolicy::default(),
            max_lookahead_days: DEFAULT_MAX_LOOKAHEAD_DAYS,
        }
    }
}

/// `~/.local/share/choreboard` on Linux, `./choreboard` if there is no
/// data directory.
fn default_data_dir() -> PathBuf {
    let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("choreboard");
    p
}

fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(p));
    }
    let mut p = dirs::config_dir()?;
    p.push("choreboard");
    p.push("config.toml");
    p.exists().then_some(p)
}

impl Config {
    /// Loads the configuration from the file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_path() {
            Some(path) => {
                let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), "loaded config file");
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        if let Ok(dir) = std::env::var(DB_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Parses TOML, filling missing keys with defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// The wall clock for this family.
    pub fn clock(&self) -> SystemClock {
        match self.utc_offset_minutes {
            Some(minutes) => SystemClock::with_offset_minutes(minutes),
            None => SystemClock::local(),
        }
    }
}
