use crate::{
    cli::Cli,
    core::values::coerce_value,
    error::{BoardError, BoardResult},
};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use itertools::Itertools;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::Level;

const TRACE_LEVELS: [&'static str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
const ENV_PREFIX: &str = "SCOREBOARD_";

// Settings are loaded once at startup and handed read-only to the core.
// Any value may be overridden via environment variables, nested keys being
// separated by a double underscore. Example:
// SCOREBOARD_RCON__PASSWORD="xxx" would set rcon.password to the xxx value.
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default = "default_trace_level")]
    trace_level: String,
    #[serde(default)]
    pub rcon: RconSettings,
    #[serde(default)]
    pub scores: Vec<ScoreDefinition>,
    // Seconds between two refreshes, 0 disables periodic refresh.
    #[serde(default)]
    pub refresh_rate: i64,
    #[serde(default = "default_page_title")]
    pub page_title: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RconSettings {
    #[serde(default = "default_rcon_host")]
    pub host: String,
    #[serde(default = "default_rcon_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub timeout: Timeout,
}

/// Per-operation timeout in whole seconds, never below one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout(u64);

/// One configured leaderboard.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "ScoreEntry")]
pub struct ScoreDefinition {
    pub key: String,
    pub title: String,
    pub is_duration: bool,
    pub sort_ascending: bool,
}

// Score as written in the configuration document.
#[derive(Deserialize)]
struct ScoreEntry {
    key: String,
    title: Option<String>,
    #[serde(default)]
    time: bool,
    // 0 means descending, anything else ascending.
    #[serde(default)]
    sort: i64,
}

impl Settings {
    pub fn load(cli: &Cli) -> BoardResult<Self> {
        if !cli.config.exists() {
            return Err(BoardError::Config(format!(
                "{} not found",
                cli.config.display()
            )));
        }

        let figment = Figment::new()
            .merge(Yaml::file(&cli.config))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(cli));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> BoardResult<Self> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> BoardResult<()> {
        if self.rcon.host.trim().is_empty() {
            return Err(BoardError::Config("rcon.host is empty".to_string()));
        }
        if self.scores.iter().any(|s| s.key.trim().is_empty()) {
            return Err(BoardError::Config("score with an empty key".to_string()));
        }
        if let Some(key) = self.scores.iter().map(|s| &s.key).duplicates().next() {
            return Err(BoardError::Config(format!("duplicate score key '{key}'")));
        }
        if let Some(title) = self.scores.iter().map(|s| &s.title).duplicates().next() {
            return Err(BoardError::Config(format!("duplicate score title '{title}'")));
        }
        Ok(())
    }

    pub fn get_trace_level(&self) -> Level {
        get_trace_level(&self.trace_level)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.refresh_rate > 0 {
            true => Some(Duration::from_secs(self.refresh_rate as u64)),
            false => None,
        }
    }
}

impl Default for RconSettings {
    fn default() -> Self {
        RconSettings {
            host: default_rcon_host(),
            port: default_rcon_port(),
            password: String::new(),
            timeout: Timeout::default(),
        }
    }
}

impl RconSettings {
    pub fn timeout(&self) -> Duration {
        self.timeout.as_duration()
    }
}

impl Timeout {
    pub fn from_secs(secs: i64) -> Self {
        Timeout(secs.max(1) as u64)
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout(1)
    }
}

impl<'de> Deserialize<'de> for Timeout {
    // Anything that does not read as a number of seconds >= 1 becomes 1.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Timeout::from_secs(coerce_value(&raw)))
    }
}

impl From<ScoreEntry> for ScoreDefinition {
    fn from(entry: ScoreEntry) -> Self {
        ScoreDefinition {
            title: entry.title.unwrap_or_else(|| entry.key.clone()),
            key: entry.key,
            is_duration: entry.time,
            sort_ascending: entry.sort != 0,
        }
    }
}

fn get_trace_level(level_str: &str) -> Level {
    match level_str.to_uppercase().as_str() {
        level if level == TRACE_LEVELS[0] => Level::TRACE,
        level if level == TRACE_LEVELS[1] => Level::DEBUG,
        level if level == TRACE_LEVELS[2] => Level::INFO,
        level if level == TRACE_LEVELS[3] => Level::WARN,
        level if level == TRACE_LEVELS[4] => Level::ERROR,
        // Default trace level
        _ => Level::INFO,
    }
}

fn default_trace_level() -> String {
    "INFO".to_string()
}

fn default_rcon_host() -> String {
    "localhost".to_string()
}

fn default_rcon_port() -> u16 {
    25575
}

fn default_page_title() -> String {
    "Scoreboard Rankings".to_string()
}
