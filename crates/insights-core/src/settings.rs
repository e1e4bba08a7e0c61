use chrono::NaiveDate;
use clap::{CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::calculations::MetricsConfig;
use crate::error::{InsightsError, Result};
use crate::models::AggregationPeriod;
use crate::time_utils;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Team usage analytics for Cursor CSV exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cursor-insights",
    about = "Team usage analytics for Cursor CSV exports",
    version
)]
pub struct Settings {
    /// CSV export, or a directory searched recursively for *.csv files
    pub input: PathBuf,

    /// Time-series bucket size
    #[arg(long, default_value = "day", value_parser = ["day", "week", "month"])]
    pub period: String,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<String>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<String>,

    /// Restrict to these users (email or user id); repeat or comma-separate
    #[arg(long = "user", value_delimiter = ',')]
    pub users: Vec<String>,

    /// Lines a developer writes by hand per minute
    #[arg(long, default_value = "10")]
    pub lines_per_minute: f64,

    /// Developer cost per hour (USD)
    #[arg(long, default_value = "50")]
    pub hourly_rate: f64,

    /// Monthly subscription price per seat (USD)
    #[arg(long, default_value = "40")]
    pub subscription_cost: f64,

    /// Timezone used to assign timestamps to days (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Keep rows whose "Is Active" flag is false
    #[arg(long)]
    pub include_inactive: bool,

    /// Leaderboard ordering
    #[arg(
        long,
        default_value = "accepted-lines",
        value_parser = ["accepted-lines", "acceptance-rate", "roi", "applies", "requests"]
    )]
    pub sort: String,

    /// Show only the first N leaderboard rows
    #[arg(long)]
    pub top: Option<usize>,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    /// Config file (defaults to ~/.cursor-insights/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "WARNING", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── FileConfig ─────────────────────────────────────────────────────────────────

/// Optional defaults read from `~/.cursor-insights/config.json`.
///
/// The file is never written by the tool; teams drop one in place to share
/// their rate assumptions.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_per_minute: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

impl FileConfig {
    /// Return the default path to the config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".cursor-insights").join("config.json")
    }

    /// Load the config from `path`.
    ///
    /// A missing file yields the default; a file that exists but cannot be
    /// read or parsed is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| InsightsError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and merge in the config file for every value not
    /// given explicitly on the command line.
    pub fn load() -> Result<Self> {
        Self::load_impl(std::env::args_os().collect(), &FileConfig::config_path())
    }

    /// Full implementation – accepts args and an explicit default config path
    /// so that tests can redirect to a temporary directory.
    pub fn load_impl(args: Vec<std::ffi::OsString>, default_config: &Path) -> Result<Self> {
        // Build raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().try_get_matches_from(args)?;
        let mut settings = Settings::from_arg_matches(&matches)?;

        // Only the implicit home-directory file is optional.
        let file = match &settings.config {
            Some(path) if !path.exists() => {
                return Err(InsightsError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => FileConfig::load_from(path)?,
            None => FileConfig::load_from(default_config)?,
        };

        // NOTE: clap stores the arg id using the *field name* (underscores),
        // not the long-flag spelling (hyphens).
        if !is_arg_explicitly_set(&matches, "lines_per_minute") {
            if let Some(v) = file.lines_per_minute {
                settings.lines_per_minute = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "hourly_rate") {
            if let Some(v) = file.hourly_rate {
                settings.hourly_rate = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "subscription_cost") {
            if let Some(v) = file.subscription_cost {
                settings.subscription_cost = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = file.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "period") {
            if let Some(v) = file.period {
                settings.period = v;
            }
        }

        Ok(Self::resolve_auto_values(settings))
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Metric constants as a validated [`MetricsConfig`].
    pub fn metrics_config(&self) -> Result<MetricsConfig> {
        let config = MetricsConfig {
            lines_per_minute: self.lines_per_minute,
            hourly_rate: self.hourly_rate,
            subscription_cost: self.subscription_cost,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn aggregation_period(&self) -> Result<AggregationPeriod> {
        self.period.parse()
    }

    /// `--since` / `--until` parsed into dates.
    pub fn date_bounds(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        let since = self.since.as_deref().map(time_utils::parse_date_arg).transpose()?;
        let until = self.until.as_deref().map(time_utils::parse_date_arg).transpose()?;
        Ok((since, until))
    }

    pub fn wants_json(&self) -> bool {
        self.format == "json"
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
