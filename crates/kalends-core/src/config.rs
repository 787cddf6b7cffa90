use anyhow::Result;
use config::Config;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub feed: FeedConfig,
    #[serde(default)]
    pub limits: Limits,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Calendar source URL. Accepts https, http, webcal and ical schemes.
    pub url: Option<String>,
    /// Path of the binary timezone table produced by the offline build tool.
    pub timezone_table: String,
    /// Length of the query window in days.
    pub window_days: u32,
    /// Maximum number of events returned per query.
    pub max_events: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Tunable processing limits.
///
/// Defaults are sized for a constrained device pulling a feed of a few
/// hundred events.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Limits {
    /// Hard cap on candidate steps when searching for the next occurrence
    /// of a recurring event.
    pub max_recurrence_iterations: u32,
    /// Cap on generated occurrences per recurring event.
    pub max_occurrences_per_event: u32,
    /// How long cached results are served without any network traffic.
    pub cache_validity_seconds: i64,
    /// Descriptions longer than this are truncated with a marker.
    pub max_description_length: usize,
    /// Cap on RDATE entries processed per event.
    pub max_rdate_count: usize,
    /// Timeout applied to every HTTP request.
    pub http_timeout_seconds: u64,
    /// Wall-clock budget for loading the timezone table; loading past this
    /// yields a partial table.
    pub tz_load_timeout_seconds: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_recurrence_iterations: 200,
            max_occurrences_per_event: 50,
            cache_validity_seconds: 300,
            max_description_length: 200,
            max_rdate_count: 20,
            http_timeout_seconds: 60,
            tz_load_timeout_seconds: 10,
        }
    }
}

/// Selective overrides for [`Limits`]; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct LimitOverrides {
    pub max_recurrence_iterations: Option<u32>,
    pub max_occurrences_per_event: Option<u32>,
    pub cache_validity_seconds: Option<i64>,
    pub max_description_length: Option<usize>,
    pub max_rdate_count: Option<usize>,
    pub http_timeout_seconds: Option<u64>,
}

impl Limits {
    /// Applies the given overrides in place.
    pub fn apply(&mut self, overrides: &LimitOverrides) {
        if let Some(v) = overrides.max_recurrence_iterations {
            self.max_recurrence_iterations = v;
        }
        if let Some(v) = overrides.max_occurrences_per_event {
            self.max_occurrences_per_event = v;
        }
        if let Some(v) = overrides.cache_validity_seconds {
            self.cache_validity_seconds = v;
        }
        if let Some(v) = overrides.max_description_length {
            self.max_description_length = v;
        }
        if let Some(v) = overrides.max_rdate_count {
            self.max_rdate_count = v;
        }
        if let Some(v) = overrides.http_timeout_seconds {
            self.http_timeout_seconds = v;
        }
    }
}

impl Settings {
    /// ## Summary
    /// Loads configuration from environment variables and an optional
    /// `config.toml`. Environment variables take precedence.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        Ok(Config::builder()
            .set_default("feed.timezone_table", "tzid_table.bin")?
            .set_default("feed.window_days", 31)?
            .set_default("feed.max_events", 40)?
            .set_default("logging.level", "debug")?
            // Env file
            .add_source(
                config::Environment::default()
                    .convert_case(config::Case::Snake)
                    .separator("_")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?)
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}
