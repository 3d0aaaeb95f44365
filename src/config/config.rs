use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::utils::BucketTimezone;

/// PostgreSQL connection configuration.
///
/// The database must already hold the `metrics`, `monthlymetrics` and
/// `dailymetrics` tables (see `schema/postgres.sql`).
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// How events are turned into metric rows.
///
/// The two historical writer variants differ only here: one maintains the
/// `global` row, the other does not.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AggregatorSettings {
    #[serde(default = "default_include_global_bucket")]
    pub include_global_bucket: bool,
    /// Token decimals used to scale raw amounts (18 for standard ERC20s).
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Fractional digits kept in stored amounts.
    #[serde(default = "default_display_precision")]
    pub display_precision: u8,
    /// `UTC`, a fixed offset such as `+02:00`, or `legacy:<offset>`.
    #[serde(default)]
    pub timezone: BucketTimezone,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            include_global_bucket: default_include_global_bucket(),
            decimals: default_decimals(),
            display_precision: default_display_precision(),
            timezone: BucketTimezone::default(),
        }
    }
}

fn default_include_global_bucket() -> bool {
    true
}

fn default_decimals() -> u8 {
    18
}

fn default_display_precision() -> u8 {
    5
}

/// Event log replay used by the `tally` binary.
#[derive(Debug, Deserialize, Clone)]
pub struct ReplaySettings {
    /// JSON-lines file, one event per line.
    pub path: String,
    #[serde(default = "default_replay_concurrency")]
    pub concurrency: usize,
}

fn default_replay_concurrency() -> usize {
    8
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup, with `TALLY__SECTION__KEY`
/// environment variables taking precedence.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub postgres: PostgresSettings,
    #[serde(default)]
    pub aggregator: AggregatorSettings,
    pub replay: ReplaySettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .add_source(Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
