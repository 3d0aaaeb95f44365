#[allow(clippy::module_inception)]
mod config;

pub use self::config::{AggregatorSettings, PostgresSettings, ReplaySettings, Settings};
