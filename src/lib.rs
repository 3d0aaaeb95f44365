pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod utils;
pub mod writer;

pub use crate::config::{AggregatorSettings, Settings};
pub use crate::db::{MemoryStore, MetricStore, PostgresClient};
pub use crate::error::{AggregateError, Result};
pub use crate::writer::{MetricAggregator, ReplaySummary};
