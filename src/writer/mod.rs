pub mod aggregator;
pub mod replay;

pub use aggregator::{AggregatedEvent, MetricAggregator};
pub use replay::{replay_events, replay_file, ReplayRecord, ReplaySummary};
