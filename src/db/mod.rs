pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use models::{AdditiveUpsert, MetricRow, MetricTable, GLOBAL_METRIC_ID};
pub use postgres::PostgresClient;
pub use store::MetricStore;
