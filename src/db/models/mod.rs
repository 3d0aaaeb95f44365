mod metric;

pub use metric::{AdditiveUpsert, MetricRow, MetricTable, GLOBAL_METRIC_ID};
