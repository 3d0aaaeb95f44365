use async_trait::async_trait;

use crate::{
    db::models::{AdditiveUpsert, MetricRow, MetricTable},
    error::Result,
};

/// Storage port for the aggregate tables.
///
/// Writers receive the store per call, so the same aggregator runs against
/// Postgres in production and [`MemoryStore`](crate::db::MemoryStore) in tests.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Apply every upsert in `upserts` as one unit: all of them or none.
    ///
    /// Each upsert must be a single atomic insert-or-accumulate so that
    /// concurrent batches hitting the same bucket never lose an update.
    async fn upsert_additive(&self, upserts: &[AdditiveUpsert]) -> Result<()>;

    /// Read one aggregate row back.
    async fn get_metric(&self, table: MetricTable, id: &str) -> Result<Option<MetricRow>>;
}

#[async_trait]
impl<S: MetricStore + ?Sized> MetricStore for std::sync::Arc<S> {
    async fn upsert_additive(&self, upserts: &[AdditiveUpsert]) -> Result<()> {
        (**self).upsert_additive(upserts).await
    }

    async fn get_metric(&self, table: MetricTable, id: &str) -> Result<Option<MetricRow>> {
        (**self).get_metric(table, id).await
    }
}
