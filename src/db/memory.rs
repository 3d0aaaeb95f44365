use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use log::debug;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use crate::{
    db::{
        models::{AdditiveUpsert, MetricRow, MetricTable},
        MetricStore,
    },
    error::{AggregateError, Result},
};

/// In-process metric store.
///
/// A whole batch is applied under one lock acquisition, which gives the same
/// all-or-nothing and no-lost-update guarantees as a database transaction.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<FxHashMap<(MetricTable, String), MetricRow>>,
    pending_failures: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` batches fail with
    /// [`AggregateError::StorageUnavailable`] without touching any row.
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// All rows of `table`, sorted by id.
    pub async fn rows(&self, table: MetricTable) -> Vec<MetricRow> {
        let rows = self.rows.lock().await;
        let mut out: Vec<MetricRow> = rows
            .iter()
            .filter(|((t, _), _)| *t == table)
            .map(|(_, row)| row.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn upsert_additive(&self, upserts: &[AdditiveUpsert]) -> Result<()> {
        if self.take_failure() {
            return Err(AggregateError::StorageUnavailable(
                "injected memory store failure".to_string(),
            ));
        }

        let mut rows = self.rows.lock().await;
        for upsert in upserts {
            rows.entry((upsert.table, upsert.row.id.clone()))
                .and_modify(|row| {
                    row.accumulate(upsert.kind, upsert.count_delta(), upsert.amount_delta())
                })
                .or_insert_with(|| upsert.row.clone());
        }
        debug!("Applied {} metric upserts in memory", upserts.len());

        Ok(())
    }

    async fn get_metric(&self, table: MetricTable, id: &str) -> Result<Option<MetricRow>> {
        let rows = self.rows.lock().await;
        Ok(rows.get(&(table, id.to_string())).cloned())
    }
}
