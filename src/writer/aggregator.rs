use alloy::primitives::U256;
use log::debug;

use crate::{
    config::AggregatorSettings,
    db::{AdditiveUpsert, MetricRow, MetricStore, MetricTable, GLOBAL_METRIC_ID},
    error::Result,
    events::{Block, EventKind, RawEvent, TransferEvent},
    utils::{parse_limb, scale_to_display, uint256_from_limbs, TimeBuckets},
};

/// What a single event contributed to the aggregate tables.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedEvent {
    pub kind: EventKind,
    pub raw_amount: U256,
    pub amount: f64,
    pub month_id: String,
    pub day_id: String,
}

/// Writer for vault `Deposit` and `Withdrawal` events.
///
/// Each event becomes one batch of additive upserts: the `global` row (when
/// enabled), its month row and its day row. The batch is handed to the store
/// in a single call, which applies it atomically.
#[derive(Debug, Clone, Default)]
pub struct MetricAggregator {
    settings: AggregatorSettings,
}

impl MetricAggregator {
    pub fn new(settings: AggregatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    pub async fn on_deposit<S: MetricStore + ?Sized>(
        &self,
        store: &S,
        block: &Block,
        raw_event: Option<&RawEvent>,
        event: Option<&TransferEvent>,
    ) -> Result<Option<AggregatedEvent>> {
        self.aggregate(store, EventKind::Deposit, block, raw_event, event).await
    }

    pub async fn on_withdrawal<S: MetricStore + ?Sized>(
        &self,
        store: &S,
        block: &Block,
        raw_event: Option<&RawEvent>,
        event: Option<&TransferEvent>,
    ) -> Result<Option<AggregatedEvent>> {
        self.aggregate(store, EventKind::Withdrawal, block, raw_event, event).await
    }

    /// Apply one event to the aggregate tables.
    ///
    /// Returns `Ok(None)` without writing when the framework delivered no
    /// event or no raw log. Malformed amounts and out-of-range timestamps
    /// fail before anything is written; store errors are returned as is.
    pub async fn aggregate<S: MetricStore + ?Sized>(
        &self,
        store: &S,
        kind: EventKind,
        block: &Block,
        raw_event: Option<&RawEvent>,
        event: Option<&TransferEvent>,
    ) -> Result<Option<AggregatedEvent>> {
        let event = match (raw_event, event) {
            (Some(_), Some(event)) => event,
            _ => {
                debug!(
                    "Skipping {} at timestamp {}: event or raw log missing",
                    kind, block.timestamp
                );
                return Ok(None);
            },
        };

        let (aggregated, upserts) = self.plan(kind, block, event)?;
        store.upsert_additive(&upserts).await?;

        debug!(
            "Aggregated {} of {} into {} ({} rows)",
            kind,
            aggregated.amount,
            aggregated.day_id,
            upserts.len()
        );

        Ok(Some(aggregated))
    }

    /// Decode an event into its display amount and the upserts it implies,
    /// without touching any store.
    pub fn plan(
        &self,
        kind: EventKind,
        block: &Block,
        event: &TransferEvent,
    ) -> Result<(AggregatedEvent, Vec<AdditiveUpsert>)> {
        let (raw_amount, amount) = self.decode_amount(event)?;
        let buckets = TimeBuckets::from_timestamp(block.timestamp, self.settings.timezone)?;
        let month_id = buckets.month_id();
        let day_id = buckets.day_id();

        let mut targets = Vec::with_capacity(3);
        if self.settings.include_global_bucket {
            targets.push((MetricTable::Global, GLOBAL_METRIC_ID.to_string()));
        }
        targets.push((MetricTable::Monthly, month_id.clone()));
        targets.push((MetricTable::Daily, day_id.clone()));

        let upserts = targets
            .into_iter()
            .map(|(table, id)| AdditiveUpsert {
                table,
                kind,
                row: MetricRow::seed(table, id, kind, amount, &buckets),
            })
            .collect();

        Ok((
            AggregatedEvent {
                kind,
                raw_amount,
                amount,
                month_id,
                day_id,
            },
            upserts,
        ))
    }

    /// Rebuild the `u256` amount and scale it to the configured precision.
    pub fn decode_amount(&self, event: &TransferEvent) -> Result<(U256, f64)> {
        let high = parse_limb("high", event.amount.high.as_str())?;
        let low = parse_limb("low", event.amount.low.as_str())?;
        let raw = uint256_from_limbs(high, low);

        Ok((
            raw,
            scale_to_display(raw, self.settings.decimals, self.settings.display_precision),
        ))
    }
}
