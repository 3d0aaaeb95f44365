//! Drive the writers from a recorded event log.
//!
//! Each line of the log is one JSON [`ReplayRecord`]. Records are applied with
//! bounded concurrency, so events in the same bucket routinely race each
//! other; the store's atomic upserts keep the totals exact.

use std::path::Path;

use futures::{stream, StreamExt, TryStreamExt};
use log::info;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::{
    db::MetricStore,
    error::{AggregateError, Result},
    events::{Block, EventKind, RawEvent, TransferEvent},
    writer::MetricAggregator,
};

/// One recorded handler invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub kind: EventKind,
    pub block: Block,
    #[serde(default)]
    pub raw_event: Option<RawEvent>,
    #[serde(default)]
    pub event: Option<TransferEvent>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub skipped: usize,
}

/// Replay every record read from `reader`.
///
/// Stops at the first failing record. Records already applied stay applied;
/// the failing record itself writes nothing. Cancelling `cancel` stops
/// reading new records and returns what was applied so far.
pub async fn replay_events<S, R>(
    aggregator: &MetricAggregator,
    store: &S,
    reader: R,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<ReplaySummary>
where
    S: MetricStore + ?Sized,
    R: AsyncBufRead + Unpin,
{
    let lines = stream::unfold((reader.lines(), 0usize), |(mut lines, line_no)| async move {
        let line_no = line_no + 1;
        match lines.next_line().await {
            Ok(Some(text)) => Some((Ok((line_no, text)), (lines, line_no))),
            Ok(None) => None,
            Err(e) => Some((Err(AggregateError::from(e)), (lines, line_no))),
        }
    });

    lines
        .try_filter_map(|(line, text)| async move {
            if text.trim().is_empty() {
                return Ok(None);
            }
            serde_json::from_str::<ReplayRecord>(&text)
                .map(Some)
                .map_err(|source| AggregateError::InvalidRecord { line, source })
        })
        .map_ok(|record| async move {
            aggregator
                .aggregate(
                    store,
                    record.kind,
                    &record.block,
                    record.raw_event.as_ref(),
                    record.event.as_ref(),
                )
                .await
        })
        .try_buffer_unordered(concurrency.max(1))
        .take_until(cancel.cancelled())
        .try_fold(ReplaySummary::default(), |mut summary, outcome| async move {
            match outcome {
                Some(_) => summary.applied += 1,
                None => summary.skipped += 1,
            }
            Ok(summary)
        })
        .await
}

/// Replay a JSON-lines file from disk.
pub async fn replay_file<S: MetricStore + ?Sized>(
    aggregator: &MetricAggregator,
    store: &S,
    path: impl AsRef<Path>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<ReplaySummary> {
    let path = path.as_ref();
    info!("Replaying events from {}", path.display());

    let file = tokio::fs::File::open(path).await?;
    let summary =
        replay_events(aggregator, store, BufReader::new(file), concurrency, cancel).await?;

    info!(
        "Replay of {} finished: {} applied, {} skipped",
        path.display(),
        summary.applied,
        summary.skipped
    );

    Ok(summary)
}
