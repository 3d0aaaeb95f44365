use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{events::EventKind, utils::TimeBuckets};

/// Id of the single lifetime-cumulative row in `metrics`.
pub const GLOBAL_METRIC_ID: &str = "global";

/// The three aggregate tables. All share the [`MetricRow`] shape; only the
/// daily table carries a `day` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricTable {
    Global,
    Monthly,
    Daily,
}

impl MetricTable {
    pub const ALL: [MetricTable; 3] = [MetricTable::Global, MetricTable::Monthly, MetricTable::Daily];

    pub fn table_name(self) -> &'static str {
        match self {
            MetricTable::Global => "metrics",
            MetricTable::Monthly => "monthlymetrics",
            MetricTable::Daily => "dailymetrics",
        }
    }

    pub fn has_day(self) -> bool {
        matches!(self, MetricTable::Daily)
    }
}

impl fmt::Display for MetricTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Aggregate counters for one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub id: String,
    pub deposit_count: u64,
    pub deposit_amount: f64,
    pub withdrawal_count: u64,
    pub withdrawal_amount: f64,
    pub month: String,
    pub year: i32,
    /// Only set on `dailymetrics` rows.
    pub day: Option<String>,
}

impl MetricRow {
    /// Row as inserted by the first event of `kind` to reach this bucket.
    pub fn seed(
        table: MetricTable,
        id: String,
        kind: EventKind,
        amount: f64,
        buckets: &TimeBuckets,
    ) -> Self {
        let mut row = Self {
            id,
            deposit_count: 0,
            deposit_amount: 0.0,
            withdrawal_count: 0,
            withdrawal_amount: 0.0,
            month: buckets.month.clone(),
            year: buckets.year,
            day: table.has_day().then(|| buckets.day.clone()),
        };
        row.accumulate(kind, 1, amount);
        row
    }

    /// Add `count` events totalling `amount` to the `kind` side of the row.
    pub fn accumulate(&mut self, kind: EventKind, count: u64, amount: f64) {
        match kind {
            EventKind::Deposit => {
                self.deposit_count += count;
                self.deposit_amount += amount;
            },
            EventKind::Withdrawal => {
                self.withdrawal_count += count;
                self.withdrawal_amount += amount;
            },
        }
    }

    pub fn count(&self, kind: EventKind) -> u64 {
        match kind {
            EventKind::Deposit => self.deposit_count,
            EventKind::Withdrawal => self.withdrawal_count,
        }
    }

    pub fn amount(&self, kind: EventKind) -> f64 {
        match kind {
            EventKind::Deposit => self.deposit_amount,
            EventKind::Withdrawal => self.withdrawal_amount,
        }
    }
}

/// Insert-or-accumulate against one bucket row.
///
/// If `row.id` is absent from `table`, `row` is inserted as is. Otherwise the
/// `kind` count and amount of `row` are added to the stored row and the other
/// kind's columns are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveUpsert {
    pub table: MetricTable,
    pub kind: EventKind,
    pub row: MetricRow,
}

impl AdditiveUpsert {
    pub fn count_delta(&self) -> u64 {
        self.row.count(self.kind)
    }

    pub fn amount_delta(&self) -> f64 {
        self.row.amount(self.kind)
    }
}
