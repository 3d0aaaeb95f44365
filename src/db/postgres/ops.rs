use async_trait::async_trait;
use log::{debug, error};
use once_cell::sync::Lazy;
use postgres_types::ToSql;
use rustc_hash::FxHashMap;
use tokio_postgres::Row;

use crate::{
    db::{
        models::{AdditiveUpsert, MetricRow, MetricTable},
        postgres::PostgresClient,
        MetricStore,
    },
    error::{AggregateError, Result},
    events::EventKind,
};

const BASE_COLUMNS: [&str; 7] = [
    "id",
    "deposit_count",
    "deposit_amount",
    "withdrawal_count",
    "withdrawal_amount",
    "month",
    "year",
];

fn columns(table: MetricTable) -> Vec<&'static str> {
    let mut cols = BASE_COLUMNS.to_vec();
    if table.has_day() {
        cols.push("day");
    }
    cols
}

/// Build the insert-or-accumulate statement for one table and event kind.
///
/// On conflict only the `kind` counters grow, by the values of the row that
/// would have been inserted.
fn build_upsert_statement(table: MetricTable, kind: EventKind) -> String {
    let cols = columns(table);
    let placeholders: Vec<String> = (1..=cols.len()).map(|n| format!("${}", n)).collect();
    let name = table.table_name();
    let prefix = kind.column_prefix();

    format!(
        r#"
        INSERT INTO {name} ({cols})
        VALUES ({placeholders})
        ON CONFLICT (id) DO UPDATE SET
            {prefix}_count = {name}.{prefix}_count + EXCLUDED.{prefix}_count,
            {prefix}_amount = {name}.{prefix}_amount + EXCLUDED.{prefix}_amount
        "#,
        name = name,
        cols = cols.join(", "),
        placeholders = placeholders.join(", "),
        prefix = prefix,
    )
}

fn build_select_statement(table: MetricTable) -> String {
    format!(
        "SELECT {} FROM {} WHERE id = $1",
        columns(table).join(", "),
        table.table_name()
    )
}

static UPSERT_STATEMENTS: Lazy<FxHashMap<(MetricTable, EventKind), String>> = Lazy::new(|| {
    let mut statements = FxHashMap::default();
    for table in MetricTable::ALL {
        for kind in [EventKind::Deposit, EventKind::Withdrawal] {
            statements.insert((table, kind), build_upsert_statement(table, kind));
        }
    }
    statements
});

static SELECT_STATEMENTS: Lazy<FxHashMap<MetricTable, String>> = Lazy::new(|| {
    MetricTable::ALL
        .into_iter()
        .map(|table| (table, build_select_statement(table)))
        .collect()
});

/// Counters are BIGINT in Postgres.
fn count_param(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Counts are `BIGINT` columns but only ever incremented from zero, so a
/// negative value means the row was written by something else.
fn count_from_column(table: MetricTable, id: &str, column: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        AggregateError::StorageUnavailable(format!(
            "negative {} ({}) in {} row {}",
            column, value, table, id
        ))
    })
}

fn row_to_metric(table: MetricTable, row: &Row) -> Result<MetricRow> {
    let id: String = row.get("id");
    let deposit_count =
        count_from_column(table, &id, "deposit_count", row.get("deposit_count"))?;
    let withdrawal_count =
        count_from_column(table, &id, "withdrawal_count", row.get("withdrawal_count"))?;

    Ok(MetricRow {
        id,
        deposit_count,
        deposit_amount: row.get("deposit_amount"),
        withdrawal_count,
        withdrawal_amount: row.get("withdrawal_amount"),
        month: row.get("month"),
        year: row.get("year"),
        day: if table.has_day() { row.get("day") } else { None },
    })
}

#[async_trait]
impl MetricStore for PostgresClient {
    /// Runs every upsert inside one transaction. An early return drops the
    /// transaction, which rolls it back.
    async fn upsert_additive(&self, upserts: &[AdditiveUpsert]) -> Result<()> {
        if upserts.is_empty() {
            return Ok(());
        }

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        for upsert in upserts {
            let sql = &UPSERT_STATEMENTS[&(upsert.table, upsert.kind)];
            let stmt = tx.prepare_cached(sql).await?;

            let row = &upsert.row;
            let deposit_count = count_param(row.deposit_count);
            let withdrawal_count = count_param(row.withdrawal_count);
            let mut params: Vec<&(dyn ToSql + Sync)> = vec![
                &row.id,
                &deposit_count,
                &row.deposit_amount,
                &withdrawal_count,
                &row.withdrawal_amount,
                &row.month,
                &row.year,
            ];
            if upsert.table.has_day() {
                params.push(&row.day);
            }

            tx.execute(&stmt, &params).await.map_err(|e| {
                error!(
                    "Failed to upsert {} row {} ({}): {:?}",
                    upsert.table, row.id, upsert.kind, e
                );
                e
            })?;
        }

        tx.commit().await?;
        debug!("Committed {} metric upserts", upserts.len());

        Ok(())
    }

    async fn get_metric(&self, table: MetricTable, id: &str) -> Result<Option<MetricRow>> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(&SELECT_STATEMENTS[&table]).await?;
        let row = client.query_opt(&stmt, &[&id]).await?;

        row.map(|row| row_to_metric(table, &row)).transpose()
    }
}
