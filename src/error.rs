use thiserror::Error;

pub type Result<T> = std::result::Result<T, AggregateError>;

/// Failures surfaced to the indexing framework.
///
/// A missing event is deliberately absent from this list: writers report it
/// as `Ok(None)`.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("malformed {limb} amount limb `{value}`: {reason}")]
    MalformedAmount {
        limb: &'static str,
        value: String,
        reason: String,
    },

    #[error("block timestamp {0} is outside the representable calendar range")]
    InvalidTimestamp(u64),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("postgres pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("invalid replay record on line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl AggregateError {
    pub(crate) fn malformed(limb: &'static str, value: &str, reason: impl ToString) -> Self {
        AggregateError::MalformedAmount {
            limb,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures of the backing store, as opposed to bad input.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            AggregateError::Postgres(_) | AggregateError::Pool(_) | AggregateError::StorageUnavailable(_)
        )
    }
}
