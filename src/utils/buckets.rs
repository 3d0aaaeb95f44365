//! Calendar bucketing of block timestamps.
//!
//! Every event lands in one monthly bucket (`YYYY/MM`) and one daily bucket
//! (`YYYY/MM/DD`). Which calendar day a timestamp belongs to depends on the
//! timezone, so it is always explicit.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::Deserialize;

use crate::error::{AggregateError, Result};

/// Timezone used to turn a block timestamp into calendar buckets.
///
/// `LegacyMixed` takes year and month from the given offset but the day of
/// month from UTC. Deployments that were bucketed that way historically need
/// it to keep new rows consistent with old ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum BucketTimezone {
    #[default]
    Utc,
    Fixed(FixedOffset),
    LegacyMixed(FixedOffset),
}

impl FromStr for BucketTimezone {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
            return Ok(BucketTimezone::Utc);
        }
        if let Some(offset) = s.strip_prefix("legacy:") {
            return parse_offset(offset).map(BucketTimezone::LegacyMixed);
        }
        parse_offset(s).map(BucketTimezone::Fixed)
    }
}

impl TryFrom<String> for BucketTimezone {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for BucketTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketTimezone::Utc => f.write_str("UTC"),
            BucketTimezone::Fixed(offset) => write!(f, "{}", offset),
            BucketTimezone::LegacyMixed(offset) => write!(f, "legacy:{}", offset),
        }
    }
}

/// Parse `+HH:MM`, `-HH:MM` or `+HHMM`.
fn parse_offset(s: &str) -> std::result::Result<FixedOffset, String> {
    s.parse::<FixedOffset>()
        .map_err(|_| format!("invalid timezone offset `{}` (expected UTC or +HH:MM)", s))
}

/// Calendar buckets for one timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBuckets {
    pub year: i32,
    /// Zero-padded, `"01"`..`"12"`.
    pub month: String,
    /// Zero-padded, `"01"`..`"31"`.
    pub day: String,
}

impl TimeBuckets {
    /// Derive buckets for a Unix timestamp in seconds.
    pub fn from_timestamp(timestamp: u64, timezone: BucketTimezone) -> Result<Self> {
        let utc: DateTime<Utc> = i64::try_from(timestamp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or(AggregateError::InvalidTimestamp(timestamp))?;

        let (year, month, day) = match timezone {
            BucketTimezone::Utc => (utc.year(), utc.month(), utc.day()),
            BucketTimezone::Fixed(offset) => {
                let local = utc.with_timezone(&offset);
                (local.year(), local.month(), local.day())
            },
            BucketTimezone::LegacyMixed(offset) => {
                let local = utc.with_timezone(&offset);
                (local.year(), local.month(), utc.day())
            },
        };

        Ok(Self {
            year,
            month: format!("{:02}", month),
            day: format!("{:02}", day),
        })
    }

    pub fn month_id(&self) -> String {
        format!("{:04}/{}", self.year, self.month)
    }

    pub fn day_id(&self) -> String {
        format!("{}/{}", self.month_id(), self.day)
    }
}
