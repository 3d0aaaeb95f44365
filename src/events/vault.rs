use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Which side of the vault an event moved funds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Deposit,
    Withdrawal,
}

impl EventKind {
    /// Column prefix used by the metric tables (`deposit_count`, `withdrawal_amount`, ...).
    pub fn column_prefix(self) -> &'static str {
        match self {
            EventKind::Deposit => "deposit",
            EventKind::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_prefix())
    }
}

/// Block metadata supplied alongside every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Unix seconds at inclusion.
    pub timestamp: u64,
}

/// The undecoded log record the event was decoded from.
///
/// Only its presence is checked; a framework replaying filtered blocks may
/// hand the writers an event without it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub data: Vec<String>,
}

/// One 128-bit half of a `u256`, as rendered by the framework.
///
/// Felts usually arrive as decimal or `0x` hex strings, but are sometimes
/// emitted as bare JSON integers, which may exceed `u64`. Whatever form
/// arrives is kept verbatim as text and validated later by
/// [`parse_limb`](crate::utils::parse_limb), so a negative or fractional
/// number surfaces as a malformed amount rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limb(String);

impl Limb {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Limb {
    fn from(value: &str) -> Self {
        Limb(value.to_string())
    }
}

impl From<u64> for Limb {
    fn from(value: u64) -> Self {
        Limb(value.to_string())
    }
}

impl From<u128> for Limb {
    fn from(value: u128) -> Self {
        Limb(value.to_string())
    }
}

impl Serialize for Limb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Limb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json's `arbitrary_precision` keeps the original digits of
        // numbers, including ones wider than 64 bits.
        let text = match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        };
        Ok(Limb(text))
    }
}

/// A `u256` split into its high and low 128-bit limbs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uint256Parts {
    pub high: Limb,
    pub low: Limb,
}

/// Decoded `Deposit` / `Withdrawal` event body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub amount: Uint256Parts,
}

impl TransferEvent {
    pub fn new(high: impl Into<Limb>, low: impl Into<Limb>) -> Self {
        Self {
            amount: Uint256Parts {
                high: high.into(),
                low: low.into(),
            },
        }
    }
}
