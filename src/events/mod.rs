//! Payloads handed to the writers by the indexing framework.
//!
//! The framework decodes contract events before they reach this crate, so
//! these are plain serde structs rather than ABI bindings.

mod vault;

pub use vault::{Block, EventKind, Limb, RawEvent, TransferEvent, Uint256Parts};
