//! Utility functions for the tally writers.
//!
//! - [`conversion`] - `u256` limb parsing and fixed-point scaling
//! - [`buckets`] - Block timestamp to calendar bucket ids

mod buckets;
mod conversion;

// ============================================
// Re-exports
// ============================================

// Conversion utilities
pub use conversion::{parse_limb, scale_to_display, u256_to_biguint, uint256_from_limbs};

// Bucketing utilities
pub use buckets::{BucketTimezone, TimeBuckets};
