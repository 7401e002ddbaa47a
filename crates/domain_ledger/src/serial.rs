//! Serial number generation
//!
//! Serials look like `SAL-20260314093012-9f1c2ab4`: kind prefix, UTC
//! timestamp to the second, and eight hex digits of randomness. Uniqueness is
//! enforced by the store; the ledger retries on collision.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::transaction::TransactionKind;

/// Source of candidate serials
pub trait SerialGenerator: Send + Sync {
    /// Produces a candidate serial for a row of `kind` recorded at `at`
    fn next_serial(&self, kind: TransactionKind, at: DateTime<Utc>) -> String;
}

/// Timestamp plus random suffix
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampSerials;

impl SerialGenerator for TimestampSerials {
    fn next_serial(&self, kind: TransactionKind, at: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            kind.serial_prefix(),
            at.format("%Y%m%d%H%M%S"),
            &suffix[..8]
        )
    }
}
