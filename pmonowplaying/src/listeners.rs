//! Listener counts and their reconciliation

use serde::{Deserialize, Serialize};

/// Combine a current and a unique listener count into one figure
///
/// When either count is zero the other one wins. When both are non-zero the
/// smaller one is taken: servers over-count far more often than they
/// under-count.
pub fn reconcile(current: u64, unique: u64) -> u64 {
    if current == 0 || unique == 0 {
        current.max(unique)
    } else {
        current.min(unique)
    }
}

/// Listener figures for a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listeners {
    /// Instantaneous connection count reported by the server
    pub current: u64,
    /// Deduplicated count, when the server or a client roster provides one
    pub unique: Option<u64>,
    /// Caller-facing figure
    pub total: u64,
}

impl Listeners {
    /// Build listener figures, deriving `total` from `current` and `unique`
    ///
    /// Without a unique count the total is the current count.
    pub fn new(current: u64, unique: Option<u64>) -> Self {
        let total = match unique {
            Some(unique) => reconcile(current, unique),
            None => current,
        };

        Self {
            current,
            unique,
            total,
        }
    }

    /// Build listener figures with a total supplied directly
    pub fn with_total(current: u64, unique: Option<u64>, total: u64) -> Self {
        Self {
            current,
            unique,
            total,
        }
    }

    /// Sum two sets of figures
    ///
    /// `current` and `total` add up. `unique` only adds up when both sides
    /// report it; a missing unique count is never treated as zero.
    pub fn combine(&self, other: &Listeners) -> Listeners {
        let unique = match (self.unique, other.unique) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            (a, b) => a.or(b),
        };

        Listeners {
            current: self.current.saturating_add(other.current),
            unique,
            total: self.total.saturating_add(other.total),
        }
    }
}
