//! Backfill state of a lookup vindex.
//!
//! A lookup vindex created over an existing table starts write-only: writes
//! maintain the lookup table while an external process copies historical
//! rows. Once that process confirms the table is complete, the vindex is
//! promoted to live. The promotion happens once and is never undone.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillState {
    /// Lookup table is incomplete: reads scatter, verification trusts.
    Backfilling,
    /// Lookup table is authoritative.
    Live,
}

/// Lock-free holder of the backfill state.
///
/// Reads happen on every map/verify call from many tasks; the single write
/// happens when backfill completes.
#[derive(Debug)]
pub struct BackfillFlag {
    write_only: AtomicBool,
}

impl BackfillFlag {
    pub fn new(write_only: bool) -> Self {
        Self {
            write_only: AtomicBool::new(write_only),
        }
    }

    pub fn is_backfilling(&self) -> bool {
        self.write_only.load(Ordering::Acquire)
    }

    pub fn state(&self) -> BackfillState {
        if self.is_backfilling() {
            BackfillState::Backfilling
        } else {
            BackfillState::Live
        }
    }

    /// Moves `Backfilling -> Live`. Returns `true` only for the call that
    /// performed the transition.
    pub fn complete(&self) -> bool {
        self.write_only
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
