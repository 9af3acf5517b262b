// campaign-core/src/core/time.rs
// ============================================================================
// Module: Campaign Time Model
// Description: Canonical timestamp representation for run-state and artifacts.
// Purpose: Provide a single unix-millis time value threaded explicitly through Execute.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Unlike a pure-replay engine, the campaign execution engine genuinely needs
//! wall-clock time: `startedAt`/`finishedAt` are real event times and `RunId`
//! generation is time-derived. To keep this crate free of I/O and keep engine
//! tests deterministic, [`Timestamp::now`] is the only place the clock is
//! read; `campaign-engine` calls it once per invocation and threads the
//! result through `Execute` rather than re-reading the clock mid-algorithm.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix-epoch-milliseconds timestamp used throughout run-state and artifacts.
///
/// # Invariants
/// - Serializes as a bare integer (milliseconds since the unix epoch).
/// - Callers thread the value explicitly rather than re-reading the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Builds a timestamp from a raw unix-milliseconds value.
    #[must_use]
    pub const fn from_unix_millis(value: i64) -> Self {
        Self(value)
    }

    /// Reads the current wall-clock time.
    ///
    /// Falls back to the unix epoch if the system clock is set before it,
    /// which would indicate a misconfigured host rather than a condition
    /// worth failing the campaign invocation over.
    #[must_use]
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        #[allow(clippy::cast_possible_wrap, reason = "millisecond epoch fits i64 until year 292278994")]
        Self(duration.as_millis() as i64)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(&self) -> i64 {
        self.0
    }

    /// Returns the elapsed milliseconds from `self` to `other`, saturating at
    /// zero if `other` precedes `self`.
    #[must_use]
    pub fn elapsed_millis_until(&self, other: Timestamp) -> u64 {
        let delta = other.0.saturating_sub(self.0).max(0);
        #[allow(clippy::cast_sign_loss, reason = "delta clamped to >= 0 above")]
        {
            delta as u64
        }
    }
}
