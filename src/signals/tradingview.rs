//! TradingView race-order rule. A pure function, decoupled from any I/O so
//! it can be tested directly against worked timestamp scenarios.
//!
//! A file-polled producer can deliver a `position -> flat` pair out of
//! true causal order (the close record lands with a timestamp that looks
//! later than it should, or vice versa). Left alone, naive
//! latest-wins reduction would sometimes pick the wrong terminal state.
//! This rule nudges timestamps so the reduction always lands on the
//! correct terminal value while staying monotonic.

use crate::model::{RawSignal, SignalAdjustment};
use chrono::Duration;

const RACE_WINDOW: Duration = Duration::milliseconds(5_000);
const NUDGE: Duration = Duration::milliseconds(1);

fn is_flat(depth: f64) -> bool {
    depth.abs() <= f64::EPSILON
}

/// Reorders a time-ordered sequence of `RawSignal`s for a single
/// `(source, symbol)` pair and returns the audit trail of adjustments made.
/// Input does not need to be pre-sorted; this sorts by timestamp first.
pub fn reorder_race_pairs(signals: &[RawSignal]) -> (Vec<RawSignal>, Vec<SignalAdjustment>) {
    let mut result = signals.to_vec();
    result.sort_by_key(|s| s.timestamp);

    let mut adjustments = Vec::new();
    for i in 0..result.len().saturating_sub(1) {
        let a_timestamp = result[i].timestamp;
        let a_depth = result[i].depth;
        let b = result[i + 1].clone();

        let gap = b.timestamp - a_timestamp;
        if gap < Duration::zero() || gap > RACE_WINDOW {
            continue;
        }

        let a_is_flat = is_flat(a_depth);
        let b_is_flat = is_flat(b.depth);

        // `position -> flat` or `flat -> position`; same two symmetric other
        // cases (`position -> position`, `flat -> flat`) are left untouched.
        if a_is_flat == b_is_flat {
            continue;
        }

        let adjusted_ts = a_timestamp + NUDGE;
        adjustments.push(SignalAdjustment {
            original_timestamp: b.timestamp,
            adjusted_timestamp: adjusted_ts,
            reason: "position_transition_reorder",
        });
        result[i + 1] = RawSignal { timestamp: adjusted_ts, ..b };
    }

    (result, adjustments)
}

/// Reduces an already-reordered, time-ordered sequence to its terminal
/// (latest) signal. The sequence's own order -- not raw timestamp
/// comparison -- decides "latest", since `reorder_race_pairs` has already
/// resolved true causal order into sequence order.
pub fn latest_of(signals: &[RawSignal]) -> Option<RawSignal> {
    signals.last().cloned()
}
