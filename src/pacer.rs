//! Gas monitor: a CPU-proportional timeout.
//!
//! The pacer burns through `gas * scale_factor` loop iterations, polling the
//! cancellation signal on every one. How long that takes depends on host
//! speed and contention; it is not a wall-clock deadline.

use serde::Serialize;

use crate::cancel::CancellationSignal;
use crate::events::{Event, EventSink};

pub const DEFAULT_SCALE_FACTOR: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PacerOutcome {
    Exhausted { iterations: u64 },
    Cancelled { iterations: u64 },
}

/// Loop iterations granted for `gas`. Non-positive gas buys nothing.
pub fn budget(gas: i64, scale_factor: u64) -> u64 {
    u64::try_from(gas)
        .unwrap_or(0)
        .saturating_mul(scale_factor)
}

pub fn run_pacer(
    gas: i64,
    scale_factor: u64,
    signal: &CancellationSignal,
    sink: &dyn EventSink,
) -> PacerOutcome {
    let budget = budget(gas, scale_factor);
    log::debug!("Pacer started with budget of {} loops", budget);

    let mut i = 0u64;
    while i < budget {
        if signal.is_cancelled() {
            sink.emit(Event::PacerCancelled { iterations: i });
            return PacerOutcome::Cancelled { iterations: i };
        }
        i = std::hint::black_box(i + 1);
    }

    sink.emit(Event::PacerExhausted { iterations: i });
    PacerOutcome::Exhausted { iterations: i }
}
