//! Duration limiter.
//!
//! Polls the signal once per outer pass and once per inner iteration. A
//! cancellation is therefore observed at worst one inner pass
//! (`inner_bound` iterations) after it is requested. There is no exit other
//! than observing the signal.

use serde::Serialize;

use crate::cancel::CancellationSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoopLevel {
    Outer,
    Inner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WatchdogExit {
    /// Loop that saw the signal first.
    pub level: LoopLevel,
    pub outer_passes: u64,
}

pub fn run_watchdog(signal: &CancellationSignal, inner_bound: i64) -> WatchdogExit {
    let mut outer_passes = 0u64;
    loop {
        if signal.is_cancelled() {
            return WatchdogExit {
                level: LoopLevel::Outer,
                outer_passes,
            };
        }
        outer_passes += 1;

        let mut i = 0i64;
        while i < inner_bound {
            if signal.is_cancelled() {
                return WatchdogExit {
                    level: LoopLevel::Inner,
                    outer_passes,
                };
            }
            i = std::hint::black_box(i + 1);
        }
    }
}
