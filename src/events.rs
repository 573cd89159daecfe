//! Structured events emitted by the engine. Rendering is left to the sink.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;

use crate::executor::HaltCause;
use crate::supervisor::Participant;
use crate::watchdog::WatchdogExit;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    OperationStarted {
        index: usize,
    },
    OperationCompleted {
        index: usize,
        cycles: u64,
        gas_limit: i64,
        exceeded: bool,
    },
    SequenceHalted {
        index: usize,
        cause: HaltCause,
    },
    SequenceCancelled {
        next_index: usize,
    },
    CancellationRequested,
    PacerExhausted {
        iterations: u64,
    },
    PacerCancelled {
        iterations: u64,
    },
    RaceWinner {
        winner: Participant,
    },
    WorkloadFaulted {
        cause: String,
    },
    WatchdogStopped {
        exit: WatchdogExit,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

pub type SharedSink = Arc<dyn EventSink>;

/// Renders events through the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Event) {
        match event {
            Event::OperationStarted { index } => log::info!("Executing operation #{}", index),
            Event::OperationCompleted {
                index,
                cycles,
                gas_limit,
                exceeded,
            } => {
                if exceeded {
                    log::warn!(
                        "Gas limit exceeded for operation #{} - gas spent: {}; gas limit: {}",
                        index,
                        cycles,
                        gas_limit
                    );
                }
                log::info!(
                    "Executed operation #{} - gas spent: {}; gas limit: {}",
                    index,
                    cycles,
                    gas_limit
                );
            }
            Event::SequenceHalted { index, cause } => {
                log::warn!("Sequence halted at operation #{}: {}", index, cause)
            }
            Event::SequenceCancelled { next_index } => {
                log::info!("Sequence cancelled before operation #{}", next_index)
            }
            Event::CancellationRequested => log::info!("Cancellation requested"),
            Event::PacerExhausted { iterations } => {
                log::info!("Pacer completed after {} loops: gas limit exceeded", iterations)
            }
            Event::PacerCancelled { iterations } => {
                log::info!("Pacer cancelled after {} loops", iterations)
            }
            Event::RaceWinner { winner } => log::info!("Race won by {}", winner),
            Event::WorkloadFaulted { cause } => {
                log::warn!("Operation cancelled: gas limit exceeded ({})", cause)
            }
            Event::WatchdogStopped { exit } => log::info!(
                "Watchdog cancelled, exiting {} loop after {} passes",
                exit.level,
                exit.outer_passes
            ),
        }
    }
}

/// Writes one JSON object per event to stdout.
#[derive(Debug, Default)]
pub struct JsonSink;

impl EventSink for JsonSink {
    fn emit(&self, event: Event) {
        match serde_json::to_string(&event) {
            Ok(line) => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = writeln!(out, "{}", line) {
                    log::error!("Failed to write event: {}", e);
                }
            }
            Err(e) => log::error!("Failed to serialize event {:?}: {}", event, e),
        }
    }
}

#[cfg(test)]
pub use recorder::Recorder;

#[cfg(test)]
mod recorder {
    use std::sync::Mutex;

    use super::{Event, EventSink};

    #[derive(Debug, Default)]
    pub struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
            self.events.lock().unwrap().iter().filter(|e| pred(*e)).count()
        }
    }

    impl EventSink for Recorder {
        fn emit(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }
}
