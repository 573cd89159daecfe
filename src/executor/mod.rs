use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::cancel::CancellationSignal;
use crate::contract::Operations;
use crate::events::{Event, SharedSink};
use crate::meter::{MeterResult, ResourceMeter};

/// Why a sequence stopped early.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum HaltCause {
    Failed(String),
    Panicked(String),
}

impl fmt::Display for HaltCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltCause::Failed(msg) => write!(f, "operation failed: {}", msg),
            HaltCause::Panicked(msg) => write!(f, "operation panicked: {}", msg),
        }
    }
}

/// Cost of one completed operation. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub index: usize,
    pub cycles: u64,
    pub gas_limit: i64,
    pub exceeded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Completed {
        reports: Vec<ExecutionReport>,
    },
    Halted {
        reports: Vec<ExecutionReport>,
        index: usize,
        cause: HaltCause,
    },
    Cancelled {
        reports: Vec<ExecutionReport>,
        next_index: usize,
    },
}

impl ExecutionOutcome {
    pub fn reports(&self) -> &[ExecutionReport] {
        match self {
            ExecutionOutcome::Completed { reports }
            | ExecutionOutcome::Halted { reports, .. }
            | ExecutionOutcome::Cancelled { reports, .. } => reports,
        }
    }
}

/// Overages are advisory: a non-zero cost above the declared limit.
pub fn exceeds(cycles: u64, gas_limit: i64) -> bool {
    cycles > 0 && i128::from(cycles) > i128::from(gas_limit)
}

pub struct Executor {
    meter: Arc<dyn ResourceMeter>,
    sink: SharedSink,
    signal: Option<CancellationSignal>,
}

impl Executor {
    pub fn new(meter: Arc<dyn ResourceMeter>, sink: SharedSink) -> Self {
        Self {
            meter,
            sink,
            signal: None,
        }
    }

    /// Poll `signal` before each operation starts. A running operation is
    /// never interrupted.
    pub fn with_signal(mut self, signal: CancellationSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Run every operation in registration order. Only a measurement fault
    /// is returned as an error; operation faults end the run as
    /// [`ExecutionOutcome::Halted`].
    pub fn execute(&self, operations: &Operations) -> MeterResult<ExecutionOutcome> {
        let mut reports = Vec::with_capacity(operations.len());

        for (i, descriptor) in operations.iter().enumerate() {
            let index = i + 1;

            if self.signal.as_ref().is_some_and(|s| s.is_cancelled()) {
                self.sink.emit(Event::SequenceCancelled { next_index: index });
                return Ok(ExecutionOutcome::Cancelled {
                    reports,
                    next_index: index,
                });
            }

            self.sink.emit(Event::OperationStarted { index });

            let start = self.meter.measure()?;
            let result = panic::catch_unwind(AssertUnwindSafe(|| descriptor.invoke()));
            let cause = match result {
                Ok(Ok(_)) => None,
                Ok(Err(fault)) => Some(HaltCause::Failed(fault.to_string())),
                Err(payload) => Some(HaltCause::Panicked(panic_message(&*payload))),
            };
            if let Some(cause) = cause {
                self.sink.emit(Event::SequenceHalted {
                    index,
                    cause: cause.clone(),
                });
                return Ok(ExecutionOutcome::Halted {
                    reports,
                    index,
                    cause,
                });
            }
            let end = self.meter.measure()?;

            let cycles = end.saturating_sub(start);
            let report = ExecutionReport {
                index,
                cycles,
                gas_limit: descriptor.gas_limit,
                exceeded: exceeds(cycles, descriptor.gas_limit),
            };
            self.sink.emit(Event::OperationCompleted {
                index,
                cycles,
                gas_limit: report.gas_limit,
                exceeded: report.exceeded,
            });
            reports.push(report);
        }

        Ok(ExecutionOutcome::Completed { reports })
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
