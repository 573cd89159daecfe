use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};

use crate::cancel::CancellationSignal;
use crate::events::{Event, SharedSink};
use crate::executor::panic_message;
use crate::pacer::{run_pacer, PacerOutcome, DEFAULT_SCALE_FACTOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Participant {
    Pacer,
    Workload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceReport {
    pub winner: Participant,
    /// Set when the workload panicked or was aborted.
    pub workload_fault: Option<String>,
    /// `None` when the losing pacer was left running.
    pub pacer: Option<PacerOutcome>,
}

enum Finished<T> {
    Pacer(Result<PacerOutcome, JoinError>),
    Workload(Result<T, JoinError>),
}

pub struct Supervisor {
    sink: SharedSink,
    scale_factor: u64,
    stop_losing_pacer: bool,
}

impl Supervisor {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            sink,
            scale_factor: DEFAULT_SCALE_FACTOR,
            stop_losing_pacer: true,
        }
    }

    pub fn scale_factor(mut self, scale_factor: u64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// When the workload wins, stop the pacer through a private child
    /// signal. With `false` the pacer runs until its budget is spent.
    pub fn stop_losing_pacer(mut self, stop: bool) -> Self {
        self.stop_losing_pacer = stop;
        self
    }

    /// Race `workload` against a pacer holding `gas`. If the pacer finishes
    /// first, `signal` is cancelled and the workload is drained before
    /// returning. Workload faults are reported, never propagated.
    pub async fn race<T: Send + 'static>(
        &self,
        mut workload: JoinHandle<T>,
        gas: i64,
        signal: &CancellationSignal,
    ) -> RaceReport {
        let pacer_signal = signal.child();
        let pacer_stop = pacer_signal.clone();
        let sink = self.sink.clone();
        let scale_factor = self.scale_factor;
        let mut pacer = tokio::task::spawn_blocking(move || {
            run_pacer(gas, scale_factor, &pacer_signal, sink.as_ref())
        });

        let finished = tokio::select! {
            result = &mut pacer => Finished::Pacer(result),
            result = &mut workload => Finished::Workload(result),
        };

        match finished {
            Finished::Pacer(result) => {
                self.sink.emit(Event::RaceWinner {
                    winner: Participant::Pacer,
                });
                let pacer = match result {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        log::error!("Pacer task failed: {}", e);
                        None
                    }
                };
                if signal.cancel() {
                    self.sink.emit(Event::CancellationRequested);
                } else {
                    log::debug!("Signal was already cancelled when the pacer finished");
                }
                let workload_fault = self.drain(workload.await);
                RaceReport {
                    winner: Participant::Pacer,
                    workload_fault,
                    pacer,
                }
            }
            Finished::Workload(result) => {
                self.sink.emit(Event::RaceWinner {
                    winner: Participant::Workload,
                });
                let workload_fault = self.drain(result);
                let pacer = if self.stop_losing_pacer {
                    pacer_stop.cancel();
                    match pacer.await {
                        Ok(outcome) => Some(outcome),
                        Err(e) => {
                            log::error!("Pacer task failed: {}", e);
                            None
                        }
                    }
                } else {
                    None
                };
                RaceReport {
                    winner: Participant::Workload,
                    workload_fault,
                    pacer,
                }
            }
        }
    }

    fn drain<T>(&self, result: Result<T, JoinError>) -> Option<String> {
        let err = result.err()?;
        let cause = if err.is_panic() {
            panic_message(&*err.into_panic())
        } else {
            err.to_string()
        };
        self.sink.emit(Event::WorkloadFaulted {
            cause: cause.clone(),
        });
        Some(cause)
    }
}

/// Race `workload` against the pacer with default settings. Returns `true`
/// once the loser has been accounted for.
pub async fn supervise_race<T: Send + 'static>(
    workload: JoinHandle<T>,
    gas: i64,
    signal: &CancellationSignal,
    sink: SharedSink,
) -> bool {
    let report = Supervisor::new(sink).race(workload, gas, signal).await;
    log::debug!("Race finished: {:?}", report);
    true
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::events::Recorder;

    const POLL_EVERY: u64 = 1_000_000;

    fn loop_until_cancelled(signal: CancellationSignal, done: Arc<AtomicBool>) -> JoinHandle<u64> {
        tokio::task::spawn_blocking(move || {
            let mut i = 0u64;
            loop {
                i = std::hint::black_box(i + 1);
                if i % POLL_EVERY == 0 && signal.is_cancelled() {
                    break;
                }
            }
            done.store(true, Ordering::SeqCst);
            i
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tiny_budget_cancels_and_drains_workload() {
        let signal = CancellationSignal::new();
        let done = Arc::new(AtomicBool::new(false));
        let recorder = Arc::new(Recorder::default());
        let workload = loop_until_cancelled(signal.clone(), done.clone());

        let completed = supervise_race(workload, 1, &signal, recorder.clone()).await;

        assert!(completed);
        assert!(signal.is_cancelled());
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(recorder.count(|e| *e == Event::CancellationRequested), 1);
        assert_eq!(
            recorder.count(|e| *e == Event::RaceWinner { winner: Participant::Pacer }),
            1
        );
        assert_eq!(recorder.count(|e| matches!(e, Event::PacerExhausted { .. })), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn quick_workload_wins_without_cancelling() {
        let signal = CancellationSignal::new();
        let recorder = Arc::new(Recorder::default());
        let workload = tokio::spawn(async { 7 });

        let report = Supervisor::new(recorder.clone())
            .race(workload, 1_000_000, &signal)
            .await;

        assert_eq!(report.winner, Participant::Workload);
        assert_eq!(report.workload_fault, None);
        assert!(matches!(report.pacer, Some(PacerOutcome::Cancelled { .. })));
        assert!(!signal.is_cancelled());
        assert_eq!(recorder.count(|e| *e == Event::CancellationRequested), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn losing_pacer_can_be_left_running() {
        let signal = CancellationSignal::new();
        let recorder = Arc::new(Recorder::default());
        let workload = tokio::spawn(async {});

        let report = Supervisor::new(recorder.clone())
            .stop_losing_pacer(false)
            .race(workload, 20, &signal)
            .await;

        assert_eq!(report.winner, Participant::Workload);
        assert_eq!(report.pacer, None);
        assert!(!signal.is_cancelled());
        assert_eq!(recorder.count(|e| *e == Event::CancellationRequested), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fault_during_unwind_is_reported() {
        let signal = CancellationSignal::new();
        let recorder = Arc::new(Recorder::default());
        let watched = signal.clone();
        let workload = tokio::task::spawn_blocking(move || {
            while !watched.is_cancelled() {
                std::hint::spin_loop();
            }
            panic!("unwind failed");
        });

        let report = Supervisor::new(recorder.clone())
            .scale_factor(1_000)
            .race(workload, 1, &signal)
            .await;

        assert_eq!(report.winner, Participant::Pacer);
        assert_eq!(report.workload_fault.as_deref(), Some("unwind failed"));
        assert_eq!(
            recorder.count(|e| matches!(e, Event::WorkloadFaulted { cause } if cause == "unwind failed")),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn already_cancelled_signal_is_not_requested_twice() {
        let signal = CancellationSignal::new();
        signal.cancel();
        let recorder = Arc::new(Recorder::default());
        let done = Arc::new(AtomicBool::new(false));
        let workload = loop_until_cancelled(signal.clone(), done.clone());

        let report = Supervisor::new(recorder.clone())
            .race(workload, 1_000_000, &signal)
            .await;

        assert!(done.load(Ordering::SeqCst));
        assert_eq!(recorder.count(|e| *e == Event::CancellationRequested), 0);
        if report.winner == Participant::Pacer {
            assert!(matches!(report.pacer, Some(PacerOutcome::Cancelled { .. })));
        }
    }
}
