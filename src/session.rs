use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::cancel::CancellationSignal;
use crate::config::Config;
use crate::contract::{Contract, ContractInfo};
use crate::events::{Event, SharedSink};
use crate::executor::{ExecutionOutcome, Executor};
use crate::meter::{warm_up, MeterError, ResourceMeter};
use crate::supervisor::{RaceReport, Supervisor};
use crate::watchdog::run_watchdog;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("measurement fault: {0}")]
    Measurement(#[from] MeterError),
    #[error("executor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub contract: ContractInfo,
    pub race: RaceReport,
    pub execution: ExecutionOutcome,
    #[serde(serialize_with = "serialize_elapsed")]
    pub elapsed: Duration,
}

fn serialize_elapsed<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&humantime::format_duration(*d).to_string())
}

/// One execution session: a contract, its settings and where the
/// measurements and events go.
pub struct Session {
    pub contract: Contract,
    pub gas: i64,
    pub scale_factor: u64,
    pub yardstick: i64,
    pub stop_losing_pacer: bool,
    pub meter: Arc<dyn ResourceMeter>,
    pub sink: SharedSink,
}

impl Session {
    pub fn new(config: &Config, meter: Arc<dyn ResourceMeter>, sink: SharedSink) -> Self {
        Self {
            contract: config.build_contract(),
            gas: config.gas,
            scale_factor: config.scale_factor,
            yardstick: config.yardstick,
            stop_losing_pacer: config.stop_losing_pacer,
            meter,
            sink,
        }
    }

    /// Sequential run only, no race.
    pub fn execute(self) -> SessionResult<ExecutionOutcome> {
        warm_up(self.meter.as_ref())?;
        let executor = Executor::new(self.meter, self.sink);
        Ok(executor.execute(&self.contract.operations)?)
    }

    /// Full session. The executor runs on its own and cancels the shared
    /// signal once it is done; meanwhile the watchdog is raced against the
    /// pacer. Whichever side cancels first, every loop unwinds.
    pub async fn run(self) -> SessionResult<SessionReport> {
        warm_up(self.meter.as_ref())?;

        let started = Instant::now();
        let signal = CancellationSignal::new();

        let executor = Executor::new(self.meter.clone(), self.sink.clone()).with_signal(signal.clone());
        let operations = self.contract.operations.clone();
        let done = signal.clone();
        let sink = self.sink.clone();
        let execution = tokio::task::spawn_blocking(move || {
            let outcome = executor.execute(&operations);
            if done.cancel() {
                sink.emit(Event::CancellationRequested);
            }
            outcome
        });

        let watched = signal.clone();
        let sink = self.sink.clone();
        let yardstick = self.yardstick;
        let watchdog = tokio::task::spawn_blocking(move || {
            let exit = run_watchdog(&watched, yardstick);
            sink.emit(Event::WatchdogStopped { exit });
            exit
        });

        let race = Supervisor::new(self.sink.clone())
            .scale_factor(self.scale_factor)
            .stop_losing_pacer(self.stop_losing_pacer)
            .race(watchdog, self.gas, &signal)
            .await;

        let execution = execution.await??;

        Ok(SessionReport {
            contract: self.contract.info,
            race,
            execution,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContractConfig, OperationConfig};
    use crate::contract::OperationKind;
    use crate::events::Recorder;
    use crate::meter::ScriptedMeter;
    use crate::supervisor::Participant;

    fn config(gas: i64, operations: Vec<OperationConfig>) -> Config {
        Config {
            contract: ContractConfig {
                name: Some("Fixture".into()),
            },
            gas,
            scale_factor: 1_000,
            yardstick: 1_000,
            stop_losing_pacer: true,
            operations,
        }
    }

    fn op(kind: OperationKind) -> OperationConfig {
        OperationConfig {
            kind,
            loops: 0,
            gas_limit: 5,
        }
    }

    #[test]
    fn execute_reports_overages() {
        let config = config(1, vec![op(OperationKind::ShortLoop), op(OperationKind::ComplexLoop)]);
        let meter = ScriptedMeter::new([0, 0, 0, 0, 0, 10, 13, 20, 24]);
        let recorder = Arc::new(Recorder::default());

        let outcome = Session::new(&config, Arc::new(meter), recorder.clone())
            .execute()
            .unwrap();

        let cycles: Vec<_> = outcome.reports().iter().map(|r| (r.cycles, r.exceeded)).collect();
        assert_eq!(cycles, [(3, false), (4, false)]);
    }

    #[test]
    fn execute_fails_fast_without_counter() {
        let config = config(1, vec![op(OperationKind::ShortLoop)]);
        let meter = Arc::new(ScriptedMeter::new([1]));
        let result = Session::new(&config, meter, Arc::new(Recorder::default())).execute();
        assert!(matches!(result, Err(SessionError::Measurement(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn finished_executor_releases_watchdog() {
        let config = config(i64::MAX, vec![op(OperationKind::ShortLoop), op(OperationKind::ShortLoop)]);
        let meter = ScriptedMeter::new((0..9).map(|i| i * 10));
        let recorder = Arc::new(Recorder::default());

        let report = Session::new(&config, Arc::new(meter), recorder.clone())
            .run()
            .await
            .unwrap();

        assert!(matches!(report.execution, ExecutionOutcome::Completed { ref reports } if reports.len() == 2));
        assert_eq!(recorder.count(|e| *e == Event::CancellationRequested), 1);
        assert_eq!(recorder.count(|e| matches!(e, Event::WatchdogStopped { .. })), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn exhausted_gas_halts_remaining_operations() {
        let mut operations = vec![op(OperationKind::ComplexLoop); 400];
        for o in operations.iter_mut() {
            o.loops = 1;
        }
        let config = config(1, operations);
        let meter = ScriptedMeter::new(0..1_000);
        let recorder = Arc::new(Recorder::default());

        let report = Session::new(&config, Arc::new(meter), recorder.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(report.race.winner, Participant::Pacer);
        assert!(matches!(report.execution, ExecutionOutcome::Cancelled { .. }));
        assert_eq!(recorder.count(|e| *e == Event::CancellationRequested), 1);
    }

    #[test]
    fn report_serializes_elapsed_as_text() {
        let report = SessionReport {
            contract: ContractInfo::new(Some("R".into())),
            race: RaceReport {
                winner: Participant::Workload,
                workload_fault: None,
                pacer: None,
            },
            execution: ExecutionOutcome::Completed { reports: vec![] },
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["elapsed"], "1s 500ms");
        assert_eq!(json["race"]["winner"], "workload");
        assert_eq!(json["execution"]["status"], "completed");
    }
}
