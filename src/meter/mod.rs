mod thread_cpu;

use thiserror::Error;

pub use thread_cpu::ThreadCpuMeter;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MeterError {
    #[error("cycle counter unavailable: {0}")]
    Unavailable(String),
}

pub type MeterResult<T> = Result<T, MeterError>;

/// Source of per-thread CPU consumption. Readings are monotonic for the
/// calling thread, so two reads bracketing a region give its cost.
pub trait ResourceMeter: Send + Sync {
    fn measure(&self) -> MeterResult<u64>;
}

const WARM_UP_READS: usize = 5;

/// Prime the counter before the first measured operation. A backend that
/// cannot be read fails here, at startup, instead of mid-sequence.
pub fn warm_up(meter: &dyn ResourceMeter) -> MeterResult<()> {
    for _ in 0..WARM_UP_READS {
        meter.measure()?;
    }
    Ok(())
}

#[cfg(test)]
pub use scripted::ScriptedMeter;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_consumes_five_reads() {
        let meter = ScriptedMeter::new(0..6);
        warm_up(&meter).unwrap();
        assert_eq!(meter.measure(), Ok(5));
        assert!(meter.measure().is_err());
    }

    #[test]
    fn warm_up_surfaces_missing_counter() {
        let meter = ScriptedMeter::new([1, 2]);
        assert!(matches!(warm_up(&meter), Err(MeterError::Unavailable(_))));
    }

    #[test]
    fn scripted_costs_bracket_pairs() {
        let meter = ScriptedMeter::from_costs(&[50, 0, 9]);
        for expected in [50, 0, 9] {
            let start = meter.measure().unwrap();
            let end = meter.measure().unwrap();
            assert_eq!(end - start, expected);
        }
    }
}
