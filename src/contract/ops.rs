use std::hint::black_box;

use serde::Deserialize;

use super::registry::OperationFault;

const SHORT_LOOP_SCALE: i64 = 1_000_000;
const COMPLEX_LOOP_SCALE: i64 = 10_000_000;

/// Built-in operation bodies selectable from a session file.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    ShortLoop,
    ComplexLoop,
    Fault,
}

impl OperationKind {
    pub fn body(self) -> fn(i64) -> Result<bool, OperationFault> {
        match self {
            OperationKind::ShortLoop => short_loop,
            OperationKind::ComplexLoop => complex_loop,
            OperationKind::Fault => fault,
        }
    }
}

pub fn short_loop(loops: i64) -> Result<bool, OperationFault> {
    spin(loops.saturating_mul(SHORT_LOOP_SCALE));
    Ok(true)
}

pub fn complex_loop(loops: i64) -> Result<bool, OperationFault> {
    spin(loops.saturating_mul(COMPLEX_LOOP_SCALE));
    Ok(true)
}

pub fn fault(loops: i64) -> Result<bool, OperationFault> {
    Err(OperationFault(format!("operation failed after {} loops", loops)))
}

fn spin(iterations: i64) {
    let mut i = 0i64;
    while i < iterations {
        i = black_box(i + 1);
    }
}
