//! Gas-metered execution engine.
//!
//! Runs a contract's operations in order while measuring the CPU time each
//! one consumes, and races the work against a pacer that cancels it once the
//! gas budget is spent. All coordination goes through one shared
//! [`cancel::CancellationSignal`]; every loop polls it cooperatively.

pub mod cancel;
pub mod config;
pub mod contract;
pub mod events;
pub mod executor;
pub mod meter;
pub mod pacer;
pub mod session;
pub mod supervisor;
pub mod watchdog;
