//! Scheduling, sweep and retuning core for MKID trigger acquisition.
//!
//! A run walks an ordered list of time windows. For each active window the
//! [`orchestrator::Orchestrator`] sweeps the tone comb, fits every tracked
//! resonator, retunes a working copy of the [`tone::ToneTable`] and then keeps
//! issuing triggered captures until the window closes. Hardware and fitting
//! live behind the traits in [`hardware`] and [`sweep`].

pub mod config;
pub mod hardware;
pub mod math;
pub mod orchestrator;
pub mod prelude;
pub mod schedule;
pub mod storage;
pub mod sweep;
pub mod telemetry;
pub mod tone;

pub use prelude::{ObservationError, ObservationResult, SweepState};
