//! Driver seams for the readout hardware.
//!
//! The FPGA and the local-oscillator synthesizer are owned by whoever runs the
//! [`crate::orchestrator::Orchestrator`]; implementations map their own
//! failures onto [`crate::ObservationError::Acquisition`].

pub mod acquisition;
pub mod synthesizer;

pub use acquisition::{AcquisitionDriver, SweepRequest, TriggerRequest};
pub use synthesizer::{tune_local_oscillator, Synthesizer};
