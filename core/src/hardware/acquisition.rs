use crate::config::{SweepSettings, TriggerSettings};
use crate::prelude::ObservationResult;
use crate::schedule::Timestamp;
use crate::tone::ToneTable;
use std::path::PathBuf;

/// Multi-tone frequency sweep around each centre.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    pub centres_hz: Vec<f64>,
    pub settings: SweepSettings,
    pub destination: PathBuf,
}

/// One threshold-gated time-domain capture.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRequest {
    pub settings: TriggerSettings,
    pub destination: PathBuf,
    /// The capture must return once this instant has passed.
    pub deadline: Timestamp,
}

/// FPGA tone-comb readout.
pub trait AcquisitionDriver {
    /// Number of DDS channels in the loaded firmware.
    fn max_channels(&self) -> usize;

    /// Sweeps every centre and writes the raw sweep file to `request.destination`.
    fn sweep(&mut self, request: &SweepRequest) -> ObservationResult<()>;

    /// Arms the trigger with `tones`, waits for the required number of events
    /// (or the deadline) and writes the raw trigger file.
    fn trigger(&mut self, tones: &ToneTable, request: &TriggerRequest) -> ObservationResult<()>;
}
