use std::fmt;

pub use crate::hardware::{AcquisitionDriver, Synthesizer};
pub use crate::schedule::{Clock, Shutdown};
pub use crate::sweep::{ResonanceFit, SweepReader, SweepTrace};

/// Measurement/analysis progress of a [`crate::sweep::SweepSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Unmeasured,
    Measured,
    Analyzed,
}

impl fmt::Display for SweepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SweepState::Unmeasured => "unmeasured",
            SweepState::Measured => "measured",
            SweepState::Analyzed => "analyzed",
        };
        f.write_str(name)
    }
}

/// Common error type for scheduling, acquisition and analysis.
#[derive(thiserror::Error, Debug)]
pub enum ObservationError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("cannot {operation} while sweep is {state}")]
    InvalidState {
        operation: &'static str,
        state: SweepState,
    },
    #[error("acquisition failure: {0}")]
    Acquisition(String),
    #[error("analysis failure: {0}")]
    Analysis(String),
    #[error("channel {0} is not tracked by this sweep")]
    ChannelNotTracked(usize),
    #[error("channel {channel} out of range for a {channels}-channel tone table")]
    ChannelOutOfRange { channel: usize, channels: usize },
    #[error("diagnostic export failed: {0}")]
    DiagnosticExport(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ObservationError {
    /// Only diagnostic exports may fail without ending the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ObservationError::DiagnosticExport(_))
    }
}

pub type ObservationResult<T> = Result<T, ObservationError>;
