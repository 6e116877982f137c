use crate::prelude::ObservationResult;
use num_complex::Complex64;
use std::collections::BTreeMap;
use std::path::Path;

/// Fitted resonator model for one channel.
pub trait ResonanceFit {
    /// Absolute resonance frequency in Hz.
    fn resonance_frequency(&self) -> f64;

    fn parameters(&self) -> BTreeMap<String, f64>;

    /// Model S21 evaluated at `frequency`.
    fn model(&self, frequency: f64) -> Complex64;

    /// Removes cable delay and rotation so the resonance circle sits at the
    /// origin-referenced calibrated position.
    fn derotate(&self, frequency: f64, iq: Complex64) -> Complex64;
}

/// One channel's slice of a raw sweep file.
pub trait SweepTrace {
    type Fit: ResonanceFit;

    /// Absolute frequencies in Hz.
    fn frequencies(&self) -> &[f64];

    fn iq(&self) -> &[Complex64];

    fn amplitude(&self) -> Vec<f64> {
        self.iq().iter().map(|z| z.norm()).collect()
    }

    fn fit(&self) -> ObservationResult<Self::Fit>;
}

/// Reads back raw sweep files and windows out single channels.
pub trait SweepReader {
    type Trace: SweepTrace;

    /// `lo_hz` is added to the stored IF axis to give absolute frequencies.
    fn read(&self, path: &Path, channel: usize, lo_hz: f64) -> ObservationResult<Self::Trace>;
}
