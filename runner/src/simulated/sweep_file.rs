use mkidcore::math::StatsHelper;
use mkidcore::sweep::{ResonanceFit, SweepReader, SweepTrace};
use mkidcore::{ObservationError, ObservationResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// JSON body of a simulated `.rawdata` sweep file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepFile {
    pub power: f64,
    pub channels: Vec<ChannelSweep>,
}

/// IF axis and raw IQ of one tone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSweep {
    pub centre_hz: f64,
    pub if_hz: Vec<f64>,
    pub i: Vec<f64>,
    pub q: Vec<f64>,
}

pub struct JsonSweepReader;

impl SweepReader for JsonSweepReader {
    type Trace = SimulatedTrace;

    fn read(&self, path: &Path, channel: usize, lo_hz: f64) -> ObservationResult<SimulatedTrace> {
        let analysis = |e: &dyn std::fmt::Display| {
            ObservationError::Analysis(format!("{}: {e}", path.display()))
        };
        let text = fs::read_to_string(path).map_err(|e| analysis(&e))?;
        let file: SweepFile = serde_json::from_str(&text).map_err(|e| analysis(&e))?;
        let sweep = file
            .channels
            .get(channel)
            .ok_or_else(|| analysis(&format!("no channel {channel} in sweep")))?;
        if sweep.i.len() != sweep.if_hz.len() || sweep.q.len() != sweep.if_hz.len() {
            return Err(analysis(&format!("channel {channel} has ragged IQ columns")));
        }

        Ok(SimulatedTrace::new(
            sweep.if_hz.iter().map(|f| f + lo_hz).collect(),
            sweep
                .i
                .iter()
                .zip(&sweep.q)
                .map(|(&i, &q)| Complex64::new(i, q))
                .collect(),
        ))
    }
}

#[derive(Debug)]
pub struct SimulatedTrace {
    frequencies: Vec<f64>,
    iq: Vec<Complex64>,
}

impl SimulatedTrace {
    pub fn new(frequencies: Vec<f64>, iq: Vec<Complex64>) -> Self {
        Self { frequencies, iq }
    }
}

impl SweepTrace for SimulatedTrace {
    type Fit = DipFit;

    fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    fn iq(&self) -> &[Complex64] {
        &self.iq
    }

    /// Locates the |S21| minimum and sizes a single-pole notch around it.
    fn fit(&self) -> ObservationResult<DipFit> {
        let n = self.frequencies.len();
        if n < 3 || self.iq.len() != n {
            return Err(ObservationError::Analysis(format!(
                "need at least 3 sweep points, got {n}"
            )));
        }
        let amplitude = self.amplitude();
        let min = StatsHelper::argmin(&amplitude)
            .ok_or_else(|| ObservationError::Analysis("sweep has no finite samples".into()))?;

        let step = self.frequencies[1] - self.frequencies[0];
        let offset = if min > 0 && min + 1 < n {
            StatsHelper::parabolic_offset(amplitude[min - 1], amplitude[min], amplitude[min + 1])
        } else {
            0.0
        };
        let fr = self.frequencies[min] + offset * step;

        let background = (self.iq[0] + self.iq[n - 1]) / 2.0;
        if background.norm() <= f64::EPSILON {
            return Err(ObservationError::Analysis("sweep background is zero".into()));
        }
        let depth = (1.0 - amplitude[min] / background.norm()).clamp(0.0, 1.0);

        let half = (amplitude[min] + background.norm()) / 2.0;
        let below: Vec<f64> = self
            .frequencies
            .iter()
            .zip(&amplitude)
            .filter(|(_, &a)| a < half)
            .map(|(&f, _)| f)
            .collect();
        let width = match (below.first(), below.last()) {
            (Some(lo), Some(hi)) => (hi - lo).max(step.abs()),
            _ => step.abs(),
        };

        Ok(DipFit {
            fr,
            qr: fr / width,
            depth,
            background,
        })
    }
}

/// Single-pole notch fitted around the deepest point of a sweep.
#[derive(Debug, Clone, Copy)]
pub struct DipFit {
    fr: f64,
    qr: f64,
    depth: f64,
    background: Complex64,
}

impl ResonanceFit for DipFit {
    fn resonance_frequency(&self) -> f64 {
        self.fr
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("fr".to_string(), self.fr),
            ("qr".to_string(), self.qr),
            ("depth".to_string(), self.depth),
            ("background_re".to_string(), self.background.re),
            ("background_im".to_string(), self.background.im),
        ])
    }

    fn model(&self, frequency: f64) -> Complex64 {
        let x = 2.0 * self.qr * (frequency - self.fr) / self.fr;
        self.background * (Complex64::new(1.0, 0.0) - self.depth / Complex64::new(1.0, x))
    }

    fn derotate(&self, _frequency: f64, iq: Complex64) -> Complex64 {
        iq / self.background
    }
}
