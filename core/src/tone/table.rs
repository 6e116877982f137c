use crate::prelude::{ObservationError, ObservationResult};
use serde::Serialize;

/// Per-channel IF tone configuration driving the FPGA DDS comb.
///
/// Frequencies are stored in Hz. A table never holds more tones than the
/// firmware's channel ceiling, and optional phase and amplitude lists always
/// match the tone count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToneTable {
    max_ch: usize,
    frequencies_hz: Vec<f64>,
    phases: Option<Vec<f64>>,
    amplitudes: Option<Vec<f64>>,
    power: Option<f64>,
}

impl ToneTable {
    pub fn new(
        max_ch: usize,
        frequencies_hz: Vec<f64>,
        phases: Option<Vec<f64>>,
        amplitudes: Option<Vec<f64>>,
        power: Option<f64>,
    ) -> ObservationResult<Self> {
        if frequencies_hz.len() > max_ch {
            return Err(ObservationError::Configuration(format!(
                "{} tones requested but the firmware provides {} channels",
                frequencies_hz.len(),
                max_ch
            )));
        }
        if let Some(bad) = frequencies_hz.iter().find(|f| !f.is_finite()) {
            return Err(ObservationError::Configuration(format!(
                "tone frequency {bad} is not finite"
            )));
        }
        for (name, list) in [("phases", &phases), ("amps", &amplitudes)] {
            if let Some(values) = list {
                if values.len() != frequencies_hz.len() {
                    return Err(ObservationError::Configuration(format!(
                        "{name} has {} entries for {} tones",
                        values.len(),
                        frequencies_hz.len()
                    )));
                }
            }
        }

        Ok(Self {
            max_ch,
            frequencies_hz,
            phases,
            amplitudes,
            power,
        })
    }

    /// Builds a table from frequencies given in MHz.
    pub fn from_megahertz(
        max_ch: usize,
        frequencies_mhz: &[f64],
        phases: Option<Vec<f64>>,
        amplitudes: Option<Vec<f64>>,
        power: Option<f64>,
    ) -> ObservationResult<Self> {
        let hz = frequencies_mhz.iter().map(|f| f * 1e6).collect();
        Self::new(max_ch, hz, phases, amplitudes, power)
    }

    pub fn max_channels(&self) -> usize {
        self.max_ch
    }

    pub fn len(&self) -> usize {
        self.frequencies_hz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies_hz.is_empty()
    }

    pub fn frequencies_hz(&self) -> &[f64] {
        &self.frequencies_hz
    }

    pub fn frequencies_mhz(&self) -> Vec<f64> {
        self.frequencies_hz.iter().map(|f| f / 1e6).collect()
    }

    pub fn frequency(&self, channel: usize) -> ObservationResult<f64> {
        self.frequencies_hz
            .get(channel)
            .copied()
            .ok_or_else(|| self.out_of_range(channel))
    }

    pub fn phases(&self) -> Option<&[f64]> {
        self.phases.as_deref()
    }

    pub fn amplitudes(&self) -> Option<&[f64]> {
        self.amplitudes.as_deref()
    }

    pub fn power(&self) -> Option<f64> {
        self.power
    }

    /// Overrides one channel's IF frequency in Hz.
    pub fn set_frequency(&mut self, channel: usize, frequency_hz: f64) -> ObservationResult<()> {
        let channels = self.frequencies_hz.len();
        let slot = self
            .frequencies_hz
            .get_mut(channel)
            .ok_or(ObservationError::ChannelOutOfRange { channel, channels })?;
        *slot = frequency_hz;
        Ok(())
    }

    /// Fails unless every index addresses a configured tone.
    pub fn check_channels(&self, channels: &[usize]) -> ObservationResult<()> {
        match channels.iter().find(|&&c| c >= self.len()) {
            Some(&channel) => Err(self.out_of_range(channel)),
            None => Ok(()),
        }
    }

    fn out_of_range(&self, channel: usize) -> ObservationError {
        ObservationError::ChannelOutOfRange {
            channel,
            channels: self.frequencies_hz.len(),
        }
    }
}
