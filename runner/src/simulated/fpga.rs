use crate::simulated::resonator::Resonator;
use crate::simulated::sweep_file::{ChannelSweep, SweepFile};
use chrono::Utc;
use log::{debug, info};
use mkidcore::hardware::{AcquisitionDriver, SweepRequest, TriggerRequest};
use mkidcore::tone::ToneTable;
use mkidcore::{ObservationError, ObservationResult};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Knobs for the offline FPGA.
#[derive(Debug, Clone)]
pub struct FpgaOptions {
    pub max_channels: usize,
    /// Mean wait between simulated pulses.
    pub event_interval: Duration,
    /// Largest resonance offset from the design tone, in Hz.
    pub max_detuning_hz: f64,
    pub noise: f64,
    pub seed: u64,
}

impl Default for FpgaOptions {
    fn default() -> Self {
        Self {
            max_channels: 16,
            event_interval: Duration::from_millis(500),
            max_detuning_hz: 50e3,
            noise: 2e-3,
            seed: 0,
        }
    }
}

/// JSON body of a simulated trigger `.rawdata` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerFile {
    pub tones_hz: Vec<f64>,
    pub rate_ksps: f64,
    pub trigger_position: usize,
    pub pre_length: usize,
    /// One record per event, one amplitude trace per tone.
    pub events: Vec<Vec<Vec<f64>>>,
    /// The deadline passed before `required_count` events arrived.
    pub timed_out: bool,
}

/// Offline tone-comb readout with a fixed set of detuned resonators.
pub struct SimulatedFpga {
    address: String,
    lo_hz: f64,
    options: FpgaOptions,
    rng: StdRng,
    /// Per-tone offset between the design IF and the true resonance.
    detuning: Vec<f64>,
}

impl SimulatedFpga {
    pub fn connect(address: &str, lo_hz: f64, options: FpgaOptions) -> ObservationResult<Self> {
        if options.max_channels == 0 {
            return Err(ObservationError::Acquisition(format!(
                "firmware at {address} reports no channels"
            )));
        }
        info!(
            "Connected to simulated FPGA at {address} ({} channels)",
            options.max_channels
        );
        let mut rng = StdRng::seed_from_u64(options.seed);
        let span = options.max_detuning_hz.abs();
        let detuning = (0..options.max_channels)
            .map(|_| if span > 0.0 { rng.gen_range(-span..span) } else { 0.0 })
            .collect();
        Ok(Self {
            address: address.to_string(),
            lo_hz,
            options,
            rng,
            detuning,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn resonator(&self, channel: usize, centre_hz: f64) -> Resonator {
        let offset = self.detuning.get(channel).copied().unwrap_or(0.0);
        Resonator::new(self.lo_hz + centre_hz + offset)
    }

    fn jitter(&mut self) -> f64 {
        let noise = self.options.noise.abs();
        if noise > 0.0 {
            self.rng.gen_range(-noise..noise)
        } else {
            0.0
        }
    }

    fn write_json<T: Serialize>(path: &Path, body: &T) -> ObservationResult<()> {
        let text = serde_json::to_string(body)
            .map_err(|e| ObservationError::Acquisition(format!("{}: {e}", path.display())))?;
        fs::write(path, text)
            .map_err(|e| ObservationError::Acquisition(format!("{}: {e}", path.display())))
    }

    fn pulse(&mut self, tones: &ToneTable, request: &TriggerRequest) -> Vec<Vec<f64>> {
        let settings = request.settings;
        let decay = (settings.record_length as f64 / 10.0).max(1.0);
        let mut traces = Vec::with_capacity(tones.len());
        for channel in 0..tones.len() {
            let height = 0.2 / (channel + 1) as f64;
            let trace = (0..settings.record_length)
                .map(|k| {
                    let signal = if k >= settings.trigger_position {
                        let dt = (k - settings.trigger_position) as f64;
                        height * (-dt / decay).exp()
                    } else {
                        0.0
                    };
                    1.0 - signal + self.jitter()
                })
                .collect();
            traces.push(trace);
        }
        traces
    }
}

impl AcquisitionDriver for SimulatedFpga {
    fn max_channels(&self) -> usize {
        self.options.max_channels
    }

    fn sweep(&mut self, request: &SweepRequest) -> ObservationResult<()> {
        if request.centres_hz.len() > self.options.max_channels {
            return Err(ObservationError::Acquisition(format!(
                "{} tones exceed the {} firmware channels",
                request.centres_hz.len(),
                self.options.max_channels
            )));
        }
        let settings = request.settings;
        let points = settings.points();
        let mut channels = Vec::with_capacity(request.centres_hz.len());
        for (channel, &centre) in request.centres_hz.iter().enumerate() {
            let resonator = self.resonator(channel, centre);
            let first = centre - settings.width_hz / 2.0;
            let if_hz: Vec<f64> = (0..points)
                .map(|k| first + k as f64 * settings.step_hz)
                .collect();
            let mut i = Vec::with_capacity(points);
            let mut q = Vec::with_capacity(points);
            for f in &if_hz {
                let z = resonator.s21(self.lo_hz + f);
                i.push(z.re + self.jitter());
                q.push(z.im + self.jitter());
            }
            channels.push(ChannelSweep {
                centre_hz: centre,
                if_hz,
                i,
                q,
            });
        }

        Self::write_json(
            &request.destination,
            &SweepFile {
                power: settings.power,
                channels,
            },
        )?;
        debug!(
            "wrote {points}-point sweep of {} tones to {}",
            request.centres_hz.len(),
            request.destination.display()
        );
        Ok(())
    }

    fn trigger(&mut self, tones: &ToneTable, request: &TriggerRequest) -> ObservationResult<()> {
        let settings = request.settings;
        let mut events = Vec::with_capacity(settings.required_count);
        let mut timed_out = false;

        while events.len() < settings.required_count {
            let remaining = request
                .deadline
                .signed_duration_since(Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            if remaining < self.options.event_interval {
                thread::sleep(remaining);
                timed_out = true;
                break;
            }
            thread::sleep(self.options.event_interval);
            events.push(self.pulse(tones, request));
        }

        Self::write_json(
            &request.destination,
            &TriggerFile {
                tones_hz: tones.frequencies_hz().to_vec(),
                rate_ksps: settings.rate_ksps,
                trigger_position: settings.trigger_position,
                pre_length: settings.pre_length,
                events,
                timed_out,
            },
        )?;
        debug!(
            "wrote trigger file {} (timed out: {timed_out})",
            request.destination.display()
        );
        Ok(())
    }
}
