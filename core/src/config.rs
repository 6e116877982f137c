//! Validated run settings.
//!
//! Every record here is built once from the settings file and never mutated.
//! Constructors reject missing or inconsistent values with
//! [`ObservationError::Configuration`], so nothing is discovered mid-run.

use crate::prelude::{ObservationError, ObservationResult};
use crate::schedule::{Schedule, TimeWindow, Timestamp};
use crate::storage::NamingPolicy;
use crate::tone::ToneTable;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default facility zone (JST).
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);
/// Retuned frequencies are snapped to this grid.
pub const RETUNE_GRID_HZ: f64 = 1e3;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

fn invalid(message: String) -> ObservationError {
    ObservationError::Configuration(message)
}

pub fn facility_zone(utc_offset_hours: i32) -> ObservationResult<FixedOffset> {
    utc_offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| invalid(format!("UTC offset {utc_offset_hours}h is out of range")))
}

/// Parses an RFC 3339 timestamp, or a naive one taken as facility-local time.
pub fn parse_timestamp(raw: &str, zone: FixedOffset) -> ObservationResult<Timestamp> {
    let trimmed = raw.trim();
    if let Ok(aware) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(aware.with_timezone(&zone));
    }
    if let Ok(aware) = trimmed.parse::<DateTime<FixedOffset>>() {
        return Ok(aware.with_timezone(&zone));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return zone
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| invalid(format!("ambiguous local time '{raw}'")));
        }
    }
    Err(invalid(format!("cannot parse timestamp '{raw}'")))
}

/// Builds the schedule from `(start, end)` strings in file order.
pub fn build_schedule<S: AsRef<str>>(
    bounds: &[(S, S)],
    zone: FixedOffset,
) -> ObservationResult<Schedule> {
    let windows = bounds
        .iter()
        .enumerate()
        .map(|(index, (start, end))| {
            let start = parse_timestamp(start.as_ref(), zone)
                .map_err(|e| invalid(format!("schedule[{index}].start: {e}")))?;
            let end = parse_timestamp(end.as_ref(), zone)
                .map_err(|e| invalid(format!("schedule[{index}].end: {e}")))?;
            TimeWindow::new(index, start, end)
        })
        .collect::<ObservationResult<Vec<_>>>()?;
    Ok(Schedule::new(windows))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepSettings {
    pub width_hz: f64,
    pub step_hz: f64,
    pub power: f64,
}

impl SweepSettings {
    pub fn from_megahertz(
        width_mhz: f64,
        resolution_mhz: f64,
        power: f64,
    ) -> ObservationResult<Self> {
        if !(width_mhz.is_finite() && width_mhz > 0.0) {
            return Err(invalid(format!("sweep.width_megahz must be positive, got {width_mhz}")));
        }
        if !(resolution_mhz.is_finite() && resolution_mhz > 0.0 && resolution_mhz <= width_mhz) {
            return Err(invalid(format!(
                "sweep.resolution_megahz must lie in (0, {width_mhz}], got {resolution_mhz}"
            )));
        }
        if !power.is_finite() {
            return Err(invalid("sweep.power must be finite".into()));
        }
        Ok(Self {
            width_hz: width_mhz * 1e6,
            step_hz: resolution_mhz * 1e6,
            power,
        })
    }

    pub fn points(&self) -> usize {
        (self.width_hz / self.step_hz).round() as usize + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TriggerSettings {
    /// Samples per record.
    pub record_length: usize,
    /// Threshold in standard deviations of the baseline.
    pub threshold_sigma: f64,
    /// Consecutive samples above threshold needed to fire.
    pub required_count: usize,
    pub rate_ksps: f64,
    /// Sample index of the trigger point inside the record.
    pub trigger_position: usize,
    pub pre_length: usize,
}

impl TriggerSettings {
    pub fn validate(self) -> ObservationResult<Self> {
        if self.record_length == 0 {
            return Err(invalid("meas.length must be at least 1".into()));
        }
        if !(self.threshold_sigma.is_finite() && self.threshold_sigma > 0.0) {
            return Err(invalid(format!(
                "meas.threshold must be positive, got {}",
                self.threshold_sigma
            )));
        }
        if self.required_count == 0 {
            return Err(invalid("meas.count must be at least 1".into()));
        }
        if !(self.rate_ksps.is_finite() && self.rate_ksps > 0.0) {
            return Err(invalid(format!("meas.rate must be positive, got {}", self.rate_ksps)));
        }
        if self.trigger_position >= self.record_length {
            return Err(invalid(format!(
                "meas.position {} lies outside a {}-sample record",
                self.trigger_position, self.record_length
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSettings {
    pub fpga_address: String,
    pub synthesizer_port: String,
    pub lo_hz: f64,
}

impl DeviceSettings {
    pub fn new(
        fpga_address: String,
        synthesizer_port: String,
        lo_ghz: f64,
    ) -> ObservationResult<Self> {
        if fpga_address.trim().is_empty() {
            return Err(invalid("fpga.ip is empty".into()));
        }
        if synthesizer_port.trim().is_empty() {
            return Err(invalid("sg.port is empty".into()));
        }
        if !(lo_ghz.is_finite() && lo_ghz > 0.0) {
            return Err(invalid(format!("sg.freq_gigahz must be positive, got {lo_ghz}")));
        }
        Ok(Self {
            fpga_address,
            synthesizer_port,
            lo_hz: lo_ghz * 1e9,
        })
    }
}

/// Baseline tone configuration; becomes a [`ToneTable`] once the firmware's
/// channel count is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToneSeed {
    pub frequencies_mhz: Vec<f64>,
    pub phases: Option<Vec<f64>>,
    pub amplitudes: Option<Vec<f64>>,
    pub power: Option<f64>,
    /// Channels swept, fitted and retuned every window.
    pub tracked: Vec<usize>,
}

impl ToneSeed {
    pub fn validate(self) -> ObservationResult<Self> {
        for (position, channel) in self.tracked.iter().enumerate() {
            if *channel >= self.frequencies_mhz.len() {
                return Err(invalid(format!(
                    "tone.kid_indices[{position}] = {channel} but only {} tones are configured",
                    self.frequencies_mhz.len()
                )));
            }
            if self.tracked[..position].contains(channel) {
                return Err(invalid(format!("tone.kid_indices lists {channel} twice")));
            }
        }
        Ok(self)
    }

    pub fn build(&self, max_ch: usize) -> ObservationResult<ToneTable> {
        let table = ToneTable::from_megahertz(
            max_ch,
            &self.frequencies_mhz,
            self.phases.clone(),
            self.amplitudes.clone(),
            self.power,
        )?;
        table.check_channels(&self.tracked)?;
        Ok(table)
    }
}

/// Everything a run needs, validated up front.
#[derive(Debug, Clone, Serialize)]
pub struct ObservationConfig {
    pub schedule: Schedule,
    pub base_dir: PathBuf,
    pub naming: NamingPolicy,
    pub sweep: SweepSettings,
    pub trigger: TriggerSettings,
    pub devices: DeviceSettings,
    pub tones: ToneSeed,
    #[serde(skip)]
    pub zone: FixedOffset,
    pub poll_interval: Duration,
}
