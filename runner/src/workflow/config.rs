use anyhow::Context;
use mkidcore::config::{
    build_schedule, facility_zone, DeviceSettings, ObservationConfig, SweepSettings, ToneSeed,
    TriggerSettings, DEFAULT_POLL_INTERVAL, DEFAULT_UTC_OFFSET_HOURS,
};
use mkidcore::storage::NamingPolicy;
use mkidcore::ObservationResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk layout of the YAML setting file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettingsFile {
    pub trg: TrgSection,
    pub fpga: FpgaSection,
    pub sg: SgSection,
    pub tone: ToneSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrgSection {
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    pub schedule: Vec<WindowEntry>,
    pub basedir: BaseDirSection,
    pub subdir: SubdirSection,
    pub sweep: SweepSection,
    pub meas: MeasSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowEntry {
    pub start: String,
    pub end: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaseDirSection {
    pub path: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubdirSection {
    pub make_subdir: bool,
    #[serde(default = "default_dirbase")]
    pub dirbase: String,
    pub n_zfill: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepSection {
    pub width_megahz: f64,
    pub resolution_megahz: f64,
    pub power: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeasSection {
    pub length: usize,
    pub threshold: f64,
    pub count: usize,
    pub rate: f64,
    pub position: usize,
    pub pre_length: usize,
    #[serde(default = "default_trigger_zfill")]
    pub n_zfill: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FpgaSection {
    pub ip: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SgSection {
    pub port: String,
    pub freq_gigahz: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToneSection {
    #[serde(rename = "freq_MHz")]
    pub freq_mhz: Vec<f64>,
    #[serde(default)]
    pub phases: Option<Vec<f64>>,
    #[serde(default)]
    pub amps: Option<Vec<f64>>,
    #[serde(default)]
    pub power: Option<f64>,
    pub kid_indices: Vec<usize>,
}

fn default_utc_offset() -> i32 {
    DEFAULT_UTC_OFFSET_HOURS
}

fn default_dirbase() -> String {
    NamingPolicy::default().dir_prefix
}

fn default_trigger_zfill() -> usize {
    NamingPolicy::default().trigger_zfill
}

impl SettingsFile {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading setting file {}", path_ref.display()))?;
        let settings: SettingsFile = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing setting file {}", path_ref.display()))?;
        Ok(settings)
    }

    /// Validates every section into the immutable run configuration.
    pub fn into_observation(self) -> ObservationResult<ObservationConfig> {
        let zone = facility_zone(self.trg.utc_offset_hours)?;
        let bounds: Vec<(String, String)> = self
            .trg
            .schedule
            .into_iter()
            .map(|w| (w.start, w.end))
            .collect();
        let schedule = build_schedule(&bounds, zone)?;

        let naming = NamingPolicy {
            make_subdir: self.trg.subdir.make_subdir,
            dir_prefix: self.trg.subdir.dirbase,
            run_zfill: self.trg.subdir.n_zfill,
            trigger_zfill: self.trg.meas.n_zfill,
        };
        let sweep = SweepSettings::from_megahertz(
            self.trg.sweep.width_megahz,
            self.trg.sweep.resolution_megahz,
            self.trg.sweep.power,
        )?;
        let meas = &self.trg.meas;
        let trigger = TriggerSettings {
            record_length: meas.length,
            threshold_sigma: meas.threshold,
            required_count: meas.count,
            rate_ksps: meas.rate,
            trigger_position: meas.position,
            pre_length: meas.pre_length,
        }
        .validate()?;
        let devices = DeviceSettings::new(self.fpga.ip, self.sg.port, self.sg.freq_gigahz)?;
        let tones = ToneSeed {
            frequencies_mhz: self.tone.freq_mhz,
            phases: self.tone.phases,
            amplitudes: self.tone.amps,
            power: self.tone.power,
            tracked: self.tone.kid_indices,
        }
        .validate()?;
        let poll_interval = self
            .trg
            .poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        Ok(ObservationConfig {
            schedule,
            base_dir: self.trg.basedir.path,
            naming,
            sweep,
            trigger,
            devices,
            tones,
            zone,
            poll_interval,
        })
    }
}
