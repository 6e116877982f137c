use crate::simulated::{FpgaOptions, JsonSweepReader, SimulatedFpga, SimulatedSynthesizer};
use anyhow::Context;
use log::info;
use mkidcore::config::ObservationConfig;
use mkidcore::hardware::tune_local_oscillator;
use mkidcore::orchestrator::{Orchestrator, RunSummary};
use mkidcore::schedule::{Clock, Shutdown, SystemClock};
use mkidcore::storage::RunPathResolver;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SUMMARY_FILE: &str = "run_summary.jsonl";

/// Wires the validated configuration to the simulated backend and runs it.
#[derive(Clone)]
pub struct Runner {
    config: ObservationConfig,
    fpga: FpgaOptions,
}

impl Runner {
    pub fn new(config: ObservationConfig, fpga: FpgaOptions) -> Self {
        Self { config, fpga }
    }

    pub fn config(&self) -> &ObservationConfig {
        &self.config
    }

    /// Human-readable schedule and artifact layout; touches nothing on disk.
    pub fn plan<C: Clock>(&self, clock: &C) -> Vec<String> {
        let resolver =
            RunPathResolver::new(self.config.base_dir.clone(), self.config.naming.clone());
        let now = clock.now();
        let active = self.config.schedule.active_window(&now).map(|w| w.index);
        let mut lines = Vec::with_capacity(self.config.schedule.len() + 1);
        for window in self.config.schedule.windows() {
            let context = resolver.context(window.index);
            let status = if Some(window.index) == active {
                "next"
            } else if window.has_ended(&now) {
                "past"
            } else {
                "queued"
            };
            lines.push(format!(
                "#{} {} -> {} [{status}] sweep={} trigger0={}",
                window.index,
                window.start,
                window.end,
                context.sweep_data_path().display(),
                context.trigger_data_path(0).display()
            ));
        }
        if active.is_none() {
            lines.push("schedule exhausted: nothing to run".to_string());
        }
        lines
    }

    /// Tunes the LO, then walks the schedule until it is exhausted or
    /// `shutdown` fires.
    pub fn execute(&self, shutdown: Shutdown) -> anyhow::Result<RunSummary> {
        let devices = &self.config.devices;
        fs::create_dir_all(&self.config.base_dir).with_context(|| {
            format!("creating base directory {}", self.config.base_dir.display())
        })?;

        let synthesizer = SimulatedSynthesizer::open(&devices.synthesizer_port)
            .context("opening synthesizer")?;
        tune_local_oscillator(synthesizer, devices.lo_hz).context("tuning local oscillator")?;

        let fpga = SimulatedFpga::connect(&devices.fpga_address, devices.lo_hz, self.fpga.clone())
            .context("connecting to FPGA")?;
        info!("Acquiring through {}", fpga.address());
        let clock = SystemClock::new(self.config.zone);
        let mut orchestrator =
            Orchestrator::new(&self.config, fpga, JsonSweepReader, clock, shutdown)
                .context("building baseline tone table")?;

        let summary = orchestrator.run().context("running trigger schedule")?;
        info!(
            "Run finished: {} windows, {} triggers, {} diagnostics skipped",
            summary.metrics.windows_completed,
            summary.metrics.triggers,
            summary.metrics.diagnostics_failed
        );
        Ok(summary)
    }
}

/// Appends one JSON line describing `summary` under `base_dir`.
pub fn append_summary(base_dir: &Path, summary: &RunSummary) -> anyhow::Result<PathBuf> {
    let report_path = base_dir.join(SUMMARY_FILE);
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(summary).context("serializing run summary")?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&report_path)
        .with_context(|| format!("opening {}", report_path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(report_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use mkidcore::config::{
        build_schedule, facility_zone, DeviceSettings, SweepSettings, ToneSeed, TriggerSettings,
    };
    use mkidcore::schedule::Timestamp;
    use mkidcore::storage::NamingPolicy;
    use std::time::Duration;
    use tempfile::tempdir;

    fn stamp(at: Timestamp) -> String {
        at.to_rfc3339()
    }

    fn config(base: &Path, windows: &[(i64, i64)]) -> ObservationConfig {
        let zone = facility_zone(9).unwrap();
        let now = Utc::now().with_timezone(&zone);
        let bounds: Vec<(String, String)> = windows
            .iter()
            .map(|&(s, e)| {
                (
                    stamp(now + ChronoDuration::milliseconds(s)),
                    stamp(now + ChronoDuration::milliseconds(e)),
                )
            })
            .collect();
        ObservationConfig {
            schedule: build_schedule(&bounds, zone).unwrap(),
            base_dir: base.to_path_buf(),
            naming: NamingPolicy {
                make_subdir: false,
                dir_prefix: "run".into(),
                run_zfill: 2,
                trigger_zfill: 3,
            },
            sweep: SweepSettings::from_megahertz(1.0, 0.01, 1.0).unwrap(),
            trigger: TriggerSettings {
                record_length: 32,
                threshold_sigma: 5.0,
                required_count: 1,
                rate_ksps: 1000.0,
                trigger_position: 8,
                pre_length: 4,
            },
            devices: DeviceSettings::new("10.0.0.1".into(), "/dev/null".into(), 4.0).unwrap(),
            tones: ToneSeed {
                frequencies_mhz: vec![100.0, 150.0],
                phases: None,
                amplitudes: None,
                power: None,
                tracked: vec![0, 1],
            },
            zone,
            poll_interval: Duration::from_millis(20),
        }
    }

    fn fast_fpga() -> FpgaOptions {
        FpgaOptions {
            max_channels: 4,
            event_interval: Duration::from_millis(20),
            noise: 0.0,
            ..FpgaOptions::default()
        }
    }

    #[test]
    fn runner_executes_short_window() {
        let dir = tempdir().unwrap();
        let runner = Runner::new(config(dir.path(), &[(50, 3_000)]), fast_fpga());

        let summary = runner.execute(Shutdown::new()).unwrap();

        assert!(!summary.interrupted);
        assert_eq!(summary.windows.len(), 1);
        assert!(summary.windows[0].triggers >= 1);
        assert!(dir.path().join("swp00.rawdata").exists());
        assert!(dir.path().join("trg00_000.rawdata").exists());
        let retuned = &summary.windows[0].retuned_if_hz;
        assert_eq!(retuned.len(), 2);
        assert!(retuned.iter().all(|f| f % 1e3 == 0.0));
    }

    #[test]
    fn runner_honours_shutdown() {
        let dir = tempdir().unwrap();
        let runner = Runner::new(config(dir.path(), &[(60_000, 120_000)]), fast_fpga());
        let shutdown = Shutdown::new();
        shutdown.request();

        let summary = runner.execute(shutdown).unwrap();
        assert!(summary.interrupted);
        assert!(summary.windows.is_empty());
    }

    #[test]
    fn plan_marks_past_and_next_windows() {
        let dir = tempdir().unwrap();
        let windows = [(-20_000, -10_000), (10_000, 20_000)];
        let runner = Runner::new(config(dir.path(), &windows), fast_fpga());
        let lines = runner.plan(&SystemClock::new(runner.config().zone));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[past]"));
        assert!(lines[1].contains("[next]"));
        assert!(lines[1].contains("swp01.rawdata"));
        assert!(!dir.path().join("swp01.rawdata").exists());
    }

    #[test]
    fn summaries_are_appended_as_json_lines() {
        let dir = tempdir().unwrap();
        let runner = Runner::new(config(dir.path(), &[(-20_000, -10_000)]), fast_fpga());
        let summary = runner.execute(Shutdown::new()).unwrap();

        let path = append_summary(dir.path(), &summary).unwrap();
        append_summary(dir.path(), &summary).unwrap();

        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["interrupted"], false);
    }
}
