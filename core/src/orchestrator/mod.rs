//! Scheduled sweep → retune → trigger cycle.

pub mod retune;

pub use retune::retuned_tones;

use crate::config::{ObservationConfig, SweepSettings, TriggerSettings};
use crate::hardware::{AcquisitionDriver, TriggerRequest};
use crate::prelude::ObservationResult;
use crate::schedule::{Clock, Pause, Schedule, Shutdown, TimeWindow};
use crate::storage::{RunContext, RunPathResolver};
use crate::sweep::{SweepReader, SweepSession};
use crate::telemetry::{MetricsRecorder, RunMetrics};
use crate::tone::ToneTable;
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Where the control loop currently is within a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    PendingStart,
    Sweeping,
    Analyzing,
    Retuning,
    TriggerLoop,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What happened during one window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub index: usize,
    pub directory: PathBuf,
    pub retuned_if_hz: Vec<f64>,
    pub triggers: usize,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub windows: Vec<WindowReport>,
    pub metrics: RunMetrics,
    /// The run stopped on a shutdown request rather than schedule exhaustion.
    pub interrupted: bool,
}

/// Owns the acquisition hardware for the duration of a run and walks the
/// schedule one window at a time.
pub struct Orchestrator<A, R, C>
where
    A: AcquisitionDriver,
    R: SweepReader,
    C: Clock,
{
    driver: A,
    reader: R,
    clock: C,
    shutdown: Shutdown,
    schedule: Schedule,
    paths: RunPathResolver,
    baseline: ToneTable,
    tracked: Vec<usize>,
    sweep: SweepSettings,
    trigger: TriggerSettings,
    lo_hz: f64,
    poll_interval: Duration,
    phase: Phase,
    metrics: MetricsRecorder,
}

impl<A, R, C> Orchestrator<A, R, C>
where
    A: AcquisitionDriver,
    R: SweepReader,
    C: Clock,
{
    /// Builds the baseline tone table against the driver's channel ceiling.
    pub fn new(
        config: &ObservationConfig,
        driver: A,
        reader: R,
        clock: C,
        shutdown: Shutdown,
    ) -> ObservationResult<Self> {
        let baseline = config.tones.build(driver.max_channels())?;
        Ok(Self {
            driver,
            reader,
            clock,
            shutdown,
            schedule: config.schedule.clone(),
            paths: RunPathResolver::new(config.base_dir.clone(), config.naming.clone()),
            baseline,
            tracked: config.tones.tracked.clone(),
            sweep: config.sweep,
            trigger: config.trigger,
            lo_hz: config.devices.lo_hz,
            poll_interval: config.poll_interval,
            phase: Phase::Idle,
            metrics: MetricsRecorder::new(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn baseline(&self) -> &ToneTable {
        &self.baseline
    }

    pub fn driver(&self) -> &A {
        &self.driver
    }

    pub fn metrics(&self) -> RunMetrics {
        self.metrics.snapshot()
    }

    fn enter(&mut self, phase: Phase, window: &TimeWindow) {
        info!("[window {}] {} -> {}", window.index, self.phase, phase);
        self.phase = phase;
    }

    /// Runs windows until the schedule is exhausted or shutdown is requested.
    ///
    /// Acquisition and fitting errors end the run immediately; files already
    /// written stay on disk.
    pub fn run(&mut self) -> ObservationResult<RunSummary> {
        let mut windows = Vec::new();
        let mut interrupted = false;

        loop {
            if self.shutdown.is_requested() {
                interrupted = true;
                break;
            }
            let now = self.clock.now();
            let Some(window) = self.schedule.active_window(&now).cloned() else {
                info!("No remaining windows in the schedule");
                break;
            };

            match self.run_window(&window)? {
                Some(report) => {
                    let stopped = report.interrupted;
                    windows.push(report);
                    if stopped {
                        interrupted = true;
                        break;
                    }
                }
                None => {
                    interrupted = true;
                    break;
                }
            }
        }

        if interrupted {
            info!("Stopping on shutdown request");
        }
        self.phase = Phase::Done;
        Ok(RunSummary {
            windows,
            metrics: self.metrics.snapshot(),
            interrupted,
        })
    }

    /// Returns `None` when shutdown arrives before the window starts.
    fn run_window(&mut self, window: &TimeWindow) -> ObservationResult<Option<WindowReport>> {
        let context = self.paths.prepare(window.index)?;

        self.enter(Phase::PendingStart, window);
        if self.wait_for_start(window) == Pause::Interrupted {
            return Ok(None);
        }

        self.enter(Phase::Sweeping, window);
        let mut session = SweepSession::new(
            self.baseline.frequencies_hz().to_vec(),
            self.tracked.clone(),
            self.sweep,
            self.lo_hz,
            context.sweep_data_path(),
        );
        session.measure(&mut self.driver, false)?;

        self.enter(Phase::Analyzing, window);
        session.analyze(&self.reader)?;
        self.metrics.record_sweep(session.channels().len());
        self.export_diagnostics(&session, &context)?;

        self.enter(Phase::Retuning, window);
        let tones = retuned_tones(&self.baseline, &session)?;
        info!("Resonant freqs [MHz]: {:?}", tones.frequencies_mhz());
        drop(session);

        self.enter(Phase::TriggerLoop, window);
        let (triggers, interrupted) = self.trigger_loop(window, &context, &tones)?;

        self.enter(Phase::Done, window);
        if !interrupted {
            self.metrics.record_window();
        }
        Ok(Some(WindowReport {
            index: window.index,
            directory: context.directory().to_path_buf(),
            retuned_if_hz: tones.frequencies_hz().to_vec(),
            triggers,
            interrupted,
        }))
    }

    fn wait_for_start(&mut self, window: &TimeWindow) -> Pause {
        loop {
            let now = self.clock.now();
            if window.has_started(&now) {
                return Pause::Elapsed;
            }
            info!("waiting...{}", window.start);
            let remaining = (window.start - now).to_std().unwrap_or(Duration::ZERO);
            let nap = self.poll_interval.min(remaining);
            if self.clock.pause(nap, &self.shutdown) == Pause::Interrupted {
                return Pause::Interrupted;
            }
        }
    }

    /// Best effort: plotting problems are logged and counted, never fatal.
    fn export_diagnostics(
        &mut self,
        session: &SweepSession<R>,
        context: &RunContext,
    ) -> ObservationResult<()> {
        for &channel in session.channels() {
            let path = context.sweep_plot_path(channel);
            match session.render(channel, &path) {
                Ok(()) => self.metrics.record_diagnostic(true),
                Err(err) if err.is_recoverable() => {
                    warn!("channel {channel}: {err}");
                    self.metrics.record_diagnostic(false);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Captures until the window has ended at the top of an iteration. A
    /// capture in flight is bounded by the deadline, never aborted.
    fn trigger_loop(
        &mut self,
        window: &TimeWindow,
        context: &RunContext,
        tones: &ToneTable,
    ) -> ObservationResult<(usize, bool)> {
        let mut trigger_index = 0;
        loop {
            let now = self.clock.now();
            if window.has_ended(&now) {
                return Ok((trigger_index, false));
            }
            if self.shutdown.is_requested() {
                return Ok((trigger_index, true));
            }

            info!("[window {}] Trigger #{trigger_index}", window.index);
            let request = TriggerRequest {
                settings: self.trigger,
                destination: context.trigger_data_path(trigger_index),
                deadline: window.end,
            };
            self.driver.trigger(tones, &request)?;
            self.metrics.record_trigger();
            trigger_index += 1;
        }
    }
}
