use crate::config::SweepSettings;
use crate::hardware::{AcquisitionDriver, SweepRequest};
use crate::prelude::{ObservationError, ObservationResult, SweepState};
use crate::sweep::fit::{ResonanceFit, SweepReader, SweepTrace};
use crate::sweep::render::render_sweep;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

type FitOf<R> = <<R as SweepReader>::Trace as SweepTrace>::Fit;

/// One sweep-then-fit cycle over the tracked channels.
///
/// The session moves `Unmeasured → Measured → Analyzed`. Accessors never fit
/// on demand; they fail with [`ObservationError::InvalidState`] until
/// [`SweepSession::analyze`] has run.
pub struct SweepSession<R: SweepReader> {
    centres_hz: Vec<f64>,
    channels: Vec<usize>,
    settings: SweepSettings,
    lo_hz: f64,
    path: PathBuf,
    state: SweepState,
    traces: BTreeMap<usize, R::Trace>,
    fits: BTreeMap<usize, FitOf<R>>,
}

impl<R: SweepReader> SweepSession<R> {
    /// `centres_hz` is the full IF comb; `channels` selects which tones are fitted.
    pub fn new<P: Into<PathBuf>>(
        centres_hz: Vec<f64>,
        channels: Vec<usize>,
        settings: SweepSettings,
        lo_hz: f64,
        path: P,
    ) -> Self {
        Self {
            centres_hz,
            channels,
            settings,
            lo_hz,
            path: path.into(),
            state: SweepState::Unmeasured,
            traces: BTreeMap::new(),
            fits: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn channels(&self) -> &[usize] {
        &self.channels
    }

    /// Runs the sweep acquisition. Returns `false` without touching the
    /// hardware when already measured and `force` is not set.
    pub fn measure<A>(&mut self, driver: &mut A, force: bool) -> ObservationResult<bool>
    where
        A: AcquisitionDriver + ?Sized,
    {
        if self.state != SweepState::Unmeasured && !force {
            debug!("sweep {} already measured", self.path.display());
            return Ok(false);
        }

        let request = SweepRequest {
            centres_hz: self.centres_hz.clone(),
            settings: self.settings,
            destination: self.path.clone(),
        };
        info!(
            "Sweeping {} tones (width {:.3} MHz, step {:.4} MHz) -> {}",
            request.centres_hz.len(),
            self.settings.width_hz / 1e6,
            self.settings.step_hz / 1e6,
            self.path.display()
        );
        driver.sweep(&request)?;

        self.traces.clear();
        self.fits.clear();
        self.state = SweepState::Measured;
        Ok(true)
    }

    /// Fits every tracked channel once; later calls reuse the cached fits.
    pub fn analyze(&mut self, reader: &R) -> ObservationResult<()> {
        match self.state {
            SweepState::Unmeasured => Err(ObservationError::InvalidState {
                operation: "analyze",
                state: self.state,
            }),
            SweepState::Analyzed => Ok(()),
            SweepState::Measured => self.fit_all(reader),
        }
    }

    /// Discards cached fits and fits again from the raw file.
    pub fn reanalyze(&mut self, reader: &R) -> ObservationResult<()> {
        if self.state == SweepState::Unmeasured {
            return Err(ObservationError::InvalidState {
                operation: "reanalyze",
                state: self.state,
            });
        }
        self.fit_all(reader)
    }

    fn fit_all(&mut self, reader: &R) -> ObservationResult<()> {
        let mut traces = BTreeMap::new();
        let mut fits = BTreeMap::new();
        // Each channel is windowed out of the shared file by the reader.
        for &channel in &self.channels {
            let trace = reader.read(&self.path, channel, self.lo_hz)?;
            let fit = trace.fit()?;
            debug!(
                "channel {channel}: f_r = {:.6} MHz",
                fit.resonance_frequency() / 1e6
            );
            traces.insert(channel, trace);
            fits.insert(channel, fit);
        }

        self.traces = traces;
        self.fits = fits;
        self.state = SweepState::Analyzed;
        Ok(())
    }

    fn require_analyzed(&self, operation: &'static str) -> ObservationResult<()> {
        if self.state == SweepState::Analyzed {
            Ok(())
        } else {
            Err(ObservationError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    pub fn fit(&self, channel: usize) -> ObservationResult<&FitOf<R>> {
        self.require_analyzed("read fit")?;
        self.fits
            .get(&channel)
            .ok_or(ObservationError::ChannelNotTracked(channel))
    }

    /// Absolute fitted resonance in Hz.
    pub fn resonance_frequency(&self, channel: usize) -> ObservationResult<f64> {
        Ok(self.fit(channel)?.resonance_frequency())
    }

    /// Resonance relative to the LO, directly usable as a DDS tone.
    pub fn resonance_if_frequency(&self, channel: usize) -> ObservationResult<f64> {
        Ok(self.resonance_frequency(channel)? - self.lo_hz)
    }

    pub fn render(&self, channel: usize, destination: &Path) -> ObservationResult<()> {
        self.require_analyzed("render")?;
        let trace = self
            .traces
            .get(&channel)
            .ok_or(ObservationError::ChannelNotTracked(channel))?;
        let fit = self.fit(channel)?;
        render_sweep(trace, fit, destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::TriggerRequest;
    use crate::tone::ToneTable;
    use num_complex::Complex64;
    use std::cell::Cell;

    const LO: f64 = 4.0e9;

    #[derive(Default)]
    struct CountingFpga {
        sweeps: usize,
        last: Option<SweepRequest>,
    }

    impl AcquisitionDriver for CountingFpga {
        fn max_channels(&self) -> usize {
            4
        }

        fn sweep(&mut self, request: &SweepRequest) -> ObservationResult<()> {
            self.sweeps += 1;
            self.last = Some(request.clone());
            Ok(())
        }

        fn trigger(&mut self, _: &ToneTable, _: &TriggerRequest) -> ObservationResult<()> {
            Ok(())
        }
    }

    struct FixedFit(f64);

    impl ResonanceFit for FixedFit {
        fn resonance_frequency(&self) -> f64 {
            self.0
        }

        fn parameters(&self) -> BTreeMap<String, f64> {
            BTreeMap::from([("fr".to_string(), self.0)])
        }

        fn model(&self, _: f64) -> Complex64 {
            Complex64::new(1.0, 0.0)
        }

        fn derotate(&self, _: f64, iq: Complex64) -> Complex64 {
            iq
        }
    }

    struct FlatTrace {
        resonance: f64,
        frequencies: Vec<f64>,
        iq: Vec<Complex64>,
    }

    impl SweepTrace for FlatTrace {
        type Fit = FixedFit;

        fn frequencies(&self) -> &[f64] {
            &self.frequencies
        }

        fn iq(&self) -> &[Complex64] {
            &self.iq
        }

        fn fit(&self) -> ObservationResult<FixedFit> {
            Ok(FixedFit(self.resonance))
        }
    }

    /// Resonance = LO + centre + 10 kHz * (channel + 1).
    struct OffsetReader {
        centres: Vec<f64>,
        reads: Cell<usize>,
    }

    impl SweepReader for OffsetReader {
        type Trace = FlatTrace;

        fn read(&self, _: &Path, channel: usize, lo_hz: f64) -> ObservationResult<FlatTrace> {
            self.reads.set(self.reads.get() + 1);
            let centre = self
                .centres
                .get(channel)
                .copied()
                .ok_or_else(|| ObservationError::Analysis(format!("no channel {channel}")))?;
            Ok(FlatTrace {
                resonance: lo_hz + centre + 1e4 * (channel + 1) as f64,
                frequencies: vec![lo_hz + centre],
                iq: vec![Complex64::new(1.0, 0.0)],
            })
        }
    }

    fn settings() -> SweepSettings {
        SweepSettings::from_megahertz(6.0, 0.01, 1.0).unwrap()
    }

    fn session(channels: Vec<usize>) -> (SweepSession<OffsetReader>, OffsetReader) {
        let centres = vec![100e6, 150e6, 200e6];
        let reader = OffsetReader {
            centres: centres.clone(),
            reads: Cell::new(0),
        };
        (
            SweepSession::new(centres, channels, settings(), LO, "swp.rawdata"),
            reader,
        )
    }

    #[test]
    fn analyze_before_measure_is_invalid_state() {
        let (mut session, reader) = session(vec![0]);
        let err = session.analyze(&reader).unwrap_err();
        assert!(matches!(
            err,
            ObservationError::InvalidState {
                state: SweepState::Unmeasured,
                ..
            }
        ));
        assert_eq!(reader.reads.get(), 0);
    }

    #[test]
    fn second_measure_without_force_is_a_no_op() {
        let (mut session, _) = session(vec![0]);
        let mut fpga = CountingFpga::default();
        assert!(session.measure(&mut fpga, false).unwrap());
        assert!(!session.measure(&mut fpga, false).unwrap());
        assert_eq!(fpga.sweeps, 1);
        assert!(session.measure(&mut fpga, true).unwrap());
        assert_eq!(fpga.sweeps, 2);
    }

    #[test]
    fn measure_passes_comb_and_destination() {
        let (mut session, _) = session(vec![1]);
        let mut fpga = CountingFpga::default();
        session.measure(&mut fpga, false).unwrap();
        let request = fpga.last.unwrap();
        assert_eq!(request.centres_hz, vec![100e6, 150e6, 200e6]);
        assert_eq!(request.destination, PathBuf::from("swp.rawdata"));
        assert_eq!(request.settings.step_hz, settings().step_hz);
    }

    #[test]
    fn analyze_reads_once_per_channel_and_caches() {
        let (mut session, reader) = session(vec![0, 2]);
        let mut fpga = CountingFpga::default();
        session.measure(&mut fpga, false).unwrap();
        session.analyze(&reader).unwrap();
        session.analyze(&reader).unwrap();
        assert_eq!(reader.reads.get(), 2);
        assert_eq!(session.state(), SweepState::Analyzed);

        session.reanalyze(&reader).unwrap();
        assert_eq!(reader.reads.get(), 4);
    }

    #[test]
    fn if_frequency_is_resonance_minus_lo() {
        let (mut session, reader) = session(vec![0, 1, 2]);
        let mut fpga = CountingFpga::default();
        session.measure(&mut fpga, false).unwrap();
        session.analyze(&reader).unwrap();
        for channel in [0, 1, 2] {
            let fr = session.resonance_frequency(channel).unwrap();
            assert_eq!(session.resonance_if_frequency(channel).unwrap(), fr - LO);
        }
        assert_eq!(session.resonance_frequency(1).unwrap(), LO + 150e6 + 2e4);
    }

    #[test]
    fn accessors_do_not_fit_on_demand() {
        let (mut session, reader) = session(vec![0]);
        let mut fpga = CountingFpga::default();
        session.measure(&mut fpga, false).unwrap();
        assert!(matches!(
            session.resonance_frequency(0),
            Err(ObservationError::InvalidState { .. })
        ));
        assert_eq!(reader.reads.get(), 0);
    }

    #[test]
    fn untracked_channel_is_a_lookup_error() {
        let (mut session, reader) = session(vec![0]);
        let mut fpga = CountingFpga::default();
        session.measure(&mut fpga, false).unwrap();
        session.analyze(&reader).unwrap();
        assert!(matches!(
            session.resonance_frequency(2),
            Err(ObservationError::ChannelNotTracked(2))
        ));
    }

    #[test]
    fn empty_channel_set_analyzes_to_nothing() {
        let (mut session, reader) = session(vec![]);
        let mut fpga = CountingFpga::default();
        session.measure(&mut fpga, false).unwrap();
        session.analyze(&reader).unwrap();
        assert_eq!(session.state(), SweepState::Analyzed);
        assert!(matches!(
            session.resonance_frequency(0),
            Err(ObservationError::ChannelNotTracked(0))
        ));
    }

    #[test]
    fn reader_failure_propagates_and_keeps_state() {
        let (mut session, reader) = session(vec![5]);
        let mut fpga = CountingFpga::default();
        session.measure(&mut fpga, false).unwrap();
        let err = session.analyze(&reader).unwrap_err();
        assert!(matches!(err, ObservationError::Analysis(_)));
        assert_eq!(session.state(), SweepState::Measured);
    }

    #[test]
    fn render_requires_analysis() {
        let (session, _) = session(vec![0]);
        let err = session.render(0, Path::new("unused.png")).unwrap_err();
        assert!(matches!(err, ObservationError::InvalidState { .. }));
    }

    #[test]
    fn forced_measure_drops_stale_fits() {
        let (mut session, reader) = session(vec![0]);
        let mut fpga = CountingFpga::default();
        session.measure(&mut fpga, false).unwrap();
        session.analyze(&reader).unwrap();
        session.measure(&mut fpga, true).unwrap();
        assert_eq!(session.state(), SweepState::Measured);
        assert!(session.resonance_frequency(0).is_err());
    }
}
