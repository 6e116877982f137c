use crate::prelude::{ObservationError, ObservationResult};
use log::info;

/// Local-oscillator signal generator.
pub trait Synthesizer {
    fn set_frequency_millihertz(&mut self, millihertz: u64) -> ObservationResult<()>;

    /// Releases the port so other tools can reach the instrument.
    fn close(self) -> ObservationResult<()>
    where
        Self: Sized;
}

/// Sets the LO and releases the synthesizer straight away.
///
/// The handle is closed even when programming the frequency fails.
pub fn tune_local_oscillator<S: Synthesizer>(mut synth: S, lo_hz: f64) -> ObservationResult<()> {
    if !lo_hz.is_finite() || lo_hz <= 0.0 {
        let _ = synth.close();
        return Err(ObservationError::Configuration(format!(
            "local oscillator frequency {lo_hz} Hz is not positive"
        )));
    }

    let millihertz = (lo_hz * 1e3).round() as u64;
    let outcome = synth.set_frequency_millihertz(millihertz);
    let closed = synth.close();
    outcome?;
    closed?;

    info!("Local oscillator set to {:.6} GHz", lo_hz / 1e9);
    Ok(())
}
