use log::{debug, info};
use mkidcore::hardware::Synthesizer;
use mkidcore::{ObservationError, ObservationResult};

/// Records the programmed frequency instead of talking to a serial port.
pub struct SimulatedSynthesizer {
    port: String,
    millihertz: Option<u64>,
}

impl SimulatedSynthesizer {
    pub fn open(port: &str) -> ObservationResult<Self> {
        if port.trim().is_empty() {
            return Err(ObservationError::Acquisition("no synthesizer port given".into()));
        }
        debug!("opened simulated synthesizer on {port}");
        Ok(Self {
            port: port.to_string(),
            millihertz: None,
        })
    }
}

impl Synthesizer for SimulatedSynthesizer {
    fn set_frequency_millihertz(&mut self, millihertz: u64) -> ObservationResult<()> {
        self.millihertz = Some(millihertz);
        Ok(())
    }

    fn close(self) -> ObservationResult<()> {
        info!(
            "closed simulated synthesizer on {} at {:?} mHz",
            self.port, self.millihertz
        );
        Ok(())
    }
}
