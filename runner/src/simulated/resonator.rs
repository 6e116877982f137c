use num_complex::Complex64;
use std::f64::consts::PI;

/// Notch-type resonator seen through a lossy, rotating readout line.
#[derive(Debug, Clone, Copy)]
pub struct Resonator {
    pub fr: f64,
    pub qr: f64,
    pub qc: f64,
    pub gain: f64,
    pub rotation: f64,
}

impl Resonator {
    pub fn new(fr: f64) -> Self {
        Self {
            fr,
            qr: 2.0e4,
            qc: 4.0e4,
            gain: 0.8,
            rotation: 0.3 * PI,
        }
    }

    pub fn s21(&self, frequency: f64) -> Complex64 {
        let detuning = (frequency - self.fr) / self.fr;
        let coupling = Complex64::new(self.qr / self.qc, 0.0);
        let notch =
            Complex64::new(1.0, 0.0) - coupling / Complex64::new(1.0, 2.0 * self.qr * detuning);
        Complex64::from_polar(self.gain, self.rotation) * notch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transmission_dips_at_resonance() {
        let res = Resonator::new(4.1e9);
        let on = res.s21(4.1e9).norm();
        let off = res.s21(4.1e9 + 2e6).norm();
        assert!((on - 0.4).abs() < 1e-9);
        assert!(off > 0.75);
    }
}
