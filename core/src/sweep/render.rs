use crate::prelude::{ObservationError, ObservationResult};
use crate::sweep::fit::SweepTrace;
use std::path::Path;

#[cfg(not(feature = "plotting"))]
pub fn render_sweep<T: SweepTrace>(
    _trace: &T,
    _fit: &T::Fit,
    destination: &Path,
) -> ObservationResult<()> {
    Err(ObservationError::DiagnosticExport(format!(
        "cannot write {}: built without the \"plotting\" feature",
        destination.display()
    )))
}

/// Writes a two-panel PNG: |S21| against frequency with the fitted resonance
/// marked, and the derotated IQ trace over the derotated model.
#[cfg(feature = "plotting")]
pub fn render_sweep<T: SweepTrace>(
    trace: &T,
    fit: &T::Fit,
    destination: &Path,
) -> ObservationResult<()> {
    use crate::sweep::fit::ResonanceFit;
    use num_complex::Complex64;
    use plotters::prelude::*;

    /// Width of each panel in pixels.
    const PANEL: u32 = 400;

    let export = |e: &dyn std::fmt::Display| {
        ObservationError::DiagnosticExport(format!("{}: {e}", destination.display()))
    };

    let frequencies = trace.frequencies();
    if frequencies.is_empty() {
        return Err(export(&"sweep trace is empty"));
    }
    let amplitude = trace.amplitude();
    let x_mhz: Vec<f64> = frequencies.iter().map(|f| f / 1e6).collect();
    let (x_lo, x_hi) = span(x_mhz.iter().copied());
    let y_hi = match amplitude.iter().copied().fold(0.0_f64, f64::max) {
        peak if peak > 0.0 => peak * 1.1,
        _ => 1.0,
    };
    let fr_mhz = fit.resonance_frequency() / 1e6;

    let model: Vec<Complex64> = frequencies
        .iter()
        .map(|&f| fit.derotate(f, fit.model(f)))
        .collect();
    let data: Vec<Complex64> = frequencies
        .iter()
        .zip(trace.iq())
        .map(|(&f, &z)| fit.derotate(f, z))
        .collect();
    let (re_lo, re_hi) = span(model.iter().chain(&data).map(|z| z.re));
    let (im_lo, im_hi) = span(model.iter().chain(&data).map(|z| z.im));

    let root = BitMapBackend::new(destination, (2 * PANEL, PANEL)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| export(&e))?;
    let (left, right) = root.split_horizontally(PANEL);

    let mut sweep_chart = ChartBuilder::on(&left)
        .margin(12)
        .build_cartesian_2d(x_lo..x_hi, 0.0..y_hi)
        .map_err(|e| export(&e))?;
    sweep_chart
        .draw_series(LineSeries::new(
            x_mhz.iter().copied().zip(amplitude.iter().copied()),
            &BLUE,
        ))
        .map_err(|e| export(&e))?;
    sweep_chart
        .draw_series(LineSeries::new(vec![(fr_mhz, 0.0), (fr_mhz, y_hi)], &RED))
        .map_err(|e| export(&e))?;

    let mut iq_chart = ChartBuilder::on(&right)
        .margin(12)
        .build_cartesian_2d(re_lo..re_hi, im_lo..im_hi)
        .map_err(|e| export(&e))?;
    iq_chart
        .draw_series(LineSeries::new(model.iter().map(|z| (z.re, z.im)), &GREEN))
        .map_err(|e| export(&e))?;
    iq_chart
        .draw_series(
            data.iter()
                .step_by(5)
                .map(|z| Circle::new((z.re, z.im), 2, BLUE.filled())),
        )
        .map_err(|e| export(&e))?;

    root.present().map_err(|e| export(&e))?;
    log::debug!("wrote sweep diagnostic {}", destination.display());
    Ok(())
}

/// Padded `[min, max]` of finite values; never collapses to a point.
#[cfg_attr(not(feature = "plotting"), allow(dead_code))]
fn span<I: Iterator<Item = f64>>(values: I) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-9);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::fit::ResonanceFit;
    use num_complex::Complex64;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    struct Dip;

    impl ResonanceFit for Dip {
        fn resonance_frequency(&self) -> f64 {
            4.1e9
        }

        fn parameters(&self) -> BTreeMap<String, f64> {
            BTreeMap::new()
        }

        fn model(&self, frequency: f64) -> Complex64 {
            let x = (frequency - 4.1e9) / 1e5;
            Complex64::new(1.0, 0.0) - Complex64::new(0.8, 0.0) / Complex64::new(1.0, 2.0 * x)
        }

        fn derotate(&self, _frequency: f64, iq: Complex64) -> Complex64 {
            iq
        }
    }

    struct Trace {
        frequencies: Vec<f64>,
        iq: Vec<Complex64>,
    }

    impl SweepTrace for Trace {
        type Fit = Dip;

        fn frequencies(&self) -> &[f64] {
            &self.frequencies
        }

        fn iq(&self) -> &[Complex64] {
            &self.iq
        }

        fn fit(&self) -> ObservationResult<Dip> {
            Ok(Dip)
        }
    }

    fn trace(points: usize) -> Trace {
        let frequencies: Vec<f64> = (0..points).map(|i| 4.099e9 + i as f64 * 1e4).collect();
        let iq = frequencies.iter().map(|&f| Dip.model(f)).collect();
        Trace { frequencies, iq }
    }

    #[test]
    fn span_pads_degenerate_ranges() {
        let (lo, hi) = span([2.0, 2.0].into_iter());
        assert!(lo < 2.0 && hi > 2.0);
        assert_eq!(span(std::iter::empty()), (-1.0, 1.0));
    }

    #[test]
    fn empty_trace_is_an_export_error() {
        let dir = tempdir().unwrap();
        let err = render_sweep(&trace(0), &Dip, &dir.path().join("empty.png")).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[cfg(feature = "plotting")]
    #[test]
    fn writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("swp_000.png");
        render_sweep(&trace(201), &Dip, &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[cfg(not(feature = "plotting"))]
    #[test]
    fn reports_missing_feature() {
        let dir = tempdir().unwrap();
        let err = render_sweep(&trace(10), &Dip, &dir.path().join("x.png")).unwrap_err();
        assert!(err.to_string().contains("plotting"));
    }
}
