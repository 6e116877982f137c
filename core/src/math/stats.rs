pub struct StatsHelper;

impl StatsHelper {
    /// Rounds `value` to the nearest multiple of `step`, ties to even.
    pub fn round_to_grid(value: f64, step: f64) -> f64 {
        if step <= 0.0 {
            return value;
        }
        (value / step).round_ties_even() * step
    }

    /// Index of the smallest finite sample.
    pub fn argmin(samples: &[f64]) -> Option<usize> {
        samples
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
    }

    /// Vertex abscissa of the parabola through three equally spaced points,
    /// expressed as an offset in units of the spacing from the middle point.
    pub fn parabolic_offset(left: f64, centre: f64, right: f64) -> f64 {
        let denom = left - 2.0 * centre + right;
        if denom.abs() < f64::EPSILON {
            return 0.0;
        }
        (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_grid_uses_kilohertz_steps() {
        assert_eq!(StatsHelper::round_to_grid(10_010_400.0, 1e3), 10_010_000.0);
        assert_eq!(StatsHelper::round_to_grid(10_010_600.0, 1e3), 10_011_000.0);
        assert_eq!(StatsHelper::round_to_grid(-2_499.0, 1e3), -2_000.0);
    }

    #[test]
    fn round_to_grid_ties_go_to_even() {
        assert_eq!(StatsHelper::round_to_grid(2_500.0, 1e3), 2_000.0);
        assert_eq!(StatsHelper::round_to_grid(3_500.0, 1e3), 4_000.0);
    }

    #[test]
    fn argmin_skips_nan() {
        assert_eq!(StatsHelper::argmin(&[3.0, f64::NAN, 1.0, 2.0]), Some(2));
        assert_eq!(StatsHelper::argmin(&[]), None);
    }

    #[test]
    fn parabolic_offset_is_zero_for_symmetric_points() {
        assert_eq!(StatsHelper::parabolic_offset(2.0, 1.0, 2.0), 0.0);
        assert!(StatsHelper::parabolic_offset(1.5, 1.0, 3.0) < 0.0);
    }
}
