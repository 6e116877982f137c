use crate::config::RETUNE_GRID_HZ;
use crate::math::StatsHelper;
use crate::prelude::ObservationResult;
use crate::sweep::{SweepReader, SweepSession};
use crate::tone::ToneTable;

/// Copies `baseline` and moves every tracked channel onto its fitted IF
/// resonance, snapped to the 1 kHz grid. `baseline` itself is left intact so
/// each window starts again from the design frequencies.
pub fn retuned_tones<R: SweepReader>(
    baseline: &ToneTable,
    session: &SweepSession<R>,
) -> ObservationResult<ToneTable> {
    let mut tones = baseline.clone();
    for &channel in session.channels() {
        let frequency = session.resonance_if_frequency(channel)?;
        tones.set_frequency(channel, StatsHelper::round_to_grid(frequency, RETUNE_GRID_HZ))?;
    }
    Ok(tones)
}
