use crate::prelude::{ObservationError, ObservationResult};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Wall-clock instant in the facility's fixed local zone.
pub type Timestamp = DateTime<FixedOffset>;

/// One scheduled sweep-then-trigger window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub index: usize,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    pub fn new(index: usize, start: Timestamp, end: Timestamp) -> ObservationResult<Self> {
        if start > end {
            return Err(ObservationError::Configuration(format!(
                "schedule[{index}] starts at {start} after its end {end}"
            )));
        }
        Ok(Self { index, start, end })
    }

    pub fn has_started(&self, now: &Timestamp) -> bool {
        *now >= self.start
    }

    pub fn has_ended(&self, now: &Timestamp) -> bool {
        *now >= self.end
    }
}

/// Returns the first window, in stored order, whose end lies after `now`.
///
/// Windows are neither sorted nor deduplicated: with an unsorted schedule an
/// earlier entry can shadow a later one.
pub fn active_window<'a>(now: &Timestamp, windows: &'a [TimeWindow]) -> Option<&'a TimeWindow> {
    windows.iter().find(|window| window.end > *now)
}

/// Ordered, read-only list of windows loaded at startup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schedule {
    windows: Vec<TimeWindow>,
}

impl Schedule {
    pub fn new(windows: Vec<TimeWindow>) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn active_window(&self, now: &Timestamp) -> Option<&TimeWindow> {
        active_window(now, &self.windows)
    }
}
