use serde::Serialize;

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunMetrics {
    pub windows_completed: usize,
    pub sweeps: usize,
    pub channels_fitted: usize,
    pub triggers: usize,
    pub diagnostics_written: usize,
    pub diagnostics_failed: usize,
}

pub struct MetricsRecorder {
    inner: RunMetrics,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: RunMetrics::default(),
        }
    }

    pub fn record_sweep(&mut self, channels: usize) {
        self.inner.sweeps += 1;
        self.inner.channels_fitted += channels;
    }

    pub fn record_trigger(&mut self) {
        self.inner.triggers += 1;
    }

    pub fn record_diagnostic(&mut self, written: bool) {
        if written {
            self.inner.diagnostics_written += 1;
        } else {
            self.inner.diagnostics_failed += 1;
        }
    }

    pub fn record_window(&mut self) {
        self.inner.windows_completed += 1;
    }

    pub fn snapshot(&self) -> RunMetrics {
        self.inner
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
