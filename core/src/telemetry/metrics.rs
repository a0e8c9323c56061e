use std::sync::Mutex;

/// Counters shared by the capture loop and the output path.
pub struct MetricsRecorder {
    inner: Mutex<CaptureMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureMetrics {
    pub pulses_captured: usize,
    pub boundary_events: usize,
    pub files_written: usize,
    pub bytes_written: u64,
    pub write_failures: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CaptureMetrics::default()),
        }
    }

    pub fn record_pulses(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.pulses_captured += count;
        }
    }

    pub fn record_boundaries(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.boundary_events += count;
        }
    }

    pub fn record_file(&self, bytes: u64) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.files_written += 1;
            metrics.bytes_written += bytes;
        }
    }

    pub fn record_write_failure(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.write_failures += 1;
        }
    }

    pub fn snapshot(&self) -> CaptureMetrics {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            CaptureMetrics::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRecorder::new();
        metrics.record_pulses(2400);
        metrics.record_pulses(100);
        metrics.record_file(128);
        metrics.record_write_failure();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.pulses_captured, 2500);
        assert_eq!(snapshot.bytes_written, 128);
        assert_eq!(snapshot.write_failures, 1);
        assert_eq!(snapshot.boundary_events, 0);
    }
}
