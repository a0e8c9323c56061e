use std::time::{Duration, Instant};

/// Default wall-clock spacing between progress reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(250);

/// Updates that use the raw rate before smoothing kicks in.
pub const WARMUP_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    pub completed: usize,
    pub total: usize,
    pub percent: f32,
    pub fps: f32,
    pub eta_seconds: f32,
}

/// Smoothed throughput and time-to-completion for the capture loop.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    total: usize,
    interval: Duration,
    last_report: Instant,
    last_completed: usize,
    samples: usize,
    fps: f32,
}

impl ProgressEstimator {
    pub fn new(total: usize, interval: Duration, started: Instant) -> Self {
        Self {
            total,
            interval,
            last_report: started,
            last_completed: 0,
            samples: 0,
            fps: 0.0,
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Feeds one throughput sample and returns the smoothed rate.
    pub fn update(&mut self, delta_pulses: usize, dt: Duration) -> f32 {
        let seconds = dt.as_secs_f32();
        if seconds <= 0.0 {
            return self.fps;
        }
        let raw = delta_pulses as f32 / seconds;
        self.fps = if self.samples < WARMUP_SAMPLES {
            raw
        } else {
            0.5 * self.fps + 0.5 * raw
        };
        self.samples += 1;
        self.fps
    }

    pub fn eta_seconds(&self, completed: usize) -> f32 {
        let remaining = self.total.saturating_sub(completed) as f32;
        if remaining == 0.0 {
            0.0
        } else if self.fps > 0.0 {
            remaining / self.fps
        } else {
            f32::INFINITY
        }
    }

    /// Produces a report only when the interval has elapsed since the last one.
    pub fn poll(&mut self, completed: usize, now: Instant) -> Option<ProgressReport> {
        let dt = now.saturating_duration_since(self.last_report);
        if dt < self.interval {
            return None;
        }
        let delta = completed.saturating_sub(self.last_completed);
        let fps = self.update(delta, dt);
        self.last_report = now;
        self.last_completed = completed;
        Some(ProgressReport {
            completed,
            total: self.total,
            percent: percent(completed, self.total),
            fps,
            eta_seconds: self.eta_seconds(completed),
        })
    }
}

/// Percent-only throttle for the warm-up phase.
#[derive(Debug, Clone)]
pub struct WarmupTicker {
    total: usize,
    interval: Duration,
    last_report: Instant,
}

impl WarmupTicker {
    pub fn new(total: usize, interval: Duration, started: Instant) -> Self {
        Self {
            total,
            interval,
            last_report: started,
        }
    }

    pub fn poll(&mut self, completed: usize, now: Instant) -> Option<f32> {
        if now.saturating_duration_since(self.last_report) < self.interval {
            return None;
        }
        self.last_report = now;
        Some(percent(completed, self.total))
    }
}

fn percent(completed: usize, total: usize) -> f32 {
    if total == 0 {
        100.0
    } else {
        completed as f32 / total as f32 * 100.0
    }
}
