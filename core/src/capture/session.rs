use crate::capture::buffer::{PulseCaptureBuffer, PulseRecord};
use crate::capture::progress::{
    ProgressEstimator, ProgressReport, WarmupTicker, DEFAULT_REPORT_INTERVAL,
};
use crate::engine_interface::SimulationEngine;
use crate::prelude::{CaptureError, CaptureResult};
use crate::scan::{BeamPosition, ScanEvent, ScanState};
use crate::telemetry::LogManager;
use std::time::{Duration, Instant};

/// PRT used while warming up the scatterer field.
pub const WARM_UP_PRT: f32 = 1.0 / 60.0;

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub num_pulses: usize,
    pub warm_up_pulses: usize,
    /// PRT for the capture phase; the engine's own PRT when unset.
    pub prt: Option<f32>,
    pub warm_up_prt: f32,
    pub record_iq: bool,
    pub progress_interval: Duration,
    pub logger: LogManager,
}

impl CaptureSettings {
    pub fn new(num_pulses: usize) -> Self {
        Self {
            num_pulses,
            warm_up_pulses: 0,
            prt: None,
            warm_up_prt: WARM_UP_PRT,
            record_iq: true,
            progress_interval: DEFAULT_REPORT_INTERVAL,
            logger: LogManager::new(),
        }
    }

    pub fn with_prt(mut self, prt: f32) -> Self {
        self.prt = Some(prt);
        self
    }

    pub fn with_warm_up(mut self, pulses: usize) -> Self {
        self.warm_up_pulses = pulses;
        self
    }

    pub fn with_record_iq(mut self, record_iq: bool) -> Self {
        self.record_iq = record_iq;
        self
    }

    pub fn with_logger(mut self, logger: LogManager) -> Self {
        self.logger = logger;
        self
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.num_pulses == 0 {
            return Err(CaptureError::InvalidConfig("no pulses to be generated".into()));
        }
        if let Some(prt) = self.prt {
            if !(prt > 0.0) {
                return Err(CaptureError::InvalidConfig(format!(
                    "pulse repetition time {} must be positive",
                    prt
                )));
            }
        }
        if !(self.warm_up_prt > 0.0) {
            return Err(CaptureError::InvalidConfig(
                "warm-up pulse repetition time must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Turbulence table frames needed to cover warm-up plus capture.
pub fn turbulence_frames_required(
    num_pulses: usize,
    prt: f32,
    warm_up_pulses: usize,
    warm_up_prt: f32,
    table_period: f32,
) -> CaptureResult<usize> {
    let span = num_pulses as f32 * prt + warm_up_pulses as f32 * warm_up_prt;
    let frames = (span / table_period).ceil();
    if frames.is_finite() && frames >= 1.0 {
        Ok(frames as usize)
    } else {
        Err(CaptureError::NoTurbulenceFrames)
    }
}

/// Startup checks and table loading; nothing is captured here.
pub fn prepare_engine<E: SimulationEngine + ?Sized>(
    engine: &mut E,
    settings: &CaptureSettings,
) -> CaptureResult<usize> {
    settings.validate()?;
    let prt = settings.prt.unwrap_or(engine.params().prt);
    let frames = turbulence_frames_required(
        settings.num_pulses,
        prt,
        settings.warm_up_pulses,
        settings.warm_up_prt,
        engine.turbulence_table_period(),
    )?;
    engine.load_turbulence_frames(frames)?;
    Ok(frames)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureProgress {
    WarmingUp {
        completed: usize,
        total: usize,
        percent: f32,
    },
    Capturing {
        report: ProgressReport,
        beam: BeamPosition,
    },
}

#[derive(Debug)]
pub struct CaptureOutcome {
    pub buffer: Option<PulseCaptureBuffer>,
    pub pulses: usize,
    pub boundary_events: usize,
    pub elapsed: Duration,
    pub average_fps: f32,
}

/// Warm-up followed by one beam position, pulse and buffer append per index.
pub fn run_capture<E, F>(
    engine: &mut E,
    scan: &mut ScanState,
    settings: &CaptureSettings,
    mut on_progress: F,
) -> CaptureResult<CaptureOutcome>
where
    E: SimulationEngine + ?Sized,
    F: FnMut(CaptureProgress),
{
    settings.validate()?;
    let started = Instant::now();
    let capture_prt = settings.prt.unwrap_or(engine.params().prt);

    let mut buffer = if settings.record_iq {
        Some(PulseCaptureBuffer::allocate(
            settings.num_pulses,
            engine.params().range_count as usize,
        )?)
    } else {
        None
    };

    if settings.warm_up_pulses > 0 {
        engine.set_prt(settings.warm_up_prt);
        let mut ticker =
            WarmupTicker::new(settings.warm_up_pulses, settings.progress_interval, Instant::now());
        for k in 0..settings.warm_up_pulses {
            if let Some(percent) = ticker.poll(k, Instant::now()) {
                on_progress(CaptureProgress::WarmingUp {
                    completed: k,
                    total: settings.warm_up_pulses,
                    percent,
                });
            }
            engine.advance_time();
        }
    }
    engine.set_prt(capture_prt);

    let mut progress =
        ProgressEstimator::new(settings.num_pulses, settings.progress_interval, Instant::now());
    let mut boundary_events = 0usize;

    for k in 0..settings.num_pulses {
        if let Some(report) = progress.poll(k, Instant::now()) {
            on_progress(CaptureProgress::Capturing {
                report,
                beam: scan.position(),
            });
        }

        engine.advance_beam(scan.azimuth, scan.elevation);
        engine.generate_pulse()?;
        engine.advance_time();

        if let Some(buffer) = buffer.as_mut() {
            let record = PulseRecord::new(engine.sim_time(), scan.azimuth, scan.elevation);
            buffer.append(k, record, engine.download_pulse())?;
        }

        if scan.advance() == ScanEvent::BoundaryCrossed {
            if boundary_events == 0 {
                settings.logger.caution(&format!(
                    "beam left the sweep at pulse {} (az {:.2}, el {:.2})",
                    k, scan.azimuth, scan.elevation
                ));
            }
            boundary_events += 1;
        }
    }

    let elapsed = started.elapsed();
    let average_fps = if elapsed.as_secs_f32() > 0.0 {
        settings.num_pulses as f32 / elapsed.as_secs_f32()
    } else {
        0.0
    };
    settings.logger.record(&format!(
        "Finished.  Total time elapsed = {:.2} s  ({:.1} FPS)",
        elapsed.as_secs_f32(),
        average_fps
    ));

    Ok(CaptureOutcome {
        buffer,
        pulses: settings.num_pulses,
        boundary_events,
        elapsed,
        average_fps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_interface::stub::StubEngine;
    use crate::format::header::SessionHeader;
    use crate::scan::{ScanMode, SweepSpec};

    #[test]
    fn zero_pulses_fail_before_allocation() {
        let mut engine = StubEngine::new(8, 1);
        let mut scan = ScanState::new(SweepSpec::default(), 0.0, 3.0);
        let err =
            run_capture(&mut engine, &mut scan, &CaptureSettings::new(0), |_| {}).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfig(_)));
        assert!(err.is_startup_fatal());
        assert_eq!(engine.pulses_generated, 0);
        assert_eq!(engine.time_steps, 0);
    }

    #[test]
    fn capture_fills_one_record_per_pulse() {
        let mut engine = StubEngine::new(3, 1);
        let mut scan = ScanState::new("P:0:1:0.5".parse::<SweepSpec>().unwrap(), 0.0, 2.0);
        let settings = CaptureSettings::new(5).with_prt(0.5);
        let outcome = run_capture(&mut engine, &mut scan, &settings, |_| {}).unwrap();
        let buffer = outcome.buffer.unwrap();

        assert!(buffer.is_full());
        let times: Vec<f64> = buffer.records().iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![0.5, 1.0, 1.5, 2.0, 2.5]);
        let azimuths: Vec<f32> = buffer.records().iter().map(|r| r.azimuth_deg).collect();
        assert_eq!(azimuths, vec![0.0, 0.5, 1.0, 0.0, 0.5]);
        let (_, samples) = buffer.pulse(4).unwrap();
        assert_eq!(samples[2].channels(), [4.0, 2.0, 0.5, 2.0]);
        assert_eq!(outcome.boundary_events, 0);
    }

    #[test]
    fn warm_up_advances_time_without_pulses() {
        let mut engine = StubEngine::new(2, 1);
        let mut scan = ScanState::new(SweepSpec::default(), 0.0, 3.0);
        let settings = CaptureSettings::new(3).with_warm_up(60).with_prt(1.0e-3);
        let outcome = run_capture(&mut engine, &mut scan, &settings, |_| {}).unwrap();
        assert_eq!(engine.pulses_generated, 3);
        assert_eq!(engine.time_steps, 63);
        assert_eq!(engine.prt, 1.0e-3);
        let first = outcome.buffer.unwrap().records()[0].timestamp;
        assert!((first - (1.0 + 1.0e-3)).abs() < 1e-4);
    }

    #[test]
    fn iq_recording_can_be_skipped() {
        let mut engine = StubEngine::new(2, 1);
        let mut scan = ScanState::new(SweepSpec::default(), 0.0, 3.0);
        let settings = CaptureSettings::new(4).with_record_iq(false);
        let outcome = run_capture(&mut engine, &mut scan, &settings, |_| {}).unwrap();
        assert!(outcome.buffer.is_none());
        assert_eq!(engine.pulses_generated, 4);
    }

    #[test]
    fn progress_callback_is_throttled() {
        let mut engine = StubEngine::new(1, 1);
        let mut scan = ScanState::new(SweepSpec::default(), 0.0, 3.0);
        let mut settings = CaptureSettings::new(200);
        settings.progress_interval = Duration::from_secs(3600);
        let mut calls = 0;
        run_capture(&mut engine, &mut scan, &settings, |_| calls += 1).unwrap();
        assert_eq!(calls, 0);
        assert_eq!(engine.pulses_generated, 200);
    }

    #[test]
    fn turbulence_frames_cover_the_session() {
        assert_eq!(turbulence_frames_required(2400, 1.0e-3, 0, WARM_UP_PRT, 1.0).unwrap(), 3);
        assert_eq!(turbulence_frames_required(1, 1.0e-3, 2000, WARM_UP_PRT, 1.0).unwrap(), 34);
        assert!(matches!(
            turbulence_frames_required(0, 1.0e-3, 0, WARM_UP_PRT, 1.0),
            Err(CaptureError::NoTurbulenceFrames)
        ));
        assert!(turbulence_frames_required(10, 1.0e-3, 0, WARM_UP_PRT, 0.0).is_err());
    }

    #[test]
    fn prepare_loads_tables_and_rejects_empty_sessions() {
        let mut engine = StubEngine::new(2, 1);
        assert_eq!(prepare_engine(&mut engine, &CaptureSettings::new(1500)).unwrap(), 2);
        assert_eq!(engine.frames_loaded, 2);
        assert!(prepare_engine(&mut engine, &CaptureSettings::new(0)).is_err());
    }

    #[test]
    fn scenario_ppi_session_ends_back_at_start() {
        let mut engine = StubEngine::new(4, 11);
        let sweep: SweepSpec = "P:-12:12:0.01".parse().unwrap();
        let mut scan = ScanState::new(sweep, 0.0, 3.0);
        let header = SessionHeader::capture(&engine, &scan, 2400).unwrap();
        let outcome =
            run_capture(&mut engine, &mut scan, &CaptureSettings::new(2400), |_| {}).unwrap();

        assert_eq!(header.scan_mode, ScanMode::Ppi);
        assert_eq!(header.scan_mode.tag(), "PPI");
        assert!((scan.azimuth - sweep.start).abs() <= sweep.delta);
        assert_eq!(outcome.buffer.unwrap().len(), 2400);
    }
}
