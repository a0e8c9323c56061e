use crate::scan::sweep::SweepSpec;
use serde::{Deserialize, Serialize};

/// Scan strategy of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScanMode {
    #[serde(rename = "PPI")]
    Ppi,
    #[serde(rename = "RHI")]
    Rhi,
    #[serde(rename = "STARE")]
    Stare,
}

impl ScanMode {
    pub fn tag(&self) -> &'static str {
        match self {
            ScanMode::Ppi => "PPI",
            ScanMode::Rhi => "RHI",
            ScanMode::Stare => "STARE",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "PPI" => Some(ScanMode::Ppi),
            "RHI" => Some(ScanMode::Rhi),
            "STARE" => Some(ScanMode::Stare),
            _ => None,
        }
    }
}

/// Outcome of a single beam advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    Continuing,
    /// The driven angle is outside the sweep even after wrapping, or a
    /// nonzero step could not move it off the sweep edge.
    BoundaryCrossed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamPosition {
    pub azimuth: f32,
    pub elevation: f32,
}

/// Scan geometry, advanced once per pulse.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanState {
    pub mode: ScanMode,
    pub start: f32,
    pub end: f32,
    pub delta: f32,
    pub azimuth: f32,
    pub elevation: f32,
}

impl ScanState {
    /// Builds the state from a sweep; the driven angle starts at `sweep.start`.
    pub fn new(sweep: SweepSpec, azimuth: f32, elevation: f32) -> Self {
        let mut state = Self {
            mode: sweep.mode,
            start: sweep.start,
            end: sweep.end,
            delta: sweep.delta,
            azimuth,
            elevation,
        };
        match sweep.mode {
            ScanMode::Ppi => state.azimuth = sweep.start,
            ScanMode::Rhi => state.elevation = sweep.start,
            ScanMode::Stare => {}
        }
        state
    }

    pub fn position(&self) -> BeamPosition {
        BeamPosition {
            azimuth: self.azimuth,
            elevation: self.elevation,
        }
    }

    /// The angle held constant by the sweep: elevation for PPI, azimuth for RHI.
    pub fn fixed_angle(&self) -> Option<f32> {
        match self.mode {
            ScanMode::Ppi => Some(self.elevation),
            ScanMode::Rhi => Some(self.azimuth),
            ScanMode::Stare => None,
        }
    }

    pub fn advance(&mut self) -> ScanEvent {
        let (start, end, delta) = (self.start, self.end, self.delta);
        let angle = match self.mode {
            ScanMode::Ppi => &mut self.azimuth,
            ScanMode::Rhi => &mut self.elevation,
            ScanMode::Stare => return ScanEvent::Continuing,
        };
        let before = *angle;
        *angle = wrap_step(before, start, end, delta);

        // A step against the start->end direction wraps back onto the same edge.
        let stuck = delta != 0.0 && start != end && *angle == before;
        let (low, high) = if start <= end { (start, end) } else { (end, start) };
        if stuck || !(low..=high).contains(&*angle) {
            ScanEvent::BoundaryCrossed
        } else {
            ScanEvent::Continuing
        }
    }

    /// Beam positions of the next `count` pulses, leaving `self` untouched.
    pub fn preview(&self, count: usize) -> Vec<BeamPosition> {
        let mut scratch = self.clone();
        (0..count)
            .map(|_| {
                let position = scratch.position();
                scratch.advance();
                position
            })
            .collect()
    }
}

fn wrap_step(angle: f32, start: f32, end: f32, delta: f32) -> f32 {
    let next = angle + delta;
    if delta > 0.0 {
        if next > end {
            start
        } else if next < start {
            end
        } else {
            next
        }
    } else if delta < 0.0 {
        if next > start {
            end
        } else if next < end {
            start
        } else {
            next
        }
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(mode: ScanMode, start: f32, end: f32, delta: f32) -> SweepSpec {
        SweepSpec {
            mode,
            start,
            end,
            delta,
        }
    }

    #[test]
    fn ppi_wraps_to_start_within_one_pass() {
        let spec = sweep(ScanMode::Ppi, 0.0, 10.0, 0.5);
        let mut scan = ScanState::new(spec, 0.0, 3.0);
        let bound = ((spec.end - spec.start) / spec.delta.abs()).ceil() as usize + 1;
        let mut wrapped_at = None;
        for step in 1..=bound {
            let before = scan.azimuth;
            assert_eq!(scan.advance(), ScanEvent::Continuing);
            if scan.azimuth < before {
                wrapped_at = Some(step);
                assert_eq!(scan.azimuth, spec.start);
                break;
            }
        }
        assert!(wrapped_at.is_some());
        assert_eq!(scan.elevation, 3.0);
    }

    #[test]
    fn negative_delta_sweeps_down_and_wraps_to_start() {
        let spec = sweep(ScanMode::Ppi, 4.0, -4.0, -1.0);
        let mut scan = ScanState::new(spec, 0.0, 1.0);
        for _ in 0..8 {
            assert_eq!(scan.advance(), ScanEvent::Continuing);
        }
        assert_eq!(scan.azimuth, -4.0);
        scan.advance();
        assert_eq!(scan.azimuth, 4.0);
    }

    #[test]
    fn rhi_drives_elevation_only() {
        let spec = sweep(ScanMode::Rhi, 0.5, 2.5, 1.0);
        let mut scan = ScanState::new(spec, 7.0, 0.0);
        assert_eq!(scan.elevation, 0.5);
        let seen: Vec<f32> = (0..4)
            .map(|_| {
                scan.advance();
                scan.elevation
            })
            .collect();
        assert_eq!(seen, vec![1.5, 2.5, 0.5, 1.5]);
        assert_eq!(scan.azimuth, 7.0);
    }

    #[test]
    fn zero_delta_pins_the_angle() {
        let mut scan = ScanState::new(sweep(ScanMode::Ppi, -3.0, 3.0, 0.0), 0.0, 2.0);
        for _ in 0..10_000 {
            assert_eq!(scan.advance(), ScanEvent::Continuing);
        }
        assert_eq!(scan.azimuth, -3.0);
    }

    #[test]
    fn stare_never_moves() {
        let mut scan = ScanState::new(sweep(ScanMode::Stare, 0.0, 0.0, 1.0), 15.0, 4.0);
        for _ in 0..100 {
            assert_eq!(scan.advance(), ScanEvent::Continuing);
        }
        assert_eq!(scan.position(), BeamPosition { azimuth: 15.0, elevation: 4.0 });
    }

    #[test]
    fn angle_pinned_outside_sweep_reports_boundary_crossing() {
        let mut scan = ScanState {
            mode: ScanMode::Rhi,
            start: 1.0,
            end: 5.0,
            delta: 0.0,
            azimuth: 0.0,
            elevation: 9.0,
        };
        assert_eq!(scan.advance(), ScanEvent::BoundaryCrossed);
        assert_eq!(scan.elevation, 9.0);
    }

    #[test]
    fn misdirected_sweeps_report_every_stuck_step() {
        for (start, end, delta) in [(10.0, 0.0, 1.0), (-4.0, 4.0, -1.0)] {
            let mut scan = ScanState::new(sweep(ScanMode::Ppi, start, end, delta), 0.0, 3.0);
            for _ in 0..50 {
                assert_eq!(scan.advance(), ScanEvent::BoundaryCrossed);
            }
            assert_eq!(scan.azimuth, start);
        }
    }

    #[test]
    fn single_angle_sweep_is_not_a_crossing() {
        let mut scan = ScanState::new(sweep(ScanMode::Rhi, 5.0, 5.0, 1.0), 0.0, 0.0);
        for _ in 0..10 {
            assert_eq!(scan.advance(), ScanEvent::Continuing);
        }
        assert_eq!(scan.elevation, 5.0);
    }

    #[test]
    fn non_finite_delta_reports_boundary_crossing() {
        let mut scan = ScanState::new(sweep(ScanMode::Ppi, -1.0, 1.0, f32::NAN), 0.0, 0.0);
        assert_eq!(scan.advance(), ScanEvent::BoundaryCrossed);
    }

    #[test]
    fn scenario_ppi_full_pass_returns_to_start() {
        let spec = sweep(ScanMode::Ppi, -12.0, 12.0, 0.01);
        let mut scan = ScanState::new(spec, 0.0, 3.0);
        for _ in 0..2400 {
            scan.advance();
        }
        assert!((scan.azimuth - spec.start).abs() <= spec.delta);
    }

    #[test]
    fn preview_leaves_state_untouched() {
        let scan = ScanState::new(sweep(ScanMode::Ppi, 0.0, 1.0, 0.5), 0.0, 1.0);
        let positions = scan.preview(4);
        let azimuths: Vec<f32> = positions.iter().map(|p| p.azimuth).collect();
        assert_eq!(azimuths, vec![0.0, 0.5, 1.0, 0.0]);
        assert_eq!(scan.azimuth, 0.0);
    }
}
