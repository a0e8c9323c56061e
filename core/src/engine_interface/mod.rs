//! Narrow capability surface of the external scatterer engine.
//!
//! The capture loop only ever talks to the engine through [`SimulationEngine`],
//! so any engine (GPU backed, synthetic, or a test stub) is substitutable.

pub mod params;
pub mod snapshot;

pub use params::EngineParams;
pub use snapshot::StateSnapshot;

use crate::format::schema::StateField;
use crate::prelude::{CaptureResult, Sample};

/// Maximum number of body types recorded in a session header.
pub const MAX_BODY_TYPES: usize = 8;

pub trait SimulationEngine {
    fn params(&self) -> &EngineParams;
    /// Population per body type; index 0 is the background.
    fn body_population(&self) -> Vec<u32>;
    fn random_seed(&self) -> u32;
    fn sim_time(&self) -> f64;
    fn scatterer_count(&self) -> usize;

    /// Seconds of simulated flow covered by one turbulence table frame.
    fn turbulence_table_period(&self) -> f32;
    fn load_turbulence_frames(&mut self, frames: usize) -> CaptureResult<()>;

    fn set_prt(&mut self, prt: f32);
    fn advance_beam(&mut self, azimuth_deg: f32, elevation_deg: f32);
    fn generate_pulse(&mut self) -> CaptureResult<()>;
    fn advance_time(&mut self);
    /// Latest pulse, one sample per range gate.
    fn download_pulse(&mut self) -> &[Sample];

    /// Scalar engine state stored in the state-file region.
    fn state_fields(&self) -> Vec<StateField>;
    fn snapshot(&mut self) -> StateSnapshot;
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use crate::format::schema::FieldValue;

    /// Deterministic engine used by the unit tests.
    pub struct StubEngine {
        pub params: EngineParams,
        pub seed: u32,
        pub prt: f32,
        pub time: f64,
        pub beam: (f32, f32),
        pub pulse: Vec<Sample>,
        pub pulses_generated: usize,
        pub time_steps: usize,
        pub frames_loaded: usize,
        pub scatterers: usize,
        pub population: Vec<u32>,
    }

    impl StubEngine {
        pub fn new(range_count: u32, seed: u32) -> Self {
            let params = EngineParams {
                range_count,
                ..EngineParams::default()
            };
            Self {
                params,
                seed,
                prt: params.prt,
                time: 0.0,
                beam: (0.0, 0.0),
                pulse: vec![Sample::default(); range_count as usize],
                pulses_generated: 0,
                time_steps: 0,
                frames_loaded: 0,
                scatterers: 4,
                population: vec![4, 0],
            }
        }
    }

    impl SimulationEngine for StubEngine {
        fn params(&self) -> &EngineParams {
            &self.params
        }

        fn body_population(&self) -> Vec<u32> {
            self.population.clone()
        }

        fn random_seed(&self) -> u32 {
            self.seed
        }

        fn sim_time(&self) -> f64 {
            self.time
        }

        fn scatterer_count(&self) -> usize {
            self.scatterers
        }

        fn turbulence_table_period(&self) -> f32 {
            1.0
        }

        fn load_turbulence_frames(&mut self, frames: usize) -> CaptureResult<()> {
            self.frames_loaded = frames;
            Ok(())
        }

        fn set_prt(&mut self, prt: f32) {
            self.prt = prt;
        }

        fn advance_beam(&mut self, azimuth_deg: f32, elevation_deg: f32) {
            self.beam = (azimuth_deg, elevation_deg);
        }

        fn generate_pulse(&mut self) -> CaptureResult<()> {
            let (az, el) = self.beam;
            let index = self.pulses_generated as f32;
            for (gate, sample) in self.pulse.iter_mut().enumerate() {
                *sample = Sample::from_channels([index, gate as f32, az, el]);
            }
            self.pulses_generated += 1;
            Ok(())
        }

        fn advance_time(&mut self) {
            self.time += f64::from(self.prt);
            self.time_steps += 1;
        }

        fn download_pulse(&mut self) -> &[Sample] {
            &self.pulse
        }

        fn state_fields(&self) -> Vec<StateField> {
            vec![
                StateField::new("sim_time", FieldValue::F64(self.time)),
                StateField::new("pulses_generated", FieldValue::U64(self.pulses_generated as u64)),
            ]
        }

        fn snapshot(&mut self) -> StateSnapshot {
            let mut snapshot = StateSnapshot::zeroed(self.scatterers);
            for (index, position) in snapshot.position.iter_mut().enumerate() {
                *position = [index as f32, 1.0, 2.0, 0.0];
            }
            for (index, rng) in snapshot.random_state.iter_mut().enumerate() {
                *rng = [self.seed, index as u32, 7, 11];
            }
            snapshot
        }
    }
}
