use num_complex::Complex32;
use radarsimcore::engine_interface::{
    EngineParams, SimulationEngine, StateSnapshot, MAX_BODY_TYPES,
};
use radarsimcore::format::{FieldValue, StateField};
use radarsimcore::prelude::{CaptureError, CaptureResult, Sample};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Seconds of flow represented by one turbulence frame.
pub const TURBULENCE_TABLE_PERIOD: f32 = 1.0;
/// Frames kept in memory; later frames reuse the table cyclically.
pub const MAX_TURBULENCE_FRAMES: usize = 512;

const MEAN_WIND: [f32; 3] = [6.0, -2.0, 0.0];
const GUST_SPREAD: f32 = 3.0;
const DEBRIS_SPEED: f32 = 8.0;
const BACKGROUND_RCS: f32 = 1.0e-3;
const DEBRIS_RCS: f32 = 5.0e-2;

/// Knobs of the synthetic scatterer field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub seed: Option<u32>,
    /// Debris count per body type, starting at body type 1.
    pub debris: Vec<u32>,
    /// Background bodies per range cell.
    pub density: Option<f32>,
    pub lambda: Option<f32>,
    pub pulse_width: Option<f32>,
}

impl SyntheticConfig {
    pub fn params(&self) -> EngineParams {
        let mut params = EngineParams::default();
        if let Some(density) = self.density {
            params.body_per_cell = density;
        }
        if let Some(lambda) = self.lambda {
            params.lambda = lambda;
        }
        if let Some(tau) = self.pulse_width {
            params.tau = tau;
        }
        params.with_derived()
    }
}

#[derive(Debug, Clone)]
struct Scatterer {
    body_type: u32,
    position: [f32; 3],
    velocity: [f32; 3],
    /// Yaw, pitch, roll in radians.
    orientation: [f32; 3],
    tumble: [f32; 3],
    cross_section: Sample,
    signal: Sample,
    rng: [u32; 4],
}

impl Scatterer {
    fn range(&self) -> f32 {
        let [x, y, z] = self.position;
        (x * x + y * y + z * z).sqrt()
    }

    /// Azimuth and elevation in degrees, azimuth measured from +y.
    fn angles(&self) -> (f32, f32) {
        let [x, y, z] = self.position;
        let ground = (x * x + y * y).sqrt();
        (x.atan2(y).to_degrees(), z.atan2(ground).to_degrees())
    }
}

/// CPU scatterer field standing in for the accelerated engine.
pub struct SyntheticEngine {
    params: EngineParams,
    seed: u32,
    rng: StdRng,
    population: Vec<u32>,
    scatterers: Vec<Scatterer>,
    winds: Vec<[f32; 3]>,
    time: f64,
    beam: (f32, f32),
    pulse: Vec<Sample>,
}

impl SyntheticEngine {
    pub fn new(config: &SyntheticConfig) -> CaptureResult<Self> {
        let params = config.params();
        if params.range_count == 0 {
            return Err(CaptureError::InvalidConfig(
                "range window yields no range gates".into(),
            ));
        }
        if config.debris.len() >= MAX_BODY_TYPES {
            return Err(CaptureError::InvalidConfig(format!(
                "{} debris types given, at most {} are supported",
                config.debris.len(),
                MAX_BODY_TYPES - 1
            )));
        }
        if !(params.body_per_cell >= 0.0) {
            return Err(CaptureError::InvalidConfig(format!(
                "density {} must not be negative",
                params.body_per_cell
            )));
        }

        let seed = config.seed.unwrap_or_else(rand::random);
        let background = (params.body_per_cell * params.range_count as f32).round() as u32;
        let mut population = Vec::with_capacity(config.debris.len() + 1);
        population.push(background);
        population.extend(config.debris.iter().copied());
        if population
            .iter()
            .try_fold(0u32, |total, &count| total.checked_add(count))
            .is_none()
        {
            return Err(CaptureError::InvalidConfig(format!(
                "body population {:?} exceeds {} scatterers",
                population,
                u32::MAX
            )));
        }

        let mut engine = Self {
            params,
            seed,
            rng: StdRng::seed_from_u64(u64::from(seed)),
            population,
            scatterers: Vec::new(),
            winds: Vec::new(),
            time: 0.0,
            beam: (0.0, 0.0),
            pulse: vec![Sample::default(); params.range_count as usize],
        };
        engine.populate();
        Ok(engine)
    }

    fn populate(&mut self) {
        let population = self.population.clone();
        let total: u32 = population.iter().sum();
        let mut scatterers = Vec::with_capacity(total as usize);
        for (body_type, &count) in population.iter().enumerate() {
            for _ in 0..count {
                scatterers.push(self.spawn(body_type as u32));
            }
        }
        self.scatterers = scatterers;
    }

    fn spawn(&mut self, body_type: u32) -> Scatterer {
        let p = &self.params;
        let r = self.rng.gen_range(p.range_start..p.range_end);
        let az = self
            .rng
            .gen_range(p.azimuth_start_deg..=p.azimuth_end_deg)
            .to_radians();
        let el = self
            .rng
            .gen_range(p.elevation_start_deg..=p.elevation_end_deg)
            .to_radians();
        let position = [r * el.cos() * az.sin(), r * el.cos() * az.cos(), r * el.sin()];

        let (velocity, tumble, cross_section) = if body_type == 0 {
            let amplitude = BACKGROUND_RCS;
            (
                MEAN_WIND,
                [0.0; 3],
                Sample::new(Complex32::new(amplitude, 0.0), Complex32::new(amplitude, 0.0)),
            )
        } else {
            let mut v = || self.rng.gen_range(-DEBRIS_SPEED..DEBRIS_SPEED);
            let velocity = [v(), v(), 0.25 * v()];
            let tumble = [
                self.rng.gen_range(-PI..PI),
                self.rng.gen_range(-PI..PI),
                self.rng.gen_range(-PI..PI),
            ];
            let amplitude = DEBRIS_RCS * body_type as f32;
            let h = Complex32::from_polar(amplitude, self.rng.gen_range(-PI..PI));
            let v = Complex32::from_polar(0.5 * amplitude, self.rng.gen_range(-PI..PI));
            (velocity, tumble, Sample::new(h, v))
        };

        Scatterer {
            body_type,
            position,
            velocity,
            orientation: [0.0; 3],
            tumble,
            cross_section,
            signal: Sample::default(),
            rng: self.rng.gen::<[u32; 4]>(),
        }
    }

    fn current_wind(&self) -> [f32; 3] {
        if self.winds.is_empty() {
            return MEAN_WIND;
        }
        let frame = (self.time / f64::from(TURBULENCE_TABLE_PERIOD)) as usize;
        self.winds[frame % self.winds.len()]
    }

    /// Two-way Gaussian beam pattern.
    fn beam_gain(&self, azimuth: f32, elevation: f32) -> f32 {
        let bw = self.params.antenna_bw_deg;
        let mut d_az = azimuth - self.beam.0;
        if d_az > 180.0 {
            d_az -= 360.0;
        } else if d_az < -180.0 {
            d_az += 360.0;
        }
        let d_el = elevation - self.beam.1;
        let spread = (d_az / bw).powi(2) + (d_el / bw).powi(2);
        (-4.0 * std::f32::consts::LN_2 * spread).exp()
    }
}

fn xorshift128(state: &mut [u32; 4]) -> u32 {
    let mut t = state[3];
    let s = state[0];
    state[3] = state[2];
    state[2] = state[1];
    state[1] = s;
    t ^= t << 11;
    t ^= t >> 8;
    state[0] = t ^ s ^ (s >> 19);
    state[0]
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

impl SimulationEngine for SyntheticEngine {
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
        self.scatterers.len()
    }

    fn turbulence_table_period(&self) -> f32 {
        TURBULENCE_TABLE_PERIOD
    }

    fn load_turbulence_frames(&mut self, frames: usize) -> CaptureResult<()> {
        if frames == 0 {
            return Err(CaptureError::NoTurbulenceFrames);
        }
        let loaded = frames.min(MAX_TURBULENCE_FRAMES);
        self.winds = (0..loaded)
            .map(|_| {
                let mut gust = || self.rng.gen_range(-GUST_SPREAD..GUST_SPREAD);
                [MEAN_WIND[0] + gust(), MEAN_WIND[1] + gust(), 0.1 * gust()]
            })
            .collect();
        log::debug!("loaded {} of {} turbulence frames", loaded, frames);
        Ok(())
    }

    fn set_prt(&mut self, prt: f32) {
        self.params.prt = prt;
        self.params = self.params.with_derived();
    }

    fn advance_beam(&mut self, azimuth_deg: f32, elevation_deg: f32) {
        self.beam = (azimuth_deg, elevation_deg);
    }

    fn generate_pulse(&mut self) -> CaptureResult<()> {
        let p = self.params;
        if !(p.lambda > 0.0) {
            return Err(CaptureError::Engine(format!(
                "wavelength {} must be positive",
                p.lambda
            )));
        }
        for sample in self.pulse.iter_mut() {
            *sample = Sample::default();
        }

        let wavenumber = 4.0 * PI / p.lambda;
        for index in 0..self.scatterers.len() {
            let (range, (az, el)) = {
                let s = &self.scatterers[index];
                (s.range(), s.angles())
            };
            let gain = self.beam_gain(az, el);
            let gate = ((range - p.range_start) / p.range_delta).floor();
            let scatterer = &mut self.scatterers[index];
            if gain < 1.0e-6 || gate < 0.0 || gate as usize >= self.pulse.len() {
                scatterer.signal = Sample::default();
                continue;
            }

            let spreading = (p.range_start / range).powi(2);
            let roll = scatterer.orientation[2];
            let phasor = Complex32::from_polar(gain * spreading, -wavenumber * range);
            let signal = Sample::new(
                scatterer.cross_section.h * phasor * roll.cos().abs().max(0.1),
                scatterer.cross_section.v * phasor * roll.sin().abs().max(0.1),
            );
            scatterer.signal = signal;
            let sample = &mut self.pulse[gate as usize];
            sample.h += signal.h;
            sample.v += signal.v;
        }
        Ok(())
    }

    fn advance_time(&mut self) {
        let dt = self.params.prt;
        let wind = self.current_wind();
        let (near, far) = (self.params.range_start, self.params.range_end);
        for s in self.scatterers.iter_mut() {
            if s.body_type == 0 {
                s.velocity = wind;
            } else {
                let jitter = xorshift128(&mut s.rng) as f32 / u32::MAX as f32 - 0.5;
                for (angle, rate) in s.orientation.iter_mut().zip(s.tumble.iter()) {
                    *angle = wrap_angle(*angle + (rate + 0.1 * jitter) * dt);
                }
            }
            for (x, v) in s.position.iter_mut().zip(s.velocity.iter()) {
                *x += v * dt;
            }

            // Bodies leaving the range window re-enter from the other side.
            let r = s.range();
            let target = if r > far {
                near + (r - far)
            } else if r < near {
                far - (near - r)
            } else {
                continue;
            };
            let scale = target / r.max(f32::EPSILON);
            for x in s.position.iter_mut() {
                *x *= scale;
            }
        }
        self.time += f64::from(dt);
    }

    fn download_pulse(&mut self) -> &[Sample] {
        &self.pulse
    }

    fn state_fields(&self) -> Vec<StateField> {
        let wind = self.current_wind();
        vec![
            StateField::new("engine", FieldValue::Text("synthetic".into())),
            StateField::new("turbulence_frames", FieldValue::U32(self.winds.len() as u32)),
            StateField::new(
                "turbulence_table_period",
                FieldValue::F32(TURBULENCE_TABLE_PERIOD),
            ),
            StateField::new(
                "beam",
                FieldValue::F32Array(vec![self.beam.0, self.beam.1]),
            ),
            StateField::new("wind", FieldValue::F32Array(wind.to_vec())),
        ]
    }

    fn snapshot(&mut self) -> StateSnapshot {
        let mut snapshot = StateSnapshot::zeroed(self.scatterers.len());
        for (i, s) in self.scatterers.iter().enumerate() {
            let [x, y, z] = s.position;
            let (az, el) = s.angles();
            snapshot.position[i] = [x, y, z, s.body_type as f32];
            snapshot.velocity[i] = [s.velocity[0], s.velocity[1], s.velocity[2], 0.0];
            snapshot.orientation[i] = [s.orientation[0], s.orientation[1], s.orientation[2], 0.0];
            snapshot.tumble[i] = [s.tumble[0], s.tumble[1], s.tumble[2], 0.0];
            snapshot.auxiliary[i] = [s.range(), az, el, 0.0];
            snapshot.cross_section[i] = s.cross_section.channels();
            snapshot.signal[i] = s.signal.channels();
            snapshot.random_state[i] = s.rng;
        }
        snapshot
    }
}
