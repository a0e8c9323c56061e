use serde::{Deserialize, Serialize};

/// Number of `f32` fields in the parameter block, before `range_count`.
pub const PARAM_FLOAT_COUNT: usize = 24;

/// Radar and domain parameters snapshotted from the engine into every header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    pub c: f32,
    pub prt: f32,
    pub loss: f32,
    pub lambda: f32,
    pub tx_power_watt: f32,
    pub antenna_gain_dbi: f32,
    pub antenna_bw_deg: f32,
    pub tau: f32,
    pub range_start: f32,
    pub range_end: f32,
    pub range_delta: f32,
    pub azimuth_start_deg: f32,
    pub azimuth_end_deg: f32,
    pub azimuth_delta_deg: f32,
    pub elevation_start_deg: f32,
    pub elevation_end_deg: f32,
    pub elevation_delta_deg: f32,
    pub domain_pad_factor: f32,
    pub body_per_cell: f32,
    pub prf: f32,
    pub va: f32,
    pub fn_hz: f32,
    pub antenna_bw_rad: f32,
    pub dr: f32,
    pub range_count: u32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            c: 2.99792458e8,
            prt: 1.0e-3,
            loss: 1.0,
            lambda: 0.1,
            tx_power_watt: 50.0e3,
            antenna_gain_dbi: 44.5,
            antenna_bw_deg: 1.0,
            tau: 0.2e-6,
            range_start: 1500.0,
            range_end: 2500.0,
            range_delta: 15.0,
            azimuth_start_deg: -12.0,
            azimuth_end_deg: 12.0,
            azimuth_delta_deg: 1.0,
            elevation_start_deg: 0.0,
            elevation_end_deg: 12.0,
            elevation_delta_deg: 1.0,
            domain_pad_factor: 1.2,
            body_per_cell: 50.0,
            prf: 0.0,
            va: 0.0,
            fn_hz: 0.0,
            antenna_bw_rad: 0.0,
            dr: 0.0,
            range_count: 0,
        }
        .with_derived()
    }
}

impl EngineParams {
    /// Recomputes the derived fields from the primary ones.
    pub fn with_derived(mut self) -> Self {
        self.prf = if self.prt > 0.0 { 1.0 / self.prt } else { 0.0 };
        self.fn_hz = 0.5 * self.prf;
        self.va = 0.25 * self.lambda * self.prf;
        self.antenna_bw_rad = self.antenna_bw_deg.to_radians();
        self.dr = 0.5 * self.c * self.tau;
        self.range_count = if self.range_delta > 0.0 && self.range_end > self.range_start {
            ((self.range_end - self.range_start) / self.range_delta).ceil() as u32
        } else {
            0
        };
        self
    }

    /// The float fields in their fixed on-disk order.
    pub fn named_values(&self) -> [(&'static str, f32); PARAM_FLOAT_COUNT] {
        [
            ("c", self.c),
            ("prt", self.prt),
            ("loss", self.loss),
            ("lambda", self.lambda),
            ("tx_power_watt", self.tx_power_watt),
            ("antenna_gain_dbi", self.antenna_gain_dbi),
            ("antenna_bw_deg", self.antenna_bw_deg),
            ("tau", self.tau),
            ("range_start", self.range_start),
            ("range_end", self.range_end),
            ("range_delta", self.range_delta),
            ("azimuth_start_deg", self.azimuth_start_deg),
            ("azimuth_end_deg", self.azimuth_end_deg),
            ("azimuth_delta_deg", self.azimuth_delta_deg),
            ("elevation_start_deg", self.elevation_start_deg),
            ("elevation_end_deg", self.elevation_end_deg),
            ("elevation_delta_deg", self.elevation_delta_deg),
            ("domain_pad_factor", self.domain_pad_factor),
            ("body_per_cell", self.body_per_cell),
            ("prf", self.prf),
            ("va", self.va),
            ("fn_hz", self.fn_hz),
            ("antenna_bw_rad", self.antenna_bw_rad),
            ("dr", self.dr),
        ]
    }

    pub fn from_values(values: [f32; PARAM_FLOAT_COUNT], range_count: u32) -> Self {
        Self {
            c: values[0],
            prt: values[1],
            loss: values[2],
            lambda: values[3],
            tx_power_watt: values[4],
            antenna_gain_dbi: values[5],
            antenna_bw_deg: values[6],
            tau: values[7],
            range_start: values[8],
            range_end: values[9],
            range_delta: values[10],
            azimuth_start_deg: values[11],
            azimuth_end_deg: values[12],
            azimuth_delta_deg: values[13],
            elevation_start_deg: values[14],
            elevation_end_deg: values[15],
            elevation_delta_deg: values[16],
            domain_pad_factor: values[17],
            body_per_cell: values[18],
            prf: values[19],
            va: values[20],
            fn_hz: values[21],
            antenna_bw_rad: values[22],
            dr: values[23],
            range_count,
        }
    }
}
