use crate::engine_interface::params::PARAM_FLOAT_COUNT;
use crate::engine_interface::{EngineParams, SimulationEngine, MAX_BODY_TYPES};
use crate::format::bytes::{ByteSink, ByteSource};
use crate::prelude::{CaptureError, CaptureResult};
use crate::scan::{ScanMode, ScanState};
use serde::{Deserialize, Serialize};

/// Exact on-disk size of a [`SessionHeader`].
pub const SESSION_HEADER_BYTES: usize = 4096;
pub const HEADER_MAGIC: [u8; 4] = *b"RSIQ";
pub const FORMAT_VERSION: u32 = 1;
pub const SCAN_MODE_TAG_BYTES: usize = 16;
/// On-disk size of one pulse record: f64 time, f32 azimuth, f32 elevation.
pub const PULSE_RECORD_BYTES: usize = 16;
/// On-disk size of one range-gate sample: four f32 channels.
pub const SAMPLE_BYTES: usize = 16;

/// Self-describing session header written at the top of every output file.
///
/// Layout (little-endian), zero-padded to [`SESSION_HEADER_BYTES`]:
/// - `magic[4]`, `version: u32`
/// - engine parameters: 24 × `f32`, `range_count: u32`
/// - `body_population`: 8 × `u32`
/// - `scan_mode[16]`, NUL padded
/// - `scan_start`, `scan_end`, `scan_delta`: `f32`
/// - `seed: u32`, `pulse_count: u32`
/// - `azimuth_deg`, `elevation_deg`: `f32`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub params: EngineParams,
    pub body_population: [u32; MAX_BODY_TYPES],
    pub scan_mode: ScanMode,
    pub scan_start: f32,
    pub scan_end: f32,
    pub scan_delta: f32,
    pub seed: u32,
    pub pulse_count: u32,
    pub azimuth_deg: f32,
    pub elevation_deg: f32,
}

impl SessionHeader {
    /// Snapshots the engine parameters and population with the scan geometry.
    pub fn capture<E: SimulationEngine + ?Sized>(
        engine: &E,
        scan: &ScanState,
        pulse_count: usize,
    ) -> CaptureResult<Self> {
        let population = engine.body_population();
        if population.len() > MAX_BODY_TYPES {
            return Err(CaptureError::InvalidConfig(format!(
                "engine reports {} body types, header holds {}",
                population.len(),
                MAX_BODY_TYPES
            )));
        }
        let mut body_population = [0u32; MAX_BODY_TYPES];
        body_population[..population.len()].copy_from_slice(&population);

        let pulse_count = u32::try_from(pulse_count).map_err(|_| {
            CaptureError::InvalidConfig(format!("{} pulses do not fit the header", pulse_count))
        })?;

        Ok(Self {
            params: *engine.params(),
            body_population,
            scan_mode: scan.mode,
            scan_start: scan.start,
            scan_end: scan.end,
            scan_delta: scan.delta,
            seed: engine.random_seed(),
            pulse_count,
            azimuth_deg: scan.azimuth,
            elevation_deg: scan.elevation,
        })
    }

    pub fn range_gate_count(&self) -> usize {
        self.params.range_count as usize
    }

    /// Size of one pulse on disk: its record plus its sample block.
    pub fn pulse_stride_bytes(&self) -> u64 {
        PULSE_RECORD_BYTES as u64 + u64::from(self.params.range_count) * SAMPLE_BYTES as u64
    }

    /// Size of the IQ file this header describes; errors when it cannot be
    /// represented, as a corrupt header can claim.
    pub fn iq_file_bytes(&self) -> CaptureResult<u64> {
        u64::from(self.pulse_count)
            .checked_mul(self.pulse_stride_bytes())
            .and_then(|body| body.checked_add(SESSION_HEADER_BYTES as u64))
            .ok_or_else(|| {
                CaptureError::Format(format!(
                    "{} pulses of {} gates do not fit a file",
                    self.pulse_count, self.params.range_count
                ))
            })
    }

    pub fn encode(&self) -> CaptureResult<Vec<u8>> {
        let mut sink = ByteSink::with_capacity(SESSION_HEADER_BYTES);
        sink.put_bytes(&HEADER_MAGIC);
        sink.put_u32(FORMAT_VERSION);
        for (_, value) in self.params.named_values() {
            sink.put_f32(value);
        }
        sink.put_u32(self.params.range_count);
        for count in self.body_population {
            sink.put_u32(count);
        }
        let mut tag = [0u8; SCAN_MODE_TAG_BYTES];
        let mode = self.scan_mode.tag().as_bytes();
        tag[..mode.len()].copy_from_slice(mode);
        sink.put_bytes(&tag);
        sink.put_f32(self.scan_start);
        sink.put_f32(self.scan_end);
        sink.put_f32(self.scan_delta);
        sink.put_u32(self.seed);
        sink.put_u32(self.pulse_count);
        sink.put_f32(self.azimuth_deg);
        sink.put_f32(self.elevation_deg);
        sink.pad_to(SESSION_HEADER_BYTES);

        if sink.len() != SESSION_HEADER_BYTES {
            return Err(CaptureError::HeaderSizeMismatch {
                expected: SESSION_HEADER_BYTES,
                actual: sink.len(),
            });
        }
        Ok(sink.into_inner())
    }

    pub fn decode(bytes: &[u8]) -> CaptureResult<Self> {
        if bytes.len() < SESSION_HEADER_BYTES {
            return Err(CaptureError::Format(format!(
                "session header too short: expected {}, got {}",
                SESSION_HEADER_BYTES,
                bytes.len()
            )));
        }
        let mut source = ByteSource::new(&bytes[..SESSION_HEADER_BYTES]);
        if source.take(4)? != HEADER_MAGIC {
            return Err(CaptureError::Format("bad session header magic".into()));
        }
        let version = source.u32()?;
        if version != FORMAT_VERSION {
            return Err(CaptureError::Format(format!(
                "unsupported format version {}",
                version
            )));
        }

        let mut values = [0.0f32; PARAM_FLOAT_COUNT];
        for value in values.iter_mut() {
            *value = source.f32()?;
        }
        let params = EngineParams::from_values(values, source.u32()?);

        let mut body_population = [0u32; MAX_BODY_TYPES];
        for count in body_population.iter_mut() {
            *count = source.u32()?;
        }

        let tag = source.take(SCAN_MODE_TAG_BYTES)?;
        let tag_len = tag.iter().position(|b| *b == 0).unwrap_or(tag.len());
        let tag = std::str::from_utf8(&tag[..tag_len])
            .map_err(|_| CaptureError::Format("scan mode tag is not utf-8".into()))?;
        let scan_mode = ScanMode::from_tag(tag)
            .ok_or_else(|| CaptureError::Format(format!("unknown scan mode '{}'", tag)))?;

        Ok(Self {
            params,
            body_population,
            scan_mode,
            scan_start: source.f32()?,
            scan_end: source.f32()?,
            scan_delta: source.f32()?,
            seed: source.u32()?,
            pulse_count: source.u32()?,
            azimuth_deg: source.f32()?,
            elevation_deg: source.f32()?,
        })
    }
}

/// Startup check that the header layout still fits its fixed size.
pub fn verify_header_layout() -> CaptureResult<()> {
    let probe = SessionHeader {
        params: EngineParams::default(),
        body_population: [u32::MAX; MAX_BODY_TYPES],
        scan_mode: ScanMode::Stare,
        scan_start: 0.0,
        scan_end: 0.0,
        scan_delta: 0.0,
        seed: 0,
        pulse_count: 0,
        azimuth_deg: 0.0,
        elevation_deg: 0.0,
    };
    let encoded = probe.encode()?;
    if encoded.len() != SESSION_HEADER_BYTES {
        return Err(CaptureError::HeaderSizeMismatch {
            expected: SESSION_HEADER_BYTES,
            actual: encoded.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_interface::stub::StubEngine;
    use crate::scan::SweepSpec;

    fn sample_header() -> SessionHeader {
        let engine = StubEngine::new(32, 1234);
        let sweep: SweepSpec = "R:0.5:12:0.02".parse().unwrap();
        let scan = ScanState::new(sweep, 1.0, 0.0);
        SessionHeader::capture(&engine, &scan, 1200).unwrap()
    }

    #[test]
    fn header_round_trips_scan_fields_and_seed() {
        let header = sample_header();
        let bytes = header.encode().unwrap();
        assert_eq!(bytes.len(), SESSION_HEADER_BYTES);
        let decoded = SessionHeader::decode(&bytes).unwrap();
        assert_eq!(decoded.scan_mode.tag(), "RHI");
        assert_eq!(decoded.scan_start, 0.5);
        assert_eq!(decoded.scan_end, 12.0);
        assert_eq!(decoded.scan_delta, 0.02);
        assert_eq!(decoded.seed, 1234);
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_layout_is_fixed() {
        assert!(verify_header_layout().is_ok());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = sample_header().encode().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            SessionHeader::decode(&bytes),
            Err(CaptureError::Format(_))
        ));
    }

    #[test]
    fn too_many_body_types_is_rejected() {
        let mut engine = StubEngine::new(8, 1);
        engine.population = vec![1; MAX_BODY_TYPES + 1];
        let scan = ScanState::new(SweepSpec::default(), 0.0, 0.0);
        assert!(matches!(
            SessionHeader::capture(&engine, &scan, 1),
            Err(CaptureError::InvalidConfig(_))
        ));
    }

    #[test]
    fn iq_file_size_follows_pulse_stride() {
        let header = sample_header();
        assert_eq!(header.pulse_stride_bytes(), 16 + 32 * 16);
        assert_eq!(
            header.iq_file_bytes().unwrap(),
            SESSION_HEADER_BYTES as u64 + 1200 * (16 + 32 * 16)
        );
    }

    #[test]
    fn impossible_iq_size_is_an_error() {
        let mut header = sample_header();
        header.pulse_count = u32::MAX;
        header.params.range_count = u32::MAX;
        assert!(matches!(
            header.iq_file_bytes(),
            Err(CaptureError::Format(_))
        ));
    }
}
