use crate::capture::buffer::{PulseCaptureBuffer, PulseRecord};
use crate::engine_interface::StateSnapshot;
use crate::format::bytes::ByteSource;
use crate::format::header::{SessionHeader, SESSION_HEADER_BYTES};
use crate::format::schema::{decode_region, StateArchive, STATE_REGION_BYTES};
use crate::format::writer::state_file_bytes;
use crate::prelude::{CaptureError, CaptureResult, Sample};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct IqFile {
    pub header: SessionHeader,
    pub pulses: PulseCaptureBuffer,
}

#[derive(Debug, Clone)]
pub struct StateFile {
    pub header: SessionHeader,
    pub archive: StateArchive,
}

pub fn read_header(path: &Path) -> CaptureResult<SessionHeader> {
    let bytes = fs::read(path).map_err(|err| CaptureError::io(path, err))?;
    SessionHeader::decode(&bytes)
}

pub fn read_iq_file(path: &Path) -> CaptureResult<IqFile> {
    let bytes = fs::read(path).map_err(|err| CaptureError::io(path, err))?;
    let header = SessionHeader::decode(&bytes)?;
    let expected = header.iq_file_bytes()?;
    if bytes.len() as u64 != expected {
        return Err(CaptureError::SizeMismatch {
            path: path.to_path_buf(),
            expected,
            actual: bytes.len() as u64,
        });
    }

    let gates = header.range_gate_count();
    let mut pulses = PulseCaptureBuffer::allocate(header.pulse_count as usize, gates)?;
    let mut source = ByteSource::new(&bytes[SESSION_HEADER_BYTES..]);
    let mut block = vec![Sample::default(); gates];
    for index in 0..header.pulse_count as usize {
        let record = PulseRecord::new(source.f64()?, source.f32()?, source.f32()?);
        for sample in block.iter_mut() {
            let channels = [source.f32()?, source.f32()?, source.f32()?, source.f32()?];
            *sample = Sample::from_channels(channels);
        }
        pulses.append(index, record, &block)?;
    }
    Ok(IqFile { header, pulses })
}

pub fn read_state_file(path: &Path) -> CaptureResult<StateFile> {
    let bytes = fs::read(path).map_err(|err| CaptureError::io(path, err))?;
    let header = SessionHeader::decode(&bytes)?;
    let region_end = SESSION_HEADER_BYTES + STATE_REGION_BYTES;
    if bytes.len() < region_end {
        return Err(CaptureError::Format(format!(
            "state file is {} bytes, shorter than its fixed regions",
            bytes.len()
        )));
    }
    let (fields, count) = decode_region(&bytes[SESSION_HEADER_BYTES..region_end])?;
    let expected = state_file_bytes(count)?;
    if bytes.len() as u64 != expected {
        return Err(CaptureError::SizeMismatch {
            path: path.to_path_buf(),
            expected,
            actual: bytes.len() as u64,
        });
    }

    let mut source = ByteSource::new(&bytes[region_end..]);
    let mut snapshot = StateSnapshot::zeroed(count);
    for array in [
        &mut snapshot.position,
        &mut snapshot.velocity,
        &mut snapshot.orientation,
        &mut snapshot.tumble,
        &mut snapshot.auxiliary,
        &mut snapshot.cross_section,
        &mut snapshot.signal,
    ] {
        for entry in array.iter_mut() {
            for value in entry.iter_mut() {
                *value = source.f32()?;
            }
        }
    }
    for entry in snapshot.random_state.iter_mut() {
        for value in entry.iter_mut() {
            *value = source.u32()?;
        }
    }

    Ok(StateFile {
        header,
        archive: StateArchive { fields, snapshot },
    })
}
