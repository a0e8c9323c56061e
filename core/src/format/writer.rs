use crate::capture::buffer::PulseCaptureBuffer;
use crate::format::header::{SessionHeader, SESSION_HEADER_BYTES};
use crate::format::schema::{StateArchive, STATE_REGION_BYTES};
use crate::prelude::{CaptureError, CaptureResult};
use crate::scan::ScanMode;
use crate::telemetry::LogManager;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Attempts at finding a free file name before giving up.
const MAX_NAME_ATTEMPTS: u32 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Iq,
    State,
}

impl OutputKind {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::Iq => "iq",
            OutputKind::State => "simstate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub kind: OutputKind,
}

/// Default output directory (`$HOME/Downloads`) or the requested one without
/// trailing separators.
pub fn resolve_output_dir(requested: Option<&str>) -> CaptureResult<PathBuf> {
    match requested.map(str::trim).filter(|dir| !dir.is_empty()) {
        Some(dir) => {
            let stripped = dir.trim_end_matches(|c: char| c == '/' || c == '\\');
            if stripped.is_empty() {
                Ok(PathBuf::from(&dir[..1]))
            } else {
                Ok(PathBuf::from(stripped))
            }
        }
        None => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join("Downloads"))
            .ok_or_else(|| {
                CaptureError::InvalidConfig("HOME is not set and no output directory given".into())
            }),
    }
}

/// `sim-<YYYYMMDD-HHMMSS>-<M><value>.<ext>`.
pub fn file_name(stamp: NaiveDateTime, header: &SessionHeader, kind: OutputKind) -> String {
    let (letter, value) = match header.scan_mode {
        ScanMode::Ppi => ('E', header.elevation_deg),
        ScanMode::Rhi => ('A', header.azimuth_deg),
        ScanMode::Stare => ('S', header.pulse_count as f32),
    };
    format!(
        "sim-{}-{}{:04.1}.{}",
        stamp.format("%Y%m%d-%H%M%S"),
        letter,
        value,
        kind.extension()
    )
}

/// Serializes session output into the output directory.
#[derive(Debug, Clone)]
pub struct FileWriter {
    output_dir: PathBuf,
    logger: LogManager,
}

impl FileWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            logger: LogManager::new(),
        }
    }

    pub fn with_logger(mut self, logger: LogManager) -> Self {
        self.logger = logger;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Header followed by one record and sample block per pulse.
    pub fn write_iq(
        &self,
        header: &SessionHeader,
        buffer: &PulseCaptureBuffer,
    ) -> CaptureResult<WrittenFile> {
        if !buffer.is_full() || buffer.capacity() != header.pulse_count as usize {
            return Err(CaptureError::ContractViolation(format!(
                "pulse buffer holds {} of {} pulses, header expects {}",
                buffer.len(),
                buffer.capacity(),
                header.pulse_count
            )));
        }
        if buffer.range_gate_count() != header.range_gate_count() {
            return Err(CaptureError::ContractViolation(format!(
                "pulse buffer has {} gates, header expects {}",
                buffer.range_gate_count(),
                header.range_gate_count()
            )));
        }

        let header_bytes = header.encode()?;
        let expected = header.iq_file_bytes()?;
        self.write_file(header, OutputKind::Iq, expected, |out| {
            out.write_all(&header_bytes)?;
            let samples = buffer.samples();
            for (record, row) in buffer.records().iter().zip(samples.rows()) {
                out.write_all(&record.timestamp.to_le_bytes())?;
                out.write_all(&record.azimuth_deg.to_le_bytes())?;
                out.write_all(&record.elevation_deg.to_le_bytes())?;
                for sample in row.iter() {
                    for channel in sample.channels() {
                        out.write_all(&channel.to_le_bytes())?;
                    }
                }
            }
            Ok(())
        })
    }

    /// Header, tagged state region, then the snapshot arrays in fixed order.
    pub fn write_state(
        &self,
        header: &SessionHeader,
        archive: &StateArchive,
    ) -> CaptureResult<WrittenFile> {
        archive.snapshot.validate()?;
        let header_bytes = header.encode()?;
        let region = archive.encoded_region()?;
        let expected = state_file_bytes(archive.snapshot.len())?;

        self.write_file(header, OutputKind::State, expected, |out| {
            out.write_all(&header_bytes)?;
            out.write_all(&region)?;
            for (_, array) in archive.snapshot.float_arrays() {
                for entry in array {
                    for value in entry {
                        out.write_all(&value.to_le_bytes())?;
                    }
                }
            }
            for entry in &archive.snapshot.random_state {
                for value in entry {
                    out.write_all(&value.to_le_bytes())?;
                }
            }
            Ok(())
        })
    }

    fn write_file<F>(
        &self,
        header: &SessionHeader,
        kind: OutputKind,
        expected: u64,
        body: F,
    ) -> CaptureResult<WrittenFile>
    where
        F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
    {
        fs::create_dir_all(&self.output_dir)
            .map_err(|err| CaptureError::io(&self.output_dir, err))?;
        let (path, file) = self.create_unique(header, kind, Local::now().naive_local())?;
        self.logger
            .record(&format!("Output file : {}", path.display()));

        let bytes = match fill(file, &path, expected, body) {
            Ok(bytes) => bytes,
            Err(err) => {
                // A partial file must not outlive the failure under a valid name.
                if let Err(cleanup) = fs::remove_file(&path) {
                    self.logger.caution(&format!(
                        "could not remove incomplete {}: {}",
                        path.display(),
                        cleanup
                    ));
                }
                return Err(err);
            }
        };
        self.logger.record(&format!(
            "{} file with {} B.",
            match kind {
                OutputKind::Iq => "Data",
                OutputKind::State => "State",
            },
            bytes
        ));
        Ok(WrittenFile { path, bytes, kind })
    }

    /// Opens a fresh file, stepping the timestamp forward while names collide.
    fn create_unique(
        &self,
        header: &SessionHeader,
        kind: OutputKind,
        mut stamp: NaiveDateTime,
    ) -> CaptureResult<(PathBuf, File)> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.output_dir.join(file_name(stamp, header, kind));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    stamp += ChronoDuration::seconds(1);
                }
                Err(err) => return Err(CaptureError::io(path, err)),
            }
        }
        Err(CaptureError::io(
            &self.output_dir,
            std::io::Error::new(ErrorKind::AlreadyExists, "no free output file name"),
        ))
    }
}

/// Writes the body through a buffer, syncs it and checks the final size.
fn fill<F>(file: File, path: &Path, expected: u64, body: F) -> CaptureResult<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let mut out = BufWriter::new(file);
    body(&mut out).map_err(|err| CaptureError::io(path, err))?;
    let file = out
        .into_inner()
        .map_err(|err| CaptureError::io(path, err.into_error()))?;
    file.sync_all().map_err(|err| CaptureError::io(path, err))?;
    let bytes = file
        .metadata()
        .map_err(|err| CaptureError::io(path, err))?
        .len();
    if bytes != expected {
        return Err(CaptureError::SizeMismatch {
            path: path.to_path_buf(),
            expected,
            actual: bytes,
        });
    }
    Ok(bytes)
}

/// Bytes each scatterer occupies after the state region.
pub const STATE_BYTES_PER_SCATTERER: u64 = 7 * 16 + 16;

/// Size of a state file for `scatterers` bodies.
pub fn state_file_bytes(scatterers: usize) -> CaptureResult<u64> {
    u64::try_from(scatterers)
        .ok()
        .and_then(|count| count.checked_mul(STATE_BYTES_PER_SCATTERER))
        .and_then(|body| body.checked_add((SESSION_HEADER_BYTES + STATE_REGION_BYTES) as u64))
        .ok_or_else(|| {
            CaptureError::Format(format!("{} scatterers do not fit a state file", scatterers))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::buffer::PulseRecord;
    use crate::engine_interface::stub::StubEngine;
    use crate::format::header::{PULSE_RECORD_BYTES, SAMPLE_BYTES};
    use crate::prelude::Sample;
    use crate::scan::{ScanState, SweepSpec};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn header_for(sweep: &str, pulses: usize, gates: u32) -> SessionHeader {
        let engine = StubEngine::new(gates, 9);
        let scan = ScanState::new(sweep.parse::<SweepSpec>().unwrap(), 1.0, 3.0);
        SessionHeader::capture(&engine, &scan, pulses).unwrap()
    }

    fn filled_buffer(pulses: usize, gates: usize) -> PulseCaptureBuffer {
        let mut buffer = PulseCaptureBuffer::allocate(pulses, gates).unwrap();
        for index in 0..pulses {
            let block = vec![Sample::from_channels([1.0, 2.0, 3.0, 4.0]); gates];
            buffer
                .append(index, PulseRecord::new(index as f64 * 1e-3, 0.0, 3.0), &block)
                .unwrap();
        }
        buffer
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 2, 29)
            .and_then(|d| d.and_hms_opt(14, 39, 41))
            .unwrap()
    }

    #[test]
    fn names_encode_mode_and_fixed_value() {
        let ppi = header_for("P:-12:12:0.01", 10, 4);
        assert_eq!(file_name(stamp(), &ppi, OutputKind::Iq), "sim-20160229-143941-E03.0.iq");
        let rhi = header_for("R:0:12:0.01", 10, 4);
        assert_eq!(
            file_name(stamp(), &rhi, OutputKind::State),
            "sim-20160229-143941-A01.0.simstate"
        );
        let stare = header_for("S:0:0:0", 250, 4);
        assert_eq!(file_name(stamp(), &stare, OutputKind::Iq), "sim-20160229-143941-S250.0.iq");
    }

    #[test]
    fn output_dir_strips_trailing_separators() {
        assert_eq!(resolve_output_dir(Some("/data/out/")).unwrap(), PathBuf::from("/data/out"));
        assert_eq!(resolve_output_dir(Some("runs\\")).unwrap(), PathBuf::from("runs"));
        assert_eq!(resolve_output_dir(Some("/")).unwrap(), PathBuf::from("/"));
    }

    #[test]
    fn iq_file_size_matches_layout() {
        let dir = tempdir().unwrap();
        let header = header_for("P:-12:12:0.01", 5, 8);
        let buffer = filled_buffer(5, 8);
        let written = FileWriter::new(dir.path()).write_iq(&header, &buffer).unwrap();
        let expected = SESSION_HEADER_BYTES + 5 * (PULSE_RECORD_BYTES + 8 * SAMPLE_BYTES);
        assert_eq!(written.bytes, expected as u64);
        assert_eq!(fs::metadata(&written.path).unwrap().len(), expected as u64);
        assert_eq!(written.kind, OutputKind::Iq);
    }

    #[test]
    fn partially_filled_buffer_is_not_written() {
        let dir = tempdir().unwrap();
        let header = header_for("P:-12:12:0.01", 3, 2);
        let mut buffer = PulseCaptureBuffer::allocate(3, 2).unwrap();
        buffer
            .append(0, PulseRecord::default(), &[Sample::default(); 2])
            .unwrap();
        assert!(matches!(
            FileWriter::new(dir.path()).write_iq(&header, &buffer),
            Err(CaptureError::ContractViolation(_))
        ));
    }

    #[test]
    fn colliding_names_step_the_timestamp() {
        let dir = tempdir().unwrap();
        let writer = FileWriter::new(dir.path());
        let header = header_for("P:-12:12:0.01", 2, 2);
        let (first, _) = writer.create_unique(&header, OutputKind::Iq, stamp()).unwrap();
        let (second, _) = writer.create_unique(&header, OutputKind::Iq, stamp()).unwrap();
        assert_ne!(first, second);
        assert!(second.ends_with("sim-20160229-143942-E03.0.iq"));
    }

    #[test]
    fn state_file_size_matches_layout() {
        let dir = tempdir().unwrap();
        let mut engine = StubEngine::new(4, 5);
        let header = header_for("P:-12:12:0.01", 1, 4);
        let archive = StateArchive::capture(&mut engine).unwrap();
        let written = FileWriter::new(dir.path()).write_state(&header, &archive).unwrap();
        assert_eq!(written.bytes, state_file_bytes(4).unwrap());
        assert_eq!(written.kind, OutputKind::State);
    }

    #[test]
    fn unwritable_directory_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();
        let header = header_for("P:-12:12:0.01", 1, 1);
        let buffer = filled_buffer(1, 1);
        let err = FileWriter::new(&blocker).write_iq(&header, &buffer).unwrap_err();
        assert!(matches!(err, CaptureError::Io { .. }));
    }

    #[test]
    fn failed_body_leaves_no_file_behind() {
        let dir = tempdir().unwrap();
        let writer = FileWriter::new(dir.path());
        let header = header_for("P:-12:12:0.01", 1, 1);

        let err = writer
            .write_file(&header, OutputKind::Iq, 64, |out| {
                out.write_all(b"partial")?;
                Err(std::io::Error::new(ErrorKind::Other, "device gone"))
            })
            .unwrap_err();
        assert!(matches!(err, CaptureError::Io { .. }));

        let err = writer
            .write_file(&header, OutputKind::State, 64, |out| out.write_all(b"short"))
            .unwrap_err();
        assert!(matches!(err, CaptureError::SizeMismatch { actual: 5, .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
