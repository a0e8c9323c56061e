use anyhow::Context;
use radarsimcore::format::{read_header, read_iq_file, read_state_file, OutputKind, SessionHeader};
use radarsimcore::scan::{ScanMode, ScanState};
use serde::Serialize;
use std::path::Path;

/// Decoded summary of one output file.
#[derive(Debug, Serialize)]
pub struct Inspection {
    pub kind: &'static str,
    pub header: SessionHeader,
    pub pulses: Option<usize>,
    pub mean_power: Option<f32>,
    pub scatterers: Option<usize>,
    pub state_fields: Vec<String>,
}

fn kind_of(path: &Path) -> Option<OutputKind> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("iq") => Some(OutputKind::Iq),
        Some("simstate") => Some(OutputKind::State),
        _ => None,
    }
}

pub fn inspect_file(path: &Path) -> anyhow::Result<Inspection> {
    let display = path.display();
    match kind_of(path) {
        Some(OutputKind::Iq) => {
            let file = read_iq_file(path).with_context(|| format!("reading {}", display))?;
            Ok(Inspection {
                kind: OutputKind::Iq.extension(),
                pulses: Some(file.pulses.len()),
                mean_power: Some(file.pulses.mean_power()),
                scatterers: None,
                state_fields: Vec::new(),
                header: file.header,
            })
        }
        Some(OutputKind::State) => {
            let file = read_state_file(path).with_context(|| format!("reading {}", display))?;
            Ok(Inspection {
                kind: OutputKind::State.extension(),
                pulses: None,
                mean_power: None,
                scatterers: Some(file.archive.snapshot.len()),
                state_fields: file.archive.fields.iter().map(|f| f.name.clone()).collect(),
                header: file.header,
            })
        }
        None => {
            let header = read_header(path).with_context(|| format!("reading {}", display))?;
            Ok(Inspection {
                kind: "header",
                header,
                pulses: None,
                mean_power: None,
                scatterers: None,
                state_fields: Vec::new(),
            })
        }
    }
}

impl Inspection {
    pub fn render_text(&self) -> String {
        let h = &self.header;
        let mut lines = vec![
            format!("kind        : {}", self.kind),
            format!(
                "scan        : {} {} -- {} by {} deg",
                h.scan_mode.tag(),
                h.scan_start,
                h.scan_end,
                h.scan_delta
            ),
            format!("beam        : az {:.2} el {:.2} deg", h.azimuth_deg, h.elevation_deg),
            format!("seed        : {}", h.seed),
            format!("pulses      : {}", h.pulse_count),
            format!("range gates : {}", h.range_gate_count()),
            format!("prt         : {} s", h.params.prt),
            format!("lambda      : {} m", h.params.lambda),
            format!("population  : {:?}", h.body_population),
        ];
        if let Some(power) = self.mean_power {
            lines.push(format!("mean power  : {:.6e}", power));
        }
        if let Some(count) = self.scatterers {
            lines.push(format!("scatterers  : {}", count));
            lines.push(format!("state fields: {}", self.state_fields.join(", ")));
        }
        lines.join("\n")
    }
}

/// Scan geometry summary followed by one line per upcoming pulse.
pub fn preview_lines(scan: &ScanState, count: usize) -> Vec<String> {
    let mut header = format!("Scan mode: {}", scan.mode.tag());
    match scan.mode {
        ScanMode::Ppi => header.push_str(&format!(
            "   EL: {:+6.2} deg   AZ: {:+6.2} -- {:+6.2} deg    delta: {:+6.2} deg",
            scan.elevation, scan.start, scan.end, scan.delta
        )),
        ScanMode::Rhi => header.push_str(&format!(
            "   AZ: {:+6.2} deg   EL: {:+6.2} -- {:+6.2} deg    delta: {:+6.2} deg",
            scan.azimuth, scan.start, scan.end, scan.delta
        )),
        ScanMode::Stare => header.push_str(&format!(
            "   EL: {:+6.2} deg   AZ: {:+6.2} deg",
            scan.elevation, scan.azimuth
        )),
    }

    let mut lines = vec![header];
    lines.extend(scan.preview(count).iter().enumerate().map(|(k, beam)| {
        format!(
            "k = {:4}   el = {:6.2} deg   az = {:5.2} deg",
            k, beam.elevation, beam.azimuth
        )
    }));
    lines
}
