use crate::prelude::CaptureError;
use crate::scan::controller::ScanMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sweep specification in the `M:S:E:D` form (mode, start, end, delta).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    pub mode: ScanMode,
    pub start: f32,
    pub end: f32,
    pub delta: f32,
}

impl Default for SweepSpec {
    fn default() -> Self {
        Self {
            mode: ScanMode::Ppi,
            start: -12.0,
            end: 12.0,
            delta: 0.01,
        }
    }
}

impl FromStr for SweepSpec {
    type Err = CaptureError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = text.trim().split(':').collect();
        if parts.len() != 4 {
            return Err(CaptureError::InvalidConfig(format!(
                "sweep '{}' is not of the form M:S:E:D",
                text
            )));
        }
        let mode = match parts[0] {
            "P" | "p" => ScanMode::Ppi,
            "R" | "r" => ScanMode::Rhi,
            m if m.chars().count() == 1 => ScanMode::Stare,
            other => {
                return Err(CaptureError::InvalidConfig(format!(
                    "sweep mode '{}' is not a single letter",
                    other
                )))
            }
        };
        let number = |field: &str, name: &str| {
            field.trim().parse::<f32>().map_err(|_| {
                CaptureError::InvalidConfig(format!("sweep {} '{}' is not a number", name, field))
            })
        };
        Ok(Self {
            mode,
            start: number(parts[1], "start")?,
            end: number(parts[2], "end")?,
            delta: number(parts[3], "delta")?,
        })
    }
}

impl fmt::Display for SweepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.mode {
            ScanMode::Ppi => 'P',
            ScanMode::Rhi => 'R',
            ScanMode::Stare => 'S',
        };
        write!(f, "{}:{}:{}:{}", letter, self.start, self.end, self.delta)
    }
}
