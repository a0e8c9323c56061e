use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One range-gate sample: horizontal and vertical I/Q pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub h: Complex32,
    pub v: Complex32,
}

impl Sample {
    pub fn new(h: Complex32, v: Complex32) -> Self {
        Self { h, v }
    }

    pub fn from_channels(channels: [f32; 4]) -> Self {
        Self {
            h: Complex32::new(channels[0], channels[1]),
            v: Complex32::new(channels[2], channels[3]),
        }
    }

    /// The four channels in on-disk order `s0, s1, s2, s3`.
    pub fn channels(&self) -> [f32; 4] {
        [self.h.re, self.h.im, self.v.re, self.v.im]
    }

    pub fn power(&self) -> f32 {
        self.h.norm_sqr() + self.v.norm_sqr()
    }
}

/// Common error type for capture, serialization and aggregation.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("session header encodes to {actual} bytes, expected {expected}")]
    HeaderSizeMismatch { expected: usize, actual: usize },
    #[error("engine state needs {size} bytes but the state region holds {limit}")]
    StateTooLarge { size: usize, limit: usize },
    #[error("timing parameters yield no turbulence table frames")]
    NoTurbulenceFrames,
    #[error("contract violation: {0}")]
    ContractViolation(String),
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed file: {0}")]
    Format(String),
    #[error("{} holds {actual} bytes, expected {expected}", path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    #[error("link to node {rank} closed during the {payload} exchange")]
    PeerDisconnected { rank: usize, payload: &'static str },
    #[error("engine failure: {0}")]
    Engine(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl CaptureError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Io {
            path: path.into(),
            source,
        }
    }

    /// Conditions that must stop the process before any capture work.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::InvalidConfig(_)
                | CaptureError::HeaderSizeMismatch { .. }
                | CaptureError::StateTooLarge { .. }
                | CaptureError::NoTurbulenceFrames
        )
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;
