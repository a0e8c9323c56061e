//! Core capture pipeline for the radar scan simulator.
//!
//! The modules cover beam steering, pulse capture against a pluggable
//! scatterer engine, the fixed binary IQ/state formats, and the
//! master/worker aggregation that turns each node's capture into files.

pub mod capture;
pub mod distributed;
pub mod engine_interface;
pub mod format;
pub mod prelude;
pub mod scan;
pub mod telemetry;

pub use engine_interface::{EngineParams, SimulationEngine, StateSnapshot};
pub use prelude::{CaptureError, CaptureResult, Sample};
