pub mod controller;
pub mod sweep;

pub use controller::{BeamPosition, ScanEvent, ScanMode, ScanState};
pub use sweep::SweepSpec;
