pub mod buffer;
pub mod progress;
pub mod session;

pub use buffer::{PulseCaptureBuffer, PulseRecord};
pub use progress::{ProgressEstimator, ProgressReport};
pub use session::{prepare_engine, run_capture, CaptureOutcome, CaptureProgress, CaptureSettings};
