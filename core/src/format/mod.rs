//! Binary IQ and state file formats.

pub mod bytes;
pub mod header;
pub mod reader;
pub mod schema;
pub mod writer;

pub use header::{verify_header_layout, SessionHeader, SESSION_HEADER_BYTES};
pub use reader::{read_header, read_iq_file, read_state_file, IqFile, StateFile};
pub use schema::{check_state_capacity, FieldValue, StateArchive, StateField};
pub use writer::{resolve_output_dir, FileWriter, OutputKind, WrittenFile};
