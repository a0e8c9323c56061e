use crate::capture::buffer::PulseCaptureBuffer;
use crate::format::header::SessionHeader;
use crate::format::schema::StateArchive;
use crate::format::writer::{FileWriter, OutputKind, WrittenFile};
use crate::prelude::CaptureError;
use tokio::sync::oneshot;

/// Pulse payload; `None` when the session does not emit an IQ file.
#[derive(Debug)]
pub struct PulseMessage(pub Option<PulseCaptureBuffer>);

/// State payload; `None` when the session does not emit a state file.
#[derive(Debug)]
pub struct StateMessage(pub Option<StateArchive>);

/// A payload paired with the receipt the master fires once it has taken it.
#[derive(Debug)]
pub struct Delivery<T> {
    pub payload: T,
    pub receipt: oneshot::Sender<()>,
}

impl<T> Delivery<T> {
    pub fn new(payload: T) -> (Self, oneshot::Receiver<()>) {
        let (receipt, acked) = oneshot::channel();
        (Self { payload, receipt }, acked)
    }

    /// Acknowledges receipt and yields the payload.
    pub fn accept(self) -> T {
        // The sender may have given up waiting; the payload is still ours.
        let _ = self.receipt.send(());
        self.payload
    }
}

/// Everything one node produces for persistence.
#[derive(Debug)]
pub struct NodeOutput {
    pub rank: usize,
    pub header: SessionHeader,
    pub pulses: Option<PulseCaptureBuffer>,
    pub state: Option<StateArchive>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFile {
    pub rank: usize,
    pub file: WrittenFile,
}

#[derive(Debug)]
pub struct WriteFailure {
    pub rank: usize,
    pub kind: OutputKind,
    pub error: CaptureError,
}

/// Files materialized by the master, in write order.
#[derive(Debug, Default)]
pub struct AggregationReport {
    pub written: Vec<NodeFile>,
    pub failures: Vec<WriteFailure>,
}

impl AggregationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn absorb(&mut self, other: AggregationReport) {
        self.written.extend(other.written);
        self.failures.extend(other.failures);
    }
}

/// Writes the IQ file then the state file of one node. A failed file is
/// recorded and does not prevent the other from being written.
pub fn write_node_output(writer: &FileWriter, output: &NodeOutput) -> AggregationReport {
    let mut report = AggregationReport::default();
    let mut settle = |kind: OutputKind, result: Result<WrittenFile, CaptureError>| match result {
        Ok(file) => report.written.push(NodeFile {
            rank: output.rank,
            file,
        }),
        Err(error) => report.failures.push(WriteFailure {
            rank: output.rank,
            kind,
            error,
        }),
    };

    if let Some(pulses) = output.pulses.as_ref() {
        settle(OutputKind::Iq, writer.write_iq(&output.header, pulses));
    }
    if let Some(state) = output.state.as_ref() {
        settle(OutputKind::State, writer.write_state(&output.header, state));
    }
    report
}
