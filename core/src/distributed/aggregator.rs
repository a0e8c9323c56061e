use crate::distributed::message::{
    write_node_output, AggregationReport, Delivery, NodeOutput, PulseMessage, StateMessage,
};
use crate::format::header::SessionHeader;
use crate::format::writer::FileWriter;
use crate::prelude::{CaptureError, CaptureResult};
use crate::telemetry::LogManager;
use tokio::sync::mpsc;

pub const MASTER_RANK: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Worker,
}

impl Role {
    pub fn from_rank(rank: usize) -> Self {
        if rank == MASTER_RANK {
            Role::Master
        } else {
            Role::Worker
        }
    }
}

/// Per-node seed: the base seed offset by the node's rank.
pub fn effective_seed(base: u32, rank: usize) -> u32 {
    base.wrapping_add(rank as u32)
}

/// Receiving ends of one worker's three channels.
struct PeerInbox {
    rank: usize,
    headers: mpsc::Receiver<Delivery<SessionHeader>>,
    pulses: mpsc::Receiver<Delivery<PulseMessage>>,
    states: mpsc::Receiver<Delivery<StateMessage>>,
}

pub struct MasterLink {
    peers: Vec<PeerInbox>,
    logger: LogManager,
}

pub struct WorkerLink {
    rank: usize,
    headers: mpsc::Sender<Delivery<SessionHeader>>,
    pulses: mpsc::Sender<Delivery<PulseMessage>>,
    states: mpsc::Sender<Delivery<StateMessage>>,
}

pub enum NodeLink {
    Master(MasterLink),
    Worker(WorkerLink),
}

impl NodeLink {
    pub fn rank(&self) -> usize {
        match self {
            NodeLink::Master(_) => MASTER_RANK,
            NodeLink::Worker(link) => link.rank,
        }
    }

    pub fn role(&self) -> Role {
        Role::from_rank(self.rank())
    }

    /// Master persists everything; a worker hands its output to the master.
    pub async fn finish(
        self,
        output: NodeOutput,
        writer: FileWriter,
    ) -> CaptureResult<AggregationReport> {
        match self {
            NodeLink::Master(master) => master.aggregate(output, writer).await,
            NodeLink::Worker(worker) => {
                worker.submit(output).await?;
                Ok(AggregationReport::default())
            }
        }
    }
}

/// Wires one master to `world_size - 1` workers; index `i` holds rank `i`.
pub fn topology(world_size: usize) -> CaptureResult<Vec<NodeLink>> {
    if world_size == 0 {
        return Err(CaptureError::InvalidConfig(
            "a session needs at least one node".into(),
        ));
    }

    let mut peers = Vec::with_capacity(world_size - 1);
    let mut links = Vec::with_capacity(world_size);
    let mut workers = Vec::with_capacity(world_size - 1);
    for rank in 1..world_size {
        let (header_tx, header_rx) = mpsc::channel(1);
        let (pulse_tx, pulse_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = mpsc::channel(1);
        peers.push(PeerInbox {
            rank,
            headers: header_rx,
            pulses: pulse_rx,
            states: state_rx,
        });
        workers.push(NodeLink::Worker(WorkerLink {
            rank,
            headers: header_tx,
            pulses: pulse_tx,
            states: state_tx,
        }));
    }
    links.push(NodeLink::Master(MasterLink {
        peers,
        logger: LogManager::for_rank(MASTER_RANK),
    }));
    links.extend(workers);
    Ok(links)
}

impl MasterLink {
    /// Writes the master's own files, then each worker's in ascending rank.
    pub async fn aggregate(
        mut self,
        own: NodeOutput,
        writer: FileWriter,
    ) -> CaptureResult<AggregationReport> {
        let mut report = persist(writer.clone(), own).await?;

        for peer in self.peers.iter_mut() {
            let rank = peer.rank;
            let header = peer
                .headers
                .recv()
                .await
                .ok_or(CaptureError::PeerDisconnected {
                    rank,
                    payload: "header",
                })?
                .accept();
            self.logger.record(&format!(
                "Received header from node {}  (seed = {}).",
                rank, header.seed
            ));
            let PulseMessage(pulses) =
                peer.pulses
                    .recv()
                    .await
                    .ok_or(CaptureError::PeerDisconnected {
                        rank,
                        payload: "pulse buffer",
                    })?
                    .accept();
            self.logger
                .record(&format!("Received pulse data from node {}.", rank));
            let StateMessage(state) =
                peer.states
                    .recv()
                    .await
                    .ok_or(CaptureError::PeerDisconnected {
                        rank,
                        payload: "state snapshot",
                    })?
                    .accept();

            let output = NodeOutput {
                rank,
                header,
                pulses,
                state,
            };
            report.absorb(persist(writer.clone(), output).await?);
        }

        for failure in &report.failures {
            self.logger.failure(&format!(
                "node {} {} file not written: {}",
                failure.rank,
                failure.kind.extension(),
                failure.error
            ));
        }
        Ok(report)
    }
}

impl WorkerLink {
    /// Sends header, pulses and state, each on its own channel. Every send
    /// waits until the master has taken the payload.
    pub async fn submit(self, output: NodeOutput) -> CaptureResult<()> {
        deliver(&self.headers, output.header, "header").await?;
        deliver(&self.pulses, PulseMessage(output.pulses), "pulse buffer").await?;
        deliver(&self.states, StateMessage(output.state), "state snapshot").await
    }
}

async fn deliver<T>(
    channel: &mpsc::Sender<Delivery<T>>,
    payload: T,
    name: &'static str,
) -> CaptureResult<()> {
    let disconnected = || CaptureError::PeerDisconnected {
        rank: MASTER_RANK,
        payload: name,
    };
    let (delivery, acked) = Delivery::new(payload);
    channel.send(delivery).await.map_err(|_| disconnected())?;
    acked.await.map_err(|_| disconnected())
}

async fn persist(writer: FileWriter, output: NodeOutput) -> CaptureResult<AggregationReport> {
    tokio::task::spawn_blocking(move || write_node_output(&writer, &output))
        .await
        .map_err(|err| CaptureError::Internal(format!("writer task failed: {}", err)))
}
