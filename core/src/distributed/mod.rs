//! Master/worker aggregation of per-node capture output.
//!
//! Every node captures independently with its own seed. Workers then hand
//! their header, pulses and state to node 0, which is the only writer.

pub mod aggregator;
pub mod message;

pub use aggregator::{
    effective_seed, topology, MasterLink, NodeLink, Role, WorkerLink, MASTER_RANK,
};
pub use message::{
    write_node_output, AggregationReport, Delivery, NodeFile, NodeOutput, WriteFailure,
};
