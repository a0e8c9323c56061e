use log::{error, info, warn};

/// Logger that tags every line with the node that emitted it.
#[derive(Debug, Clone)]
pub struct LogManager {
    prefix: String,
}

impl LogManager {
    pub fn new() -> Self {
        Self {
            prefix: String::from("node 0"),
        }
    }

    pub fn for_rank(rank: usize) -> Self {
        Self {
            prefix: format!("node {}", rank),
        }
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.prefix, message);
    }

    pub fn caution(&self, message: &str) {
        warn!("[{}] {}", self.prefix, message);
    }

    pub fn failure(&self, message: &str) {
        error!("[{}] {}", self.prefix, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
