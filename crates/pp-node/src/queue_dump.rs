//! JSON queue dumps
//!
//! The queue subsystem can export its state as
//!
//! ```json
//! {"queues": {"LAN": {"addr": "10.0.0.5:4001", "jobs": [{"hash": "...", "peer": "...", "acquired_by": null}]}}}
//! ```
//!
//! where `addr` is this node's identity within that queue.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use pp_core::types::{Job, PeerId, QueueSnapshots};

use crate::fileshare::{ObservedQueues, QueueSource};

/// Exported state of every queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueDump {
    /// Queues by name
    #[serde(default)]
    pub queues: BTreeMap<String, DumpedQueue>,
}

/// One exported queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpedQueue {
    /// This node's identity within the queue
    pub addr: PeerId,
    /// Jobs currently listed
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl QueueDump {
    /// Read a dump from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read queue dump {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse queue dump {:?}", path))
    }

    /// Split into snapshots and per-queue local identities
    pub fn into_observed(self) -> ObservedQueues {
        let mut local = HashMap::with_capacity(self.queues.len());
        let queues: QueueSnapshots = self
            .queues
            .into_iter()
            .map(|(name, queue)| {
                local.insert(name.clone(), queue.addr);
                (name, queue.jobs)
            })
            .collect();

        ObservedQueues { queues, local }
    }
}

/// A [`QueueSource`] that re-reads a dump file on every observation
#[derive(Debug, Clone)]
pub struct QueueDumpFile {
    path: PathBuf,
}

impl QueueDumpFile {
    /// Observe queues through the dump at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QueueSource for QueueDumpFile {
    fn observe(&self) -> Result<ObservedQueues> {
        Ok(QueueDump::load(&self.path)?.into_observed())
    }
}
