//! Core domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Queue holding archived jobs; never consulted for retention
pub const ARCHIVE_QUEUE: &str = "archive";

/// The node's default (non-networked) queue; never consulted for retention
pub const DEFAULT_QUEUE: &str = "default";

/// Returns true for queue names that are excluded from retention reasoning
pub fn is_reserved_queue(name: &str) -> bool {
    name == ARCHIVE_QUEUE || name == DEFAULT_QUEUE
}

/// Identity of a queue member (typically its network address within that queue)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    /// Create a new peer ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A job as listed in a distributed queue snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Content hash of the job's file artifact
    pub hash: String,

    /// Queue member that published the job
    #[serde(alias = "peer_")]
    pub peer: PeerId,

    /// Queue member currently working the job, if any
    #[serde(default, alias = "acquired_by_")]
    pub acquired_by: Option<PeerId>,
}

impl Job {
    /// Create an unclaimed job
    pub fn new(hash: impl Into<String>, peer: impl Into<PeerId>) -> Self {
        Self {
            hash: hash.into(),
            peer: peer.into(),
            acquired_by: None,
        }
    }

    /// Mark the job as claimed by `peer`
    pub fn claimed_by(mut self, peer: impl Into<PeerId>) -> Self {
        self.acquired_by = Some(peer.into());
        self
    }

    /// Whether `local` published or is working this job
    pub fn is_held_by(&self, local: &PeerId) -> bool {
        &self.peer == local || self.acquired_by.as_ref() == Some(local)
    }
}

/// Point-in-time membership of every known queue, keyed by queue name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueSnapshots(BTreeMap<String, Vec<Job>>);

impl QueueSnapshots {
    /// Create an empty set of snapshots
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the jobs of one queue, replacing any previous listing
    pub fn insert(&mut self, queue: impl Into<String>, jobs: Vec<Job>) {
        self.0.insert(queue.into(), jobs);
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with_queue(mut self, queue: impl Into<String>, jobs: Vec<Job>) -> Self {
        self.insert(queue, jobs);
        self
    }

    /// Iterate over `(queue name, jobs)` in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Job])> {
        self.0.iter().map(|(name, jobs)| (name.as_str(), jobs.as_slice()))
    }

    /// Number of queues
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no queues are known
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<Job>)> for QueueSnapshots {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Job>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Health of a node component, rendered as a status string for the UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Not yet determined
    #[default]
    Unknown,
    /// Component is up
    Ready,
    /// Component failed; carries a user-facing reason
    Error(String),
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Unknown => write!(f, "Unknown"),
            HealthStatus::Ready => write!(f, "Ready"),
            HealthStatus::Error(reason) => write!(f, "Error: {}", reason),
        }
    }
}
