//! Periodic, single-flight fileshare reclamation
//!
//! Reclamation takes no filesystem locks, so the janitor guarantees that at
//! most one pass runs over its store at a time. A pass requested while
//! another is in flight is skipped rather than queued.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use anyhow::Context;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use pp_core::error::ReclaimError;
use pp_core::types::{PeerId, QueueSnapshots};

use super::reclaim::{ReclaimReport, Reclaimer};

/// Queue membership plus this node's identity in each queue
#[derive(Debug, Clone, Default)]
pub struct ObservedQueues {
    /// Jobs per queue
    pub queues: QueueSnapshots,
    /// This node's identity per queue
    pub local: HashMap<String, PeerId>,
}

/// Provides live queue snapshots from the queue subsystem
pub trait QueueSource: Send + Sync {
    /// Take a fresh snapshot of every queue
    fn observe(&self) -> anyhow::Result<ObservedQueues>;
}

/// Owns a fileshare directory and serializes reclamation passes over it
#[derive(Debug)]
pub struct FileshareJanitor {
    store_root: PathBuf,
    reclaimer: Reclaimer,
    in_flight: Mutex<()>,
}

impl FileshareJanitor {
    /// Create a janitor for `store_root`
    pub fn new(store_root: impl Into<PathBuf>, reclaimer: Reclaimer) -> Self {
        Self {
            store_root: store_root.into(),
            reclaimer,
            in_flight: Mutex::new(()),
        }
    }

    /// The managed fileshare directory
    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    /// Run a pass now.
    ///
    /// Returns `Ok(None)` without touching the store if another pass is
    /// already running.
    pub fn reclaim_now(
        &self,
        observed: &ObservedQueues,
    ) -> Result<Option<ReclaimReport>, ReclaimError> {
        let _guard = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                tracing::debug!("Fileshare reclaim already in progress, skipping");
                return Ok(None);
            }
            // The guard protects no data; a panicked pass leaves nothing inconsistent.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        self.reclaimer
            .run(&self.store_root, &observed.queues, &observed.local)
            .map(Some)
    }
}

/// Run reclamation every `interval` until `cancel` fires.
///
/// Each pass observes the queues afresh and runs on the blocking pool.
/// Failures are logged and retried on the next tick.
pub async fn run_periodic_reclaim(
    janitor: Arc<FileshareJanitor>,
    source: Arc<dyn QueueSource>,
    interval: Duration,
    cancel: CancellationToken,
) {
    // tokio rejects a zero period
    let period = interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        "Starting fileshare reclaim task for {:?} (interval: {:?})",
        janitor.store_root(),
        period
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                reclaim_once(&janitor, &source).await;
            }
            _ = cancel.cancelled() => {
                tracing::info!("Fileshare reclaim task shutting down");
                break;
            }
        }
    }
}

async fn reclaim_once(
    janitor: &Arc<FileshareJanitor>,
    source: &Arc<dyn QueueSource>,
) -> Option<ReclaimReport> {
    let janitor = Arc::clone(janitor);
    let source = Arc::clone(source);

    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<ReclaimReport>> {
        let observed = source.observe().context("Failed to observe queues")?;
        Ok(janitor.reclaim_now(&observed)?)
    })
    .await;

    match result {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            tracing::warn!("Fileshare reclaim failed: {:#}", e);
            None
        }
        Err(e) => {
            tracing::error!("Fileshare reclaim pass panicked: {}", e);
            None
        }
    }
}
