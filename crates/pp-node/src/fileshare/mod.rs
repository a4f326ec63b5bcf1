//! Fileshare store maintenance

mod janitor;
mod reclaim;

pub use janitor::{run_periodic_reclaim, FileshareJanitor, ObservedQueues, QueueSource};
pub use reclaim::{
    classify, reclaim, retained_hashes, EntryKind, LocalIdentity, ReclaimReport, Reclaimer,
    RECLAIMABLE_EXTENSIONS,
};
