//! Fileshare reclamation
//!
//! The fileshare directory is a flat content-addressed store: every entry is
//! named after the hash of its payload, optionally with a print-file
//! extension. Entries are kept only while some networked queue lists the
//! hash as published or acquired by this node; everything else is deleted.
//!
//! Passes are not locked. Callers must not run two passes over the same
//! directory at once (see [`FileshareJanitor`](super::FileshareJanitor)).

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

use pp_core::config::{DirRemovalPolicy, MissingRootPolicy, ReclaimConfig};
use pp_core::error::ReclaimError;
use pp_core::types::{is_reserved_queue, PeerId, QueueSnapshots};

/// Extensions (without the dot) of entries the reclaimer may delete.
/// The empty string stands for "no extension".
pub const RECLAIMABLE_EXTENSIONS: [&str; 4] = ["", "gjob", "gcode", "gco"];

/// Looks up which member of a queue is this node
pub trait LocalIdentity {
    /// This node's identity within `queue`, if it participates in it
    fn local_identity(&self, queue: &str) -> Option<PeerId>;
}

impl<F> LocalIdentity for F
where
    F: Fn(&str) -> Option<PeerId>,
{
    fn local_identity(&self, queue: &str) -> Option<PeerId> {
        self(queue)
    }
}

impl LocalIdentity for HashMap<String, PeerId> {
    fn local_identity(&self, queue: &str) -> Option<PeerId> {
        self.get(queue).cloned()
    }
}

/// Hashes this node still needs: published or acquired by it in any
/// non-reserved queue
pub fn retained_hashes(queues: &QueueSnapshots, local: &impl LocalIdentity) -> HashSet<String> {
    let mut keep = HashSet::new();

    for (name, jobs) in queues.iter() {
        if is_reserved_queue(name) {
            continue;
        }
        let Some(me) = local.local_identity(name) else {
            tracing::debug!("No local identity for queue {}, nothing retained from it", name);
            continue;
        };
        keep.extend(
            jobs.iter()
                .filter(|job| job.is_held_by(&me))
                .map(|job| job.hash.clone()),
        );
    }

    keep
}

/// How a directory entry name is treated by reclamation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind<'a> {
    /// A store entry for `hash`
    Candidate { hash: &'a str },
    /// Not a store entry; never touched
    Ignored,
}

/// Classify a directory entry name.
///
/// Hidden names and names with an extension outside
/// [`RECLAIMABLE_EXTENSIONS`] are ignored. The hash is the name up to the
/// last dot.
pub fn classify(name: &str) -> EntryKind<'_> {
    if name.is_empty() || name.starts_with('.') {
        return EntryKind::Ignored;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        // A trailing dot is an (empty) extension, not "no extension".
        Some((_, "")) => return EntryKind::Ignored,
        Some((stem, ext)) => (stem, ext),
        None => (name, ""),
    };

    if RECLAIMABLE_EXTENSIONS.contains(&ext) {
        EntryKind::Candidate { hash: stem }
    } else {
        EntryKind::Ignored
    }
}

/// Outcome of a reclamation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Entries removed (directories count even if only partially removed)
    pub deleted: usize,
    /// Entries kept because a queue still needs them
    pub retained: usize,
    /// Entries skipped because they are not store entries
    pub ignored: usize,
    /// Directories whose removal failed under the best-effort policy
    pub directory_errors: usize,
}

/// Deletes fileshare entries no queue needs any more
#[derive(Debug, Clone, Copy, Default)]
pub struct Reclaimer {
    directory_removal: DirRemovalPolicy,
    missing_root: MissingRootPolicy,
}

impl Reclaimer {
    /// Create a reclaimer with explicit policies
    pub fn new(directory_removal: DirRemovalPolicy, missing_root: MissingRootPolicy) -> Self {
        Self {
            directory_removal,
            missing_root,
        }
    }

    /// Create a reclaimer from configuration
    pub fn from_config(config: &ReclaimConfig) -> Self {
        Self::new(config.directory_removal, config.missing_root)
    }

    /// Run one pass over `store_root`
    pub fn run(
        &self,
        store_root: &Path,
        queues: &QueueSnapshots,
        local: &impl LocalIdentity,
    ) -> Result<ReclaimReport, ReclaimError> {
        let read_dir_error = |source| ReclaimError::ReadDir {
            path: store_root.to_path_buf(),
            source,
        };

        // Only a definite "not found" counts as missing; other metadata
        // errors (permissions, symlink loops) are real failures.
        if !store_root.try_exists().map_err(read_dir_error)? {
            return match self.missing_root {
                MissingRootPolicy::NoOp => {
                    tracing::debug!("Fileshare dir {:?} does not exist, nothing to reclaim", store_root);
                    Ok(ReclaimReport::default())
                }
                MissingRootPolicy::Error => {
                    Err(ReclaimError::StorageUnavailable(store_root.to_path_buf()))
                }
            };
        }

        let keep = retained_hashes(queues, local);

        let mut report = ReclaimReport::default();
        for entry in fs::read_dir(store_root).map_err(read_dir_error)? {
            let entry = entry.map_err(read_dir_error)?;
            let path = entry.path();

            let file_name = entry.file_name();
            let hash = match file_name.to_str().map(classify) {
                Some(EntryKind::Candidate { hash }) => hash,
                Some(EntryKind::Ignored) | None => {
                    tracing::debug!("Fileshare cleanup ignoring non-printable file: {:?}", path);
                    report.ignored += 1;
                    continue;
                }
            };

            if keep.contains(hash) {
                tracing::trace!("Retaining {:?}", path);
                report.retained += 1;
                continue;
            }

            // file_type() does not follow symlinks; a link is unlinked, not traversed.
            let is_dir = entry.file_type().map_err(read_dir_error)?.is_dir();
            if is_dir {
                if let Err(source) = fs::remove_dir_all(&path) {
                    match self.directory_removal {
                        DirRemovalPolicy::BestEffort => {
                            tracing::debug!("Partial removal of {:?}: {}", path, source);
                            report.directory_errors += 1;
                        }
                        DirRemovalPolicy::Strict => {
                            return Err(ReclaimError::DirectoryRemoval { path, source });
                        }
                    }
                }
            } else {
                remove_file(&path)?;
            }
            report.deleted += 1;
        }

        tracing::info!(
            "Reclaimed {} fileshare entries in {:?} ({} retained, {} ignored)",
            report.deleted,
            store_root,
            report.retained,
            report.ignored
        );
        Ok(report)
    }
}

fn remove_file(path: &Path) -> Result<(), ReclaimError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        // Gone already; the entry is reclaimed either way.
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ReclaimError::EntryRemoval {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Delete every fileshare entry not held by this node, returning how many
/// entries were removed.
///
/// Uses the default policies: a missing `store_root` reclaims nothing, and
/// directory removal is best-effort.
pub fn reclaim(
    store_root: &Path,
    queues: &QueueSnapshots,
    local: &impl LocalIdentity,
) -> Result<usize, ReclaimError> {
    Reclaimer::default()
        .run(store_root, queues, local)
        .map(|report| report.deleted)
}
