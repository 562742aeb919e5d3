//! Single-level comparison of a source directory against its replica.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use storage::{EntryKind, Storage, StorageEntry};

use super::error::{Result, SyncError};

/// Partitioned view of one directory level on both sides.
///
/// Built fresh for every comparison and dropped once its dispositions are applied.
#[derive(Debug, Default)]
pub struct DirectorySnapshot {
    /// Path of this level relative to the sync roots
    pub relative: PathBuf,
    /// Present only under source
    pub source_only: Vec<StorageEntry>,
    /// Present only under replica
    pub replica_only: Vec<StorageEntry>,
    /// Present on both sides with different content or kind, as (source, replica)
    pub differing: Vec<(StorageEntry, StorageEntry)>,
    /// Present on both sides with identical content
    pub identical: Vec<StorageEntry>,
    /// Directories on both sides, to be compared after this level is applied
    pub common_dirs: Vec<OsString>,
    /// Number of file pairs whose content had to be hashed
    pub fingerprinted: usize,
}

impl DirectorySnapshot {
    /// True when nothing at this level needs to change.
    pub fn is_in_sync(&self) -> bool {
        self.source_only.is_empty() && self.replica_only.is_empty() && self.differing.is_empty()
    }
}

/// Compare `source_dir` with `replica_dir` one level deep.
///
/// Pairs of regular files with equal size are only candidates: their
/// fingerprints decide whether they are identical. Common subdirectories are
/// reported, not descended into.
pub async fn compare(
    storage: &dyn Storage, source_dir: &Path, replica_dir: &Path, relative: &Path,
) -> Result<DirectorySnapshot> {
    let source = list(storage, source_dir).await?;
    let mut replica = list(storage, replica_dir).await?;

    let mut snapshot = DirectorySnapshot {
        relative: relative.to_path_buf(),
        ..Default::default()
    };
    let mut candidates = Vec::new();

    for (name, src) in source {
        if src.dangling {
            log::warn!("Skipping dangling symlink {}", src.path.display());
            continue;
        }

        let Some(rep) = replica.remove(&name) else {
            snapshot.source_only.push(src);
            continue;
        };

        match (src.kind, rep.kind) {
            (EntryKind::Directory, EntryKind::Directory) => snapshot.common_dirs.push(name),
            _ if src.kind != rep.kind || rep.dangling || src.size != rep.size => {
                snapshot.differing.push((src, rep))
            }
            _ => candidates.push((src, rep)),
        }
    }

    // 剩下的都是副本中多余的条目
    snapshot.replica_only.extend(replica.into_values());

    for (src, rep) in candidates {
        let src_digest = storage
            .fingerprint(&src.path)
            .await
            .map_err(|e| SyncError::from_io(&src.path, e))?;
        let rep_digest = storage
            .fingerprint(&rep.path)
            .await
            .map_err(|e| SyncError::from_io(&rep.path, e))?;
        snapshot.fingerprinted += 1;

        if src_digest == rep_digest {
            snapshot.identical.push(src);
        } else {
            if src.same_signature(&rep) {
                log::debug!(
                    "Metadata matches but content differs: {}",
                    relative.join(&src.name).display()
                );
            }
            snapshot.differing.push((src, rep));
        }
    }

    snapshot.differing.sort_by(|a, b| a.0.name.cmp(&b.0.name));

    Ok(snapshot)
}

async fn list(storage: &dyn Storage, dir: &Path) -> Result<BTreeMap<OsString, StorageEntry>> {
    let entries = storage
        .list_dir(dir)
        .await
        .map_err(|e| SyncError::from_io(dir, e))?;

    Ok(entries.into_iter().map(|e| (e.name.clone(), e)).collect())
}
