use std::path::PathBuf;
use std::time::Instant;

use storage::{EntryKind, Storage};

use super::differ::{compare, DirectorySnapshot};
use super::error::{Result, SyncError};
use super::event::{Action, Disposition, SyncEvent};
use super::stats::PassReport;
use super::SyncConfig;
use crate::consumer::ConsumerManager;

/// Turn one compared level into the ordered list of operations to apply:
/// every copy first, then every overwrite, then every delete.
///
/// A name whose kind differs between the two sides becomes a delete of the
/// replica entry followed by a copy of the source entry, in the overwrite slot.
pub fn plan(snapshot: &DirectorySnapshot) -> Vec<Disposition> {
    let at = |name: &std::ffi::OsStr| snapshot.relative.join(name);
    let mut dispositions = Vec::new();

    for src in &snapshot.source_only {
        dispositions.push(Disposition::new(Action::Copy, at(src.name.as_os_str()), src.kind));
    }

    for (src, rep) in &snapshot.differing {
        if src.kind == rep.kind {
            dispositions.push(Disposition::new(Action::Overwrite, at(src.name.as_os_str()), src.kind));
        } else {
            dispositions.push(Disposition::new(Action::Delete, at(rep.name.as_os_str()), rep.kind));
            dispositions.push(Disposition::new(Action::Copy, at(src.name.as_os_str()), src.kind));
        }
    }

    for rep in &snapshot.replica_only {
        dispositions.push(Disposition::new(Action::Delete, at(rep.name.as_os_str()), rep.kind));
    }

    dispositions
}

/// 协调器 - 把副本目录调整为与源目录一致
pub struct Reconciler<'a> {
    config: &'a SyncConfig,
    storage: &'a dyn Storage,
    consumers: &'a mut ConsumerManager,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: &'a SyncConfig, storage: &'a dyn Storage, consumers: &'a mut ConsumerManager,
    ) -> Self {
        Self {
            config,
            storage,
            consumers,
        }
    }

    /// Run one full pass over both trees.
    ///
    /// The first failure aborts the pass. Operations already applied stay
    /// applied; the next pass picks up whatever is still different.
    pub async fn run(&mut self) -> Result<PassReport> {
        let start_time = Instant::now();
        let mut report = PassReport::default();

        // 显式的工作栈代替递归，按名称顺序深度优先
        let mut pending = vec![PathBuf::new()];

        while let Some(relative) = pending.pop() {
            let source_dir = self.config.source().join(&relative);
            let replica_dir = self.config.replica().join(&relative);

            let snapshot = compare(self.storage, &source_dir, &replica_dir, &relative).await?;
            report.dirs_compared += 1;
            report.files_fingerprinted += snapshot.fingerprinted;
            report.files_identical += snapshot.identical.len();

            for disposition in plan(&snapshot) {
                self.apply(&disposition, &mut report).await?;
            }

            pending.extend(snapshot.common_dirs.iter().rev().map(|name| relative.join(name)));
        }

        report.elapsed = start_time.elapsed();
        Ok(report)
    }

    /// Apply one disposition, then hand its event to the consumers.
    async fn apply(&mut self, disposition: &Disposition, report: &mut PassReport) -> Result<()> {
        let src = self.config.source().join(&disposition.relative_path);
        let dest = self.config.replica().join(&disposition.relative_path);

        match (disposition.action, disposition.kind) {
            (Action::Copy, EntryKind::Directory) => {
                let copied = self
                    .storage
                    .copy_tree(&src, &dest)
                    .await
                    .map_err(|e| SyncError::copy(&src, &dest, e))?;
                report.files_copied_in_trees += copied as usize;
            }
            (Action::Copy, EntryKind::File) | (Action::Overwrite, _) => {
                self.storage
                    .copy_file(&src, &dest)
                    .await
                    .map_err(|e| SyncError::copy(&src, &dest, e))?;
            }
            (Action::Delete, _) => {
                self.storage
                    .delete(&dest)
                    .await
                    .map_err(|e| SyncError::from_io(&dest, e))?;
            }
        }

        report.record(disposition.action);
        self.emit(disposition).await
    }

    async fn emit(&mut self, disposition: &Disposition) -> Result<()> {
        let event = SyncEvent::new(disposition, self.config.source(), self.config.replica());
        self.consumers.dispatch(&event).await
    }
}
