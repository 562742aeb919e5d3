use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::event::Action;

/// 单轮同步的统计信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    // 操作统计
    pub copied: usize,
    pub overwritten: usize,
    pub deleted: usize,

    // 比较统计
    pub dirs_compared: usize,
    pub files_fingerprinted: usize,
    pub files_identical: usize,
    pub files_copied_in_trees: usize, // 随目录整体复制的文件数

    pub elapsed: Duration,
}

impl PassReport {
    pub fn record(&mut self, action: Action) {
        match action {
            Action::Copy => self.copied += 1,
            Action::Overwrite => self.overwritten += 1,
            Action::Delete => self.deleted += 1,
        }
    }

    /// 本轮执行的操作总数
    pub fn total_operations(&self) -> usize {
        self.copied + self.overwritten + self.deleted
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Operations: {}", self.total_operations())?;
        writeln!(f, "  Copied:       {}", self.copied)?;
        writeln!(f, "  Overwritten:  {}", self.overwritten)?;
        writeln!(f, "  Deleted:      {}", self.deleted)?;
        writeln!(f, "Directories compared:   {}", self.dirs_compared)?;
        writeln!(f, "Files fingerprinted:    {}", self.files_fingerprinted)?;
        writeln!(f, "Files identical:        {}", self.files_identical)?;
        writeln!(f, "Files copied in trees:  {}", self.files_copied_in_trees)?;
        write!(f, "Time to sync: {:.2}s", self.elapsed.as_secs_f64())
    }
}
