use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use storage::EntryKind;

/// 日志消息中的时间格式
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// 同步操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// 源目录中新增的条目，复制到副本
    Copy,
    /// 两边都存在但内容不同，用源文件覆盖
    Overwrite,
    /// 副本中多余的条目，删除
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Copy => write!(f, "COPY"),
            Action::Overwrite => write!(f, "OVERWRITE"),
            Action::Delete => write!(f, "DELETE"),
        }
    }
}

/// 一个相对路径在本轮同步中的处理方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    pub action: Action,
    /// 相对于同步根目录的路径
    pub relative_path: PathBuf,
    /// 被操作条目的类型（删除时为副本中条目的类型）
    pub kind: EntryKind,
}

impl Disposition {
    pub fn new(action: Action, relative_path: PathBuf, kind: EntryKind) -> Self {
        Self {
            action,
            relative_path,
            kind,
        }
    }
}

/// 已成功执行的一次操作记录，只追加不修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub timestamp: DateTime<Local>,
    pub action: Action,
    pub relative_path: PathBuf,
    pub source_root: PathBuf,
    pub replica_root: PathBuf,
}

impl SyncEvent {
    pub fn new(disposition: &Disposition, source_root: &Path, replica_root: &Path) -> Self {
        Self {
            timestamp: Local::now(),
            action: disposition.action,
            relative_path: disposition.relative_path.clone(),
            source_root: source_root.to_path_buf(),
            replica_root: replica_root.to_path_buf(),
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} \"{}\" ",
            self.timestamp.format(TIME_FORMAT),
            self.action,
            self.relative_path.display()
        )?;
        match self.action {
            Action::Delete => write!(f, "FROM {}", self.replica_root.display()),
            Action::Copy | Action::Overwrite => write!(
                f,
                "FROM {} TO {}",
                self.source_root.display(),
                self.replica_root.display()
            ),
        }
    }
}
