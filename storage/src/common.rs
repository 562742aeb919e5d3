use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::SystemTime;

/// Kind of a directory entry after following symbolic links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "dir"),
        }
    }
}

/// 单层目录中的一个条目
#[derive(Debug, Clone)]
pub struct StorageEntry {
    /// 文件或目录的名称
    pub name: OsString,
    /// 完整路径
    pub path: PathBuf,
    /// 跟随符号链接后的类型
    pub kind: EntryKind,
    /// 文件大小（字节），目录为0
    pub size: u64,
    /// 最后修改时间
    pub modified: Option<SystemTime>,
    /// 符号链接指向的目标不存在
    pub dangling: bool,
}

impl StorageEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Name rendered for logs; non UTF-8 bytes are replaced.
    pub fn display_name(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }

    /// Cheap metadata check: same kind, same size and same modification time.
    pub fn same_signature(&self, other: &StorageEntry) -> bool {
        self.kind == other.kind && self.size == other.size && self.modified == other.modified
    }
}
