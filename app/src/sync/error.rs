use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 同步过程中的错误，任何一种都会中止当前这一轮同步
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Path not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Consumer '{name}' failed: {source}")]
    Consumer {
        name: &'static str,
        #[source]
        source: utils::error::Error,
    },
}

impl SyncError {
    /// 根据 io::ErrorKind 归类错误，并附上出错的路径
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => SyncError::NotFound { path },
            io::ErrorKind::PermissionDenied => SyncError::PermissionDenied { path },
            _ => SyncError::Io { path, source: err },
        }
    }

    /// 复制失败时保留两端路径
    pub fn copy(from: &Path, to: &Path, err: io::Error) -> Self {
        SyncError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: err,
        }
    }
}

impl From<SyncError> for utils::error::Error {
    fn from(err: SyncError) -> Self {
        utils::error::Error::with_source(err.to_string(), Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
