pub mod common;
pub mod digest;
pub mod file;

pub use common::*;
pub use digest::*;
pub use file::*;

use std::io;
use std::path::Path;

/// 存储操作trait - 同步过程需要的全部文件系统操作
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// 列出单层目录，按名称排序
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<StorageEntry>>;

    /// 计算文件内容指纹
    async fn fingerprint(&self, path: &Path) -> io::Result<ContentFingerprint>;

    /// 复制单个文件，目标存在时覆盖
    async fn copy_file(&self, src: &Path, dest: &Path) -> io::Result<()>;

    /// 递归复制整个目录，返回复制的文件数
    async fn copy_tree(&self, src: &Path, dest: &Path) -> io::Result<u64>;

    /// 删除文件或整个目录
    async fn delete(&self, path: &Path) -> io::Result<()>;
}

#[async_trait::async_trait]
impl Storage for LocalStorage {
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<StorageEntry>> {
        LocalStorage::list_dir(self, path).await
    }

    async fn fingerprint(&self, path: &Path) -> io::Result<ContentFingerprint> {
        LocalStorage::fingerprint(self, path).await
    }

    async fn copy_file(&self, src: &Path, dest: &Path) -> io::Result<()> {
        LocalStorage::copy_file(self, src, dest).await
    }

    async fn copy_tree(&self, src: &Path, dest: &Path) -> io::Result<u64> {
        LocalStorage::copy_tree(self, src, dest).await
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        LocalStorage::delete(self, path).await
    }
}
