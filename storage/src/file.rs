use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;
use walkdir::WalkDir;

use crate::common::{EntryKind, StorageEntry};
use crate::digest::{ContentFingerprint, DEFAULT_CHUNK_SIZE};

const STAGING_SUFFIX: &str = ".mirrorsync-tmp";

/// Local filesystem storage. Symbolic links are followed, never replicated as links.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    chunk_size: usize,
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl LocalStorage {
    /// Create new local storage instance hashing files `chunk_size` bytes at a time
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// List one directory level, sorted by name.
    pub async fn list_dir(&self, path: &Path) -> io::Result<Vec<StorageEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio_fs::read_dir(path).await?;

        while let Some(entry) = dir.next_entry().await? {
            entries.push(Self::head(entry.path()).await?);
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Get entry metadata, following symbolic links
    async fn head(path: PathBuf) -> io::Result<StorageEntry> {
        let name = path.file_name().unwrap_or_default().to_os_string();

        match tokio_fs::metadata(&path).await {
            Ok(metadata) => {
                let kind = if metadata.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                Ok(StorageEntry {
                    name,
                    size: if metadata.is_dir() { 0 } else { metadata.len() },
                    modified: metadata.modified().ok(),
                    kind,
                    path,
                    dangling: false,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // The entry was listed, so a NotFound here means a link to nowhere
                let link = tokio_fs::symlink_metadata(&path).await?;
                if !link.file_type().is_symlink() {
                    return Err(e);
                }
                Ok(StorageEntry {
                    name,
                    path,
                    kind: EntryKind::File,
                    size: 0,
                    modified: None,
                    dangling: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Compute the content fingerprint of a file
    pub async fn fingerprint(&self, path: &Path) -> io::Result<ContentFingerprint> {
        ContentFingerprint::from_file(path, self.chunk_size).await
    }

    /// Copy a single file, replacing `dest` if it exists, even when it is read-only or a link.
    pub async fn copy_file(&self, src: &Path, dest: &Path) -> io::Result<()> {
        let (src, dest) = (src.to_path_buf(), dest.to_path_buf());
        run_blocking(move || copy_file_blocking(&src, &dest)).await
    }

    /// Recursively copy the directory `src` to `dest`. Returns the number of files copied.
    pub async fn copy_tree(&self, src: &Path, dest: &Path) -> io::Result<u64> {
        let (src, dest) = (src.to_path_buf(), dest.to_path_buf());
        run_blocking(move || copy_tree_blocking(&src, &dest)).await
    }

    /// Delete a file or a whole directory tree. A symbolic link is removed as a link.
    pub async fn delete(&self, path: &Path) -> io::Result<()> {
        let metadata = tokio_fs::symlink_metadata(path).await?;
        if metadata.is_dir() {
            tokio_fs::remove_dir_all(path).await
        } else {
            tokio_fs::remove_file(path).await
        }
    }
}

async fn run_blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

fn copy_file_blocking(src: &Path, dest: &Path) -> io::Result<()> {
    // 先写到同目录的临时文件再 rename，目标只读或是符号链接时都能替换
    let staging = staging_path(dest)?;
    // 上次中断留下的临时文件可能是只读的
    let _ = fs::remove_file(&staging);
    if let Err(err) = copy_with_mtime(src, &staging).and_then(|_| fs::rename(&staging, dest)) {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }

    Ok(())
}

fn copy_with_mtime(src: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(src, dest)?;

    // 保留源文件的修改时间，下一轮比较时元数据才能一致
    let modified = fs::metadata(src)?.modified()?;
    #[cfg(unix)]
    let file = fs::File::open(dest)?;
    #[cfg(not(unix))]
    let file = fs::OpenOptions::new().write(true).open(dest)?;
    file.set_modified(modified)?;

    Ok(())
}

/// Hidden sibling of `dest` used while a copy is in flight.
fn staging_path(dest: &Path) -> io::Result<PathBuf> {
    let name = dest.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", dest.display()),
        )
    })?;

    let mut staging = OsString::from(".");
    staging.push(name);
    staging.push(STAGING_SUFFIX);
    Ok(dest.with_file_name(staging))
}

fn copy_tree_blocking(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut copied = 0;
    let walker = WalkDir::new(src)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if is_dangling_link(&err) => {
                log::warn!("Skipping dangling symlink {:?}", err.path());
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            copy_file_blocking(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

fn is_dangling_link(err: &walkdir::Error) -> bool {
    if err.loop_ancestor().is_some() {
        return false;
    }
    match err.path() {
        Some(path) => {
            fs::symlink_metadata(path)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false)
                && fs::metadata(path).is_err()
        }
        None => false,
    }
}
