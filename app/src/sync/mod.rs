//! 同步模块 - 单向、周期性地让副本目录与源目录保持一致

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::time::Duration;

use storage::{Storage, DEFAULT_CHUNK_SIZE};

use crate::consumer::ConsumerManager;

pub mod differ;
pub mod error;
pub mod event;
pub mod reconcile;
pub mod scheduler;
pub mod stats;

#[cfg(test)]
mod tests;

pub use differ::{compare, DirectorySnapshot};
pub use error::SyncError;
pub use event::{Action, Disposition, SyncEvent};
pub use reconcile::{plan, Reconciler};
pub use scheduler::{next_sleep, Scheduler, SchedulerState};
pub use stats::PassReport;

/// 同步配置 - 启动时确定，之后不再修改
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    source: PathBuf,
    replica: PathBuf,
    interval: Duration,
    log_file: PathBuf,
    chunk_size: usize,
}

impl SyncConfig {
    /// 校验并规范化命令行参数
    pub fn new(source: &str, replica: &str, interval_secs: f64, log_file: &str) -> utils::error::Result<Self> {
        let interval = interval_from_secs(interval_secs)?;
        if log_file.is_empty() {
            return Err(utils::error::Error::new("Log file path must not be empty"));
        }

        Ok(Self {
            source: normalize_root(source)?,
            replica: normalize_root(replica)?,
            interval,
            log_file: PathBuf::from(log_file),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn replica(&self) -> &Path {
        &self.replica
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Convert an interval in seconds to a `Duration` the scheduler can sleep on.
///
/// Rejects values that are not finite, not positive, too large for a
/// `Duration`, or so small they round down to zero.
pub fn interval_from_secs(secs: f64) -> utils::error::Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(utils::error::Error::new(format!(
            "Sync interval must be a positive number of seconds, got {}",
            secs
        )));
    }

    match Duration::try_from_secs_f64(secs) {
        Ok(interval) if !interval.is_zero() => Ok(interval),
        Ok(_) => Err(utils::error::Error::new(format!(
            "Sync interval {} rounds down to zero, use at least one nanosecond",
            secs
        ))),
        Err(e) => Err(utils::error::Error::with_source(
            format!("Sync interval {} is out of range", secs),
            Box::new(e),
        )),
    }
}

/// 确保目录路径以分隔符结尾
fn normalize_root(path: &str) -> utils::error::Result<PathBuf> {
    if path.is_empty() {
        return Err(utils::error::Error::new("Directory path must not be empty"));
    }

    let mut normalized = path.to_string();
    if !normalized.ends_with(std::path::is_separator) {
        normalized.push(MAIN_SEPARATOR);
    }
    Ok(PathBuf::from(normalized))
}

/// 执行一轮完整的同步（包括所有子目录）
pub async fn sync(
    config: &SyncConfig, storage: &dyn Storage, consumers: &mut ConsumerManager,
) -> error::Result<PassReport> {
    Reconciler::new(config, storage, consumers).run().await
}
