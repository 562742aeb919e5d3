use std::time::{Duration, Instant};

use storage::Storage;

use super::stats::PassReport;
use super::{sync, SyncConfig};
use crate::consumer::ConsumerManager;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Time to wait after a pass that took `elapsed`, so pass start times stay on
/// multiples of `interval`. Never zero: an exact multiple waits a full interval.
pub fn next_sleep(interval: Duration, elapsed: Duration) -> Duration {
    if interval.is_zero() {
        return interval;
    }

    let remainder = elapsed.as_nanos() % interval.as_nanos();
    if remainder == 0 {
        return interval;
    }

    // remainder < interval, so its whole seconds fit in a u64
    let secs = u64::try_from(remainder / NANOS_PER_SEC).unwrap_or(u64::MAX);
    let nanos = (remainder % NANOS_PER_SEC) as u32;
    interval.saturating_sub(Duration::new(secs, nanos))
}

/// The loop alternates between these two states, starting with a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    RunningPass,
    Sleeping(Duration),
}

/// 调度器 - 按固定节奏不断执行同步
pub struct Scheduler {
    config: SyncConfig,
    storage: Box<dyn Storage>,
    consumers: ConsumerManager,
    state: SchedulerState,
    passes: u64,
    last_report: Option<PassReport>,
}

impl Scheduler {
    pub fn new(config: SyncConfig, storage: Box<dyn Storage>, consumers: ConsumerManager) -> Self {
        Self {
            config,
            storage,
            consumers,
            state: SchedulerState::RunningPass,
            passes: 0,
            last_report: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// 已经执行的轮数（包括失败的）
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Report of the most recent pass, `None` if it failed.
    pub fn last_report(&self) -> Option<&PassReport> {
        self.last_report.as_ref()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Perform exactly one state transition.
    pub async fn step(&mut self) -> SchedulerState {
        self.state = match self.state {
            SchedulerState::RunningPass => {
                let elapsed = self.run_pass().await;
                SchedulerState::Sleeping(next_sleep(self.config.interval(), elapsed))
            }
            SchedulerState::Sleeping(duration) => {
                tokio::time::sleep(duration).await;
                SchedulerState::RunningPass
            }
        };
        self.state
    }

    /// Run forever. The process ends only on an external signal.
    pub async fn run(mut self) {
        log::info!(
            "Mirroring {} to {} every {:.2}s",
            self.config.source().display(),
            self.config.replica().display(),
            self.config.interval().as_secs_f64()
        );

        loop {
            self.step().await;
        }
    }

    /// One pass with its banners. Errors are logged and never escape.
    async fn run_pass(&mut self) -> Duration {
        let start_time = Instant::now();
        self.passes += 1;

        log::info!("############################");
        log::info!("### Starting folder sync ###");
        log::info!("############################");

        match sync(&self.config, self.storage.as_ref(), &mut self.consumers).await {
            Ok(report) => {
                log::info!("     Time to sync: {:.2}s    ", report.elapsed.as_secs_f64());
                log::debug!("Pass {} summary:\n{}", self.passes, report);
                self.last_report = Some(report);
            }
            Err(e) => {
                log::error!("Sync pass {} aborted: {}", self.passes, e);
                self.last_report = None;
            }
        }

        log::info!("----------------------------");
        log::info!("---    Folders synced!   ---");
        log::info!("----------------------------");

        start_time.elapsed()
    }
}
