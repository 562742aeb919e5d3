use app::consumer::ConsumerManager;
use app::sync::{Scheduler, SyncConfig};
use storage::LocalStorage;
use utils::app_config::AppConfig;

use crate::Cli;

/// 启动同步守护进程，永不返回（除非初始化失败）
pub async fn sync_cmd(cli: Cli) -> utils::error::Result<()> {
    let app_config = AppConfig::fetch()?;

    let config = SyncConfig::new(&cli.source, &cli.replica, cli.interval, &cli.log_file)?
        .with_chunk_size(app_config.sync.chunk_size);

    // 日志文件路径来自命令行，所以在解析参数之后才初始化日志
    let _guard = utils::logger::setup_logging(config.log_file(), cli.log_level.as_deref())?;
    log::info!("Starting sync operation...");

    let storage = LocalStorage::new(config.chunk_size());
    let scheduler = Scheduler::new(config, Box::new(storage), ConsumerManager::with_log_consumer());

    scheduler.run().await;
    Ok(())
}
