use crate::consumer::Consumer;
use crate::sync::SyncEvent;
use utils::error::Result;

/// 日志消费者 - 每个操作写一条 DEBUG 日志（终端和日志文件）
pub struct LogConsumer;

#[async_trait::async_trait]
impl Consumer for LogConsumer {
    async fn consume(&mut self, event: &SyncEvent) -> Result<()> {
        log::debug!("{}", event);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log_consumer"
    }
}
