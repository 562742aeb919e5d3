use crate::sync::error::SyncError;
use crate::sync::SyncEvent;
use utils::error::Result;

pub mod log;
pub mod memory;

pub use self::log::LogConsumer;
pub use self::memory::MemoryConsumer;

/// 消费者 trait - 接收每一个成功执行的同步操作
#[async_trait::async_trait]
pub trait Consumer: Send + Sync {
    /// 处理一条同步事件
    async fn consume(&mut self, event: &SyncEvent) -> Result<()>;

    /// 获取消费者名称
    fn name(&self) -> &'static str;
}

/// 消费者管理器 - 把事件依次分发给所有消费者
#[derive(Default)]
pub struct ConsumerManager {
    consumers: Vec<Box<dyn Consumer>>,
}

impl ConsumerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只带日志消费者的管理器，守护进程默认使用
    pub fn with_log_consumer() -> Self {
        let mut manager = Self::new();
        manager.add_consumer(Box::new(LogConsumer));
        manager
    }

    /// 添加消费者
    pub fn add_consumer(&mut self, consumer: Box<dyn Consumer>) {
        self.consumers.push(consumer);
    }

    /// 获取消费者数量
    pub fn get_consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn consumer_names(&self) -> Vec<&'static str> {
        self.consumers.iter().map(|c| c.name()).collect()
    }

    /// 分发事件到所有消费者，遇到第一个失败即返回
    pub async fn dispatch(&mut self, event: &SyncEvent) -> std::result::Result<(), SyncError> {
        for consumer in &mut self.consumers {
            consumer
                .consume(event)
                .await
                .map_err(|source| SyncError::Consumer {
                    name: consumer.name(),
                    source,
                })?;
        }
        Ok(())
    }
}
