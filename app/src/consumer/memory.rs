use std::sync::{Arc, Mutex};

use crate::consumer::Consumer;
use crate::sync::SyncEvent;
use utils::error::{Error, Result};

/// 内存消费者 - 保存所有事件，供嵌入方或测试读取
#[derive(Clone, Default)]
pub struct MemoryConsumer {
    events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl MemoryConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已收到事件的副本
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// 取出并清空已收到的事件
    pub fn drain(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Consumer for MemoryConsumer {
    async fn consume(&mut self, event: &SyncEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|e| Error::new(format!("Event buffer poisoned: {}", e)))?
            .push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory_consumer"
    }
}
