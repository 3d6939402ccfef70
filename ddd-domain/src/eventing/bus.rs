//! 事件总线（EventBus）协议
//!
//! 通知总线只需提供单条发布（发出并等待完成），批量发布默认按顺序逐条执行。
//! 除“每次调用尝试一次”外不承诺任何投递保证。
//!
use crate::{domain_event::SerializedEvent, error::DomainResult as Result};
use async_trait::async_trait;
use std::sync::Arc;

/// 事件总线：负责分发事件
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &SerializedEvent) -> Result<()>;

    async fn publish_batch(&self, events: &[SerializedEvent]) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T> EventBus for Arc<T>
where
    T: EventBus + ?Sized,
{
    async fn publish(&self, event: &SerializedEvent) -> Result<()> {
        (**self).publish(event).await
    }

    async fn publish_batch(&self, events: &[SerializedEvent]) -> Result<()> {
        (**self).publish_batch(events).await
    }
}
