//! 领域事件分发器（DomainEventDispatcher）
//!
//! 从变更跟踪中收集所有非空事件队列，逐条发布到通知总线（等待每次发布完成后再发下一条），
//! 全部发布成功后才统一清空被涉及实体的队列。任一发布失败时所有队列保持原样，
//! 重试时可能重复发布（至少一次），但不会静默丢失事件。
//!
use crate::{
    error::{DomainError, DomainResult},
    eventing::EventBus,
    unit_of_work::ChangeTracker,
};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct DomainEventDispatcher {
    bus: Arc<dyn EventBus>,
}

impl DomainEventDispatcher {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    /// 分发并清空，返回发布的事件数
    pub async fn dispatch(&self, tracker: &mut ChangeTracker) -> DomainResult<usize> {
        let events = tracker.pending_events()?;
        if events.is_empty() {
            debug!("no pending domain events");
            return Ok(0);
        }

        for event in &events {
            self.bus
                .publish(event)
                .await
                .map_err(|e| DomainError::Publish {
                    event_type: event.event_type().to_string(),
                    reason: e.to_string(),
                })?;
            debug!(
                event_type = event.event_type(),
                aggregate_type = event.aggregate_type(),
                aggregate_id = event.aggregate_id(),
                "domain event published"
            );
        }

        let touched = tracker.clear_events();
        info!(published = events.len(), entities = touched, "domain events dispatched");
        Ok(events.len())
    }
}
