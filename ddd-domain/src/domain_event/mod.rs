//! 领域事件（Domain Event）
//!
//! 定义事件载荷需要实现的最小接口（`DomainEvent`）、默认的通用通知事件
//! `Notification`，以及投递到通知总线的统一形态 `SerializedEvent`。

mod domain_event_trait;
mod notification;
mod serialized_event;

pub use domain_event_trait::DomainEvent;
pub use notification::Notification;
pub use serialized_event::SerializedEvent;
