//! 事件子系统（eventing）
//!
//! - `EventBus`：通知总线协议；
//! - `InMemoryEventBus`：基于 broadcast 的进程内实现；
//! - `DomainEventDispatcher`：提交成功后收集、发布并清空领域事件。
//!
mod bus;
mod bus_inmemory;
mod dispatcher;

pub use bus::EventBus;
pub use bus_inmemory::InMemoryEventBus;
pub use dispatcher::DomainEventDispatcher;
