//! DDD 过程宏（ddd-macros）
//!
//! - `#[entity]`：为具名字段结构体注入 `id` 与（不参与序列化的）`domain_events` 字段，
//!   并实现 `::ddd_domain::entity::Entity`；
//! - `#[entity_id]`：为单字段 tuple struct 形式的标识类型实现 `Identity` 及常用转换；
//! - `#[domain_event]`：为事件枚举实现 `::ddd_domain::domain_event::DomainEvent`。
//!
use proc_macro::TokenStream;

mod domain_event;
mod entity;
mod entity_id;
mod utils;

/// 实体宏
/// - 参数：`#[entity(id = IdType, event = EventType, debug = true|false)]`
/// - `id` 默认 `String`，`event` 默认 `::ddd_domain::domain_event::Notification`
#[proc_macro_attribute]
pub fn entity(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity::expand(attr, item)
}

/// 实体 ID 宏，仅支持单字段 tuple struct，例如 `struct OrderId(Uuid);`
#[proc_macro_attribute]
pub fn entity_id(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity_id::expand(attr, item)
}

/// 领域事件宏
/// - 枚举级：`#[domain_event(version = N)]` 指定默认事件版本（默认 1）
/// - 变体级：`#[event(event_type = "...", event_version = N)]` 覆写类型名与版本
#[proc_macro_attribute]
pub fn domain_event(attr: TokenStream, item: TokenStream) -> TokenStream {
    domain_event::expand(attr, item)
}
