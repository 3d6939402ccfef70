//! 持久化（persist）
//!
//! 定义通用仓储与工作单元所依赖的存储协议及其配套构件：
//! - 行模型与暂存变更（`SerializedEntity`/`StagedChange`）；
//! - 存储协议与可选事务（`Store`/`StoreTransaction`）；
//! - 聚合类型到表的映射（`StoreMapping`）；
//! - 瞬时故障的执行重试策略（`RetryStrategy`）；
//! - 进程内实现（`InMemoryStore`），用于测试与本地开发。
//!
//! 该模块聚焦协议，具体数据库后端由上层实现 `Store` 并注入。
//!
mod mapping;
mod retry;
mod serialized_entity;
mod store;
mod store_inmemory;

pub use mapping::{StoreMapping, TableName};
pub use retry::{Backoff, RetryStrategy};
pub use serialized_entity::{ChangeKind, SerializedEntity, StagedChange};
pub use store::{Store, StoreTransaction};
pub use store_inmemory::{FaultKind, FaultStage, InMemoryStore};
