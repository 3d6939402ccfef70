//! DDD 领域层基础库（ddd-domain）
//!
//! 提供“仓储 + 工作单元”模式下的通用持久化构件：
//! - 实体（`entity`）与聚合根（`aggregate_root`）建模，含待发布领域事件队列
//! - 领域事件（`domain_event`）与统一投递形态 `SerializedEvent`
//! - 规约（`specification`）与持久化前的校验链（`validation`）
//! - 存储协议、表映射、重试策略与内存实现（`persist`）
//! - 工作单元（`unit_of_work`）：原子提交、瞬时故障重试、提交后分发事件
//! - 通用仓储（`repository`）：带校验的类型化 CRUD，只暂存不提交
//! - 事件总线与领域事件分发器（`eventing`）
//! - 持久化配置（`config`）
//!
//! 本 crate 不绑定具体存储与传输实现，实现 `Store` 与 `EventBus` 即可对接任意基础设施。
//!
//! 典型用法：
//! 1. 用 `#[entity]` 定义聚合并实现 `AggregateRoot`；
//! 2. 以 `Store` 实现构建 `TransactionalUnitOfWork`，按需配置事件分发器；
//! 3. 通过 `GenericRepository` 暂存新增/更新/删除；
//! 4. 调用 `save_entities` 提交并发布领域事件。
//!
pub mod aggregate_root;
pub mod config;
pub mod domain_event;
pub mod entity;
pub mod error;
pub mod eventing;
pub mod persist;
pub mod repository;
pub mod specification;
pub mod unit_of_work;
pub mod validation;

// 允许在本 crate 内部通过 ::ddd_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::ddd_domain 路径。
extern crate self as ddd_domain;
