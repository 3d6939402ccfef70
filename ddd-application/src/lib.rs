//! DDD 应用层（ddd-application）
//!
//! - 命令与命令处理器（`command`/`command_handler`）
//! - 应用层上下文（`context`），承载幂等键与链路信息
//! - 请求幂等（`idempotency`）：`ClientRequest` 记录、`RequestManager` 协议及其
//!   基于工作单元与内存的实现，以及幂等命令处理器装饰器
//!
pub mod command;
pub mod command_handler;
pub mod context;
pub mod error;
pub mod idempotency;

pub use idempotency::{
    ClientRequest, IdempotentCommandHandler, InMemoryRequestManager, RequestManager,
    RequestTableConfig, StoreRequestManager,
};
