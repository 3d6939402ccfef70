//! 请求幂等（Idempotency）
//!
//! 每个被接受的命令对应一条 `ClientRequest` 记录，表示“该命令已执行过”。
//! 应用层在调用仓储之前先查询记录是否存在，以拒绝重放的命令。
//!
mod client_request;
mod handler;
mod manager;

pub use client_request::{CLIENT_REQUEST_TYPE, ClientRequest, RequestTableConfig};
pub use handler::IdempotentCommandHandler;
pub use manager::{InMemoryRequestManager, RequestManager, StoreRequestManager};
