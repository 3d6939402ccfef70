//! 存储协作者协议
//!
//! 通用仓储与工作单元对底层存储的全部依赖：
//! - 按聚合类型读取行（`load`/`load_all`）与为瞬态实体分配序列号；
//! - 以原子方式写入一批暂存变更（`flush`）；
//! - 可选的显式事务（`begin_transaction` 返回 `None` 表示不支持）。
//!
//! 错误需按 `DomainError::is_transient` 区分瞬时与永久故障，以便重试策略判断。
//!
use crate::{
    error::DomainResult as Result,
    persist::{SerializedEntity, StagedChange},
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Store: Send + Sync {
    /// 为聚合类型分配下一个序列号（用于生成瞬态实体的标识）
    async fn next_sequence(&self, aggregate_type: &str) -> Result<u64>;

    async fn load(&self, aggregate_type: &str, aggregate_id: &str)
    -> Result<Option<SerializedEntity>>;

    async fn load_all(&self, aggregate_type: &str) -> Result<Vec<SerializedEntity>>;

    /// 原子写入一批变更，返回受影响的行数
    async fn flush(&self, changes: &[StagedChange]) -> Result<usize>;

    /// 开启显式事务；不支持事务的存储返回 `None`
    async fn begin_transaction(&self) -> Result<Option<Box<dyn StoreTransaction>>> {
        Ok(None)
    }
}

/// 显式事务句柄，由单个工作单元独占
#[async_trait]
pub trait StoreTransaction: Send {
    async fn flush(&mut self, changes: &[StagedChange]) -> Result<usize>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
impl<T> Store for Arc<T>
where
    T: Store + ?Sized,
{
    async fn next_sequence(&self, aggregate_type: &str) -> Result<u64> {
        (**self).next_sequence(aggregate_type).await
    }

    async fn load(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<SerializedEntity>> {
        (**self).load(aggregate_type, aggregate_id).await
    }

    async fn load_all(&self, aggregate_type: &str) -> Result<Vec<SerializedEntity>> {
        (**self).load_all(aggregate_type).await
    }

    async fn flush(&self, changes: &[StagedChange]) -> Result<usize> {
        (**self).flush(changes).await
    }

    async fn begin_transaction(&self) -> Result<Option<Box<dyn StoreTransaction>>> {
        (**self).begin_transaction().await
    }
}
