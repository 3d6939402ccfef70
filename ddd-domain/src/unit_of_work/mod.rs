//! 工作单元（Unit of Work）
//!
//! 将一个或多个仓储的暂存变更作为单个原子提交写入存储，随后触发领域事件分发：
//! 1. 已取消则直接返回 `Cancelled`；
//! 2. 在重试策略下执行写入：支持事务的存储按 begin → flush → commit，
//!    失败或提交前被取消时回滚；不支持事务时 flush 即唯一原子单元；
//! 3. 写入成功后接受变更，再（如配置了分发器）分发领域事件。
//!
//! 事件发布失败不会回滚已提交的数据，但会以 `DomainError::Publish` 返回给调用方。
//!
mod change_tracker;

pub use change_tracker::{ChangeTracker, EntryState};

use crate::{
    aggregate_root::AggregateRoot,
    config::PersistenceConfig,
    entity::{Entity, Identity},
    error::{DomainError, DomainResult},
    eventing::{DomainEventDispatcher, EventBus},
    persist::{RetryStrategy, StagedChange, Store, StoreTransaction},
};
use async_trait::async_trait;
use bon::Builder;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// 提交全部暂存变更并分发领域事件
    async fn save_entities(&self) -> DomainResult<bool>;

    /// 仅分发领域事件，返回发布的事件数（未配置分发器时为 0）
    async fn dispatch_domain_events(&self) -> DomainResult<usize>;

    /// 本工作单元的取消信号
    fn cancellation_token(&self) -> &CancellationToken;
}

/// 基于 `Store` 的工作单元实现，由单个逻辑请求独占
#[derive(Builder)]
pub struct TransactionalUnitOfWork<S> {
    store: S,
    dispatcher: Option<DomainEventDispatcher>,
    #[builder(default)]
    retry: RetryStrategy,
    #[builder(default)]
    cancellation: CancellationToken,
    #[builder(skip)]
    tracker: Mutex<ChangeTracker>,
}

impl<S> TransactionalUnitOfWork<S>
where
    S: Store,
{
    /// 按配置装配；`dispatch_events` 为 false 或未提供总线时不分发事件
    pub fn from_config(
        store: S,
        bus: Option<Arc<dyn EventBus>>,
        config: &PersistenceConfig,
    ) -> DomainResult<Self> {
        config.validate()?;
        let dispatcher = bus
            .filter(|_| config.dispatch_events)
            .map(DomainEventDispatcher::new);
        Ok(Self::builder()
            .store(store)
            .maybe_dispatcher(dispatcher)
            .retry(config.retry_strategy())
            .build())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(DomainError::Cancelled);
        }
        Ok(())
    }

    /// 读取一个实体：被跟踪的实例优先，已暂存删除的不可见；
    /// 未跟踪时从存储加载并以 `Unchanged` 状态纳入跟踪
    pub async fn lookup<A>(&self, id: &A::Id) -> DomainResult<Option<A>>
    where
        A: AggregateRoot,
    {
        self.ensure_active()?;
        let mut tracker = self.tracker.lock().await;
        if let Some(entry) = tracker.set::<A>().and_then(|s| s.find(id)) {
            return Ok(entry.state.is_visible().then(|| entry.entity.clone()));
        }

        let Some(row) = self.store.load(A::TYPE, &id.to_string()).await? else {
            return Ok(None);
        };
        let entity: A = row.to_aggregate()?;
        tracker
            .set_mut::<A>()?
            .push(entity.clone(), EntryState::Unchanged);
        Ok(Some(entity))
    }

    /// 读取某类型的全部实体：存储中的行按存储顺序，其后是尚未落盘的新增实体
    pub async fn lookup_all<A>(&self) -> DomainResult<Vec<A>>
    where
        A: AggregateRoot,
    {
        self.ensure_active()?;
        let rows = self.store.load_all(A::TYPE).await?;
        let mut tracker = self.tracker.lock().await;
        let set = tracker.set_mut::<A>()?;

        let mut out = Vec::with_capacity(rows.len());
        let mut seen = std::collections::HashSet::new();
        for row in rows {
            let loaded: A = row.to_aggregate()?;
            let id = loaded.id().clone();
            match set.find(&id) {
                Some(entry) if entry.state.is_visible() => out.push(entry.entity.clone()),
                Some(_) => {}
                None => {
                    set.push(loaded.clone(), EntryState::Unchanged);
                    out.push(loaded);
                }
            }
            seen.insert(id);
        }
        out.extend(
            set.entries()
                .filter(|e| e.state == EntryState::Added && !seen.contains(e.entity.id()))
                .map(|e| e.entity.clone()),
        );
        Ok(out)
    }

    /// 为瞬态实体分配标识
    pub async fn next_id<A>(&self) -> DomainResult<A::Id>
    where
        A: AggregateRoot,
    {
        self.ensure_active()?;
        let sequence = self.store.next_sequence(A::TYPE).await?;
        A::Id::generate(sequence)
    }

    /// 暂存插入；实体必须已有标识
    pub async fn stage_insert<A>(&self, entity: A) -> DomainResult<()>
    where
        A: AggregateRoot,
    {
        self.ensure_active()?;
        if entity.is_transient() {
            return Err(DomainError::invalid_state(format!(
                "cannot stage {} without an id",
                A::TYPE
            )));
        }

        let mut tracker = self.tracker.lock().await;
        let set = tracker.set_mut::<A>()?;
        match set.find_mut(entity.id()) {
            Some(entry) if entry.state.is_visible() => Err(DomainError::invalid_state(format!(
                "{} {} is already tracked",
                A::TYPE,
                entity.id()
            ))),
            Some(entry) => {
                // 同一工作单元内先删后加：存储中仍有该行，按更新处理
                let state = if entry.state == EntryState::Deleted {
                    EntryState::Modified
                } else {
                    EntryState::Added
                };
                entry.replace_entity(entity);
                entry.state = state;
                Ok(())
            }
            None => {
                debug!(aggregate_type = A::TYPE, id = %entity.id(), "staged insert");
                set.push(entity, EntryState::Added);
                Ok(())
            }
        }
    }

    /// 暂存更新：以传入实例覆盖被跟踪实例的字段
    ///
    /// 被跟踪实例尚未发布的事件保留，传入实例新增的事件追加其后。
    pub async fn stage_update<A>(&self, entity: A) -> DomainResult<()>
    where
        A: AggregateRoot,
    {
        self.ensure_active()?;
        let mut tracker = self.tracker.lock().await;
        let set = tracker.set_mut::<A>()?;
        let Some(entry) = set.find_mut(entity.id()).filter(|e| e.state.is_visible()) else {
            return Err(DomainError::not_found(format!("{} {}", A::TYPE, entity.id())));
        };

        if entry.state == EntryState::Unchanged {
            entry.state = EntryState::Modified;
        }
        debug!(aggregate_type = A::TYPE, id = %entity.id(), "staged update");
        entry.replace_entity(entity);
        Ok(())
    }

    /// 暂存删除；尚未落盘的新增实体直接脱离跟踪
    pub async fn stage_delete<A>(&self, id: &A::Id) -> DomainResult<()>
    where
        A: AggregateRoot,
    {
        self.ensure_active()?;
        let mut tracker = self.tracker.lock().await;
        let set = tracker.set_mut::<A>()?;
        let Some(entry) = set.find_mut(id).filter(|e| e.state.is_visible()) else {
            return Err(DomainError::not_found(format!("{} {}", A::TYPE, id)));
        };

        debug!(aggregate_type = A::TYPE, %id, "staged delete");
        if entry.state == EntryState::Added {
            set.remove(id);
        } else {
            entry.state = EntryState::Deleted;
        }
        Ok(())
    }

    /// 撤销尚未落盘的插入，返回是否撤销
    ///
    /// 只移除 `Added` 状态的条目，不检查取消信号，供提交失败后的清理使用。
    pub async fn revert_insert<A>(&self, id: &A::Id) -> DomainResult<bool>
    where
        A: AggregateRoot,
    {
        let mut tracker = self.tracker.lock().await;
        let set = tracker.set_mut::<A>()?;
        if set.find(id).is_some_and(|e| e.state == EntryState::Added) {
            debug!(aggregate_type = A::TYPE, %id, "reverted staged insert");
            set.remove(id);
            return Ok(true);
        }
        Ok(false)
    }

    /// 被跟踪实体的当前状态
    pub async fn entry_state<A>(&self, id: &A::Id) -> Option<EntryState>
    where
        A: AggregateRoot,
    {
        self.tracker.lock().await.state_of::<A>(id)
    }

    /// 当前待提交的变更
    pub async fn staged_changes(&self) -> DomainResult<Vec<StagedChange>> {
        self.tracker.lock().await.staged_changes()
    }

    /// 丢弃全部跟踪状态（含未发布的事件）
    pub async fn discard_changes(&self) {
        self.tracker.lock().await.clear();
    }

    async fn persist(&self, changes: &[StagedChange], attempt: usize) -> DomainResult<usize> {
        let Some(mut tx) = self.store.begin_transaction().await? else {
            self.ensure_active()?;
            return self.store.flush(changes).await;
        };

        let flushed = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(DomainError::Cancelled),
            result = tx.flush(changes) => result,
        };

        match flushed {
            Ok(affected) if !self.cancellation.is_cancelled() => {
                // 提交一旦发出便不再响应取消
                tx.commit().await?;
                Ok(affected)
            }
            Ok(_) => {
                self.rollback(tx, attempt).await;
                Err(DomainError::Cancelled)
            }
            Err(err) => {
                self.rollback(tx, attempt).await;
                Err(err)
            }
        }
    }

    async fn rollback(&self, tx: Box<dyn StoreTransaction>, attempt: usize) {
        match tx.rollback().await {
            Ok(()) => warn!(attempt, "transaction rolled back"),
            Err(err) => warn!(attempt, error = %err, "transaction rollback failed"),
        }
    }
}

#[async_trait]
impl<S> UnitOfWork for TransactionalUnitOfWork<S>
where
    S: Store,
{
    async fn save_entities(&self) -> DomainResult<bool> {
        self.ensure_active()?;
        let mut tracker = self.tracker.lock().await;
        let changes = tracker.staged_changes()?;

        let staged = changes.as_slice();
        let affected = self
            .retry
            .execute(&self.cancellation, move |attempt| self.persist(staged, attempt))
            .await?;
        tracker.accept_changes();
        info!(changes = changes.len(), affected, "unit of work committed");

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.dispatch(&mut tracker).await?;
        }
        Ok(true)
    }

    async fn dispatch_domain_events(&self) -> DomainResult<usize> {
        let Some(dispatcher) = &self.dispatcher else {
            return Ok(0);
        };
        let mut tracker = self.tracker.lock().await;
        dispatcher.dispatch(&mut tracker).await
    }

    fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}
