//! 通用仓储（Repository）
//!
//! 面向单一聚合类型的 CRUD 操作，只负责校验与暂存，不会自行提交；
//! 持久化由所属工作单元的 `save_entities` 显式完成。
//! 批量操作与单条操作的语义一致，且先检查全部元素再暂存，任一元素失败则什么都不暂存。
//!
use crate::{
    aggregate_root::AggregateRoot,
    entity::{Entity, Identity},
    error::{DomainError, DomainResult},
    persist::Store,
    specification::Specification,
    unit_of_work::{TransactionalUnitOfWork, UnitOfWork},
    validation::ValidatorChain,
};
use async_trait::async_trait;
use bon::Builder;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait Repository<A>: Send + Sync
where
    A: AggregateRoot,
{
    /// 所属工作单元
    fn unit_of_work(&self) -> Arc<dyn UnitOfWork>;

    async fn find_by_id(&self, id: &A::Id) -> DomainResult<Option<A>>;

    /// 与 `find_by_id` 相同，但不存在时返回 `NotFound`
    async fn get_by_id(&self, id: &A::Id) -> DomainResult<A> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("{} {}", A::TYPE, id)))
    }

    async fn first_or_default(&self, spec: &dyn Specification<A>) -> DomainResult<Option<A>>;

    async fn filter(&self, spec: &dyn Specification<A>) -> DomainResult<Vec<A>>;

    async fn list(&self) -> DomainResult<Vec<A>>;

    /// 暂存新增；已有标识的实体为静默空操作。返回实体标识
    async fn add(&self, entity: A) -> DomainResult<A::Id>;

    async fn add_range(&self, entities: Vec<A>) -> DomainResult<Vec<A::Id>>;

    async fn remove(&self, id: &A::Id) -> DomainResult<()>;

    async fn remove_range(&self, ids: &[A::Id]) -> DomainResult<()>;

    /// 以传入实体整体替换已持久化的实体
    async fn update(&self, entity: A) -> DomainResult<()>;

    async fn update_range(&self, entities: Vec<A>) -> DomainResult<()>;
}

/// 基于工作单元与校验链的通用仓储实现
#[derive(Builder)]
pub struct GenericRepository<A, S>
where
    A: AggregateRoot,
{
    unit_of_work: Arc<TransactionalUnitOfWork<S>>,
    #[builder(default)]
    validators: ValidatorChain<A>,
}

impl<A, S> GenericRepository<A, S>
where
    A: AggregateRoot,
    S: Store + 'static,
{
    pub fn new(unit_of_work: Arc<TransactionalUnitOfWork<S>>) -> Self {
        Self {
            unit_of_work,
            validators: ValidatorChain::default(),
        }
    }

    pub fn validators(&self) -> &ValidatorChain<A> {
        &self.validators
    }

    async fn check_update(&self, entity: &A) -> DomainResult<()> {
        if entity.is_transient() {
            return Err(DomainError::invalid_state(format!(
                "cannot update a transient {}",
                A::TYPE
            )));
        }
        if self.unit_of_work.lookup::<A>(entity.id()).await?.is_none() {
            return Err(DomainError::not_found(format!("{} {}", A::TYPE, entity.id())));
        }
        self.validators.validate(entity)
    }

    async fn check_remove(&self, id: &A::Id) -> DomainResult<()> {
        if id.is_default() {
            return Err(DomainError::NullArgument { name: "id" });
        }
        if self.unit_of_work.lookup::<A>(id).await?.is_none() {
            return Err(DomainError::not_found(format!("{} {}", A::TYPE, id)));
        }
        Ok(())
    }

    async fn stage_new(&self, mut entity: A) -> DomainResult<A::Id> {
        let id = self.unit_of_work.next_id::<A>().await?;
        entity.set_id(id.clone());
        self.unit_of_work.stage_insert(entity).await?;
        Ok(id)
    }
}

#[async_trait]
impl<A, S> Repository<A> for GenericRepository<A, S>
where
    A: AggregateRoot,
    S: Store + 'static,
{
    fn unit_of_work(&self) -> Arc<dyn UnitOfWork> {
        self.unit_of_work.clone()
    }

    async fn find_by_id(&self, id: &A::Id) -> DomainResult<Option<A>> {
        debug!(aggregate_type = A::TYPE, %id, "find by id");
        self.unit_of_work.lookup::<A>(id).await
    }

    async fn first_or_default(&self, spec: &dyn Specification<A>) -> DomainResult<Option<A>> {
        let all = self.unit_of_work.lookup_all::<A>().await?;
        Ok(all.into_iter().find(|e| spec.is_satisfied_by(e)))
    }

    async fn filter(&self, spec: &dyn Specification<A>) -> DomainResult<Vec<A>> {
        let all = self.unit_of_work.lookup_all::<A>().await?;
        let matched: Vec<A> = all.into_iter().filter(|e| spec.is_satisfied_by(e)).collect();
        debug!(aggregate_type = A::TYPE, matched = matched.len(), "filter");
        Ok(matched)
    }

    async fn list(&self) -> DomainResult<Vec<A>> {
        self.unit_of_work.lookup_all::<A>().await
    }

    async fn add(&self, entity: A) -> DomainResult<A::Id> {
        if !entity.is_transient() {
            debug!(aggregate_type = A::TYPE, id = %entity.id(), "add skipped: entity already has an id");
            return Ok(entity.id().clone());
        }
        self.validators.validate(&entity)?;
        let id = self.stage_new(entity).await?;
        debug!(aggregate_type = A::TYPE, %id, "added");
        Ok(id)
    }

    async fn add_range(&self, entities: Vec<A>) -> DomainResult<Vec<A::Id>> {
        for entity in entities.iter().filter(|e| e.is_transient()) {
            self.validators.validate(entity)?;
        }

        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            if entity.is_transient() {
                ids.push(self.stage_new(entity).await?);
            } else {
                ids.push(entity.id().clone());
            }
        }
        debug!(aggregate_type = A::TYPE, count = ids.len(), "added range");
        Ok(ids)
    }

    async fn remove(&self, id: &A::Id) -> DomainResult<()> {
        self.check_remove(id).await?;
        self.unit_of_work.stage_delete::<A>(id).await
    }

    async fn remove_range(&self, ids: &[A::Id]) -> DomainResult<()> {
        for id in ids {
            self.check_remove(id).await?;
        }
        for id in ids {
            self.unit_of_work.stage_delete::<A>(id).await?;
        }
        Ok(())
    }

    async fn update(&self, entity: A) -> DomainResult<()> {
        self.check_update(&entity).await?;
        self.unit_of_work.stage_update(entity).await
    }

    async fn update_range(&self, entities: Vec<A>) -> DomainResult<()> {
        for entity in &entities {
            self.check_update(entity).await?;
        }
        for entity in entities {
            self.unit_of_work.stage_update(entity).await?;
        }
        Ok(())
    }
}
