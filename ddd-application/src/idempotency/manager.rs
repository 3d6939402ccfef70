//! 幂等记录管理（RequestManager）
//!
//! 以键值方式提供“按 id 判断是否存在”与“插入新记录”两项能力：
//! - `StoreRequestManager`：经由工作单元写入存储（记录的 id 由客户端给出，
//!   因此直接暂存插入，不经过通用仓储“仅瞬态实体可新增”的约束）；
//! - `InMemoryRequestManager`：基于 `DashMap` 的进程内实现，用于测试与单机场景。
//!
use super::ClientRequest;
use crate::error::AppError;
use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use ddd_domain::{
    aggregate_root::AggregateRoot,
    entity::Identity,
    persist::Store,
    unit_of_work::{TransactionalUnitOfWork, UnitOfWork},
};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::{debug, warn};

#[async_trait]
pub trait RequestManager<I>: Send + Sync
where
    I: Identity,
{
    /// 该请求是否已处理
    async fn exists(&self, id: &I) -> Result<bool, AppError>;

    /// 记录请求已被某命令处理；重复记录时返回 `AppError::AlreadyProcessed`
    async fn create_request_for_command(&self, id: I, command_name: &str) -> Result<(), AppError>;
}

#[async_trait]
impl<I, T> RequestManager<I> for Arc<T>
where
    I: Identity,
    T: RequestManager<I> + ?Sized,
{
    async fn exists(&self, id: &I) -> Result<bool, AppError> {
        (**self).exists(id).await
    }

    async fn create_request_for_command(&self, id: I, command_name: &str) -> Result<(), AppError> {
        (**self).create_request_for_command(id, command_name).await
    }
}

fn already_processed<I: Identity>(id: &I, command_name: &str) -> AppError {
    AppError::AlreadyProcessed {
        request_id: id.to_string(),
        command: command_name.to_string(),
    }
}

/// 基于工作单元的幂等记录管理，创建记录后立即提交
pub struct StoreRequestManager<S> {
    unit_of_work: Arc<TransactionalUnitOfWork<S>>,
}

impl<S> StoreRequestManager<S>
where
    S: Store + 'static,
{
    pub fn new(unit_of_work: Arc<TransactionalUnitOfWork<S>>) -> Self {
        Self { unit_of_work }
    }

    /// 读取已保存的记录
    pub async fn find<I>(&self, id: &I) -> Result<Option<ClientRequest<I>>, AppError>
    where
        I: Identity + Serialize + DeserializeOwned,
    {
        Ok(self.unit_of_work.lookup::<ClientRequest<I>>(id).await?)
    }
}

#[async_trait]
impl<I, S> RequestManager<I> for StoreRequestManager<S>
where
    I: Identity + Serialize + DeserializeOwned,
    S: Store + 'static,
{
    async fn exists(&self, id: &I) -> Result<bool, AppError> {
        Ok(self.find(id).await?.is_some())
    }

    async fn create_request_for_command(&self, id: I, command_name: &str) -> Result<(), AppError> {
        if self.exists(&id).await? {
            return Err(already_processed(&id, command_name));
        }

        debug!(
            aggregate_type = ClientRequest::<I>::TYPE,
            request_id = %id,
            command = command_name,
            "recording client request"
        );
        self.unit_of_work
            .stage_insert(ClientRequest::new(id.clone(), command_name))
            .await?;
        if let Err(err) = self.unit_of_work.save_entities().await {
            // 写入失败时撤销暂存，避免未落盘的记录被视为已处理
            if let Err(revert_err) = self.unit_of_work.revert_insert::<ClientRequest<I>>(&id).await {
                warn!(request_id = %id, error = %revert_err, "failed to revert client request");
            }
            return Err(err.into());
        }
        Ok(())
    }
}

/// 进程内幂等记录管理
pub struct InMemoryRequestManager<I>
where
    I: Identity,
{
    requests: DashMap<I, ClientRequest<I>>,
}

impl<I> Default for InMemoryRequestManager<I>
where
    I: Identity,
{
    fn default() -> Self {
        Self {
            requests: DashMap::new(),
        }
    }
}

impl<I> InMemoryRequestManager<I>
where
    I: Identity,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &I) -> Option<ClientRequest<I>> {
        self.requests.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[async_trait]
impl<I> RequestManager<I> for InMemoryRequestManager<I>
where
    I: Identity,
{
    async fn exists(&self, id: &I) -> Result<bool, AppError> {
        Ok(self.requests.contains_key(id))
    }

    async fn create_request_for_command(&self, id: I, command_name: &str) -> Result<(), AppError> {
        match self.requests.entry(id) {
            Entry::Occupied(e) => Err(already_processed(e.key(), command_name)),
            Entry::Vacant(e) => {
                let request = ClientRequest::new(e.key().clone(), command_name);
                e.insert(request);
                Ok(())
            }
        }
    }
}
