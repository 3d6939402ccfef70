//! 幂等命令处理器装饰器
//!
//! 包装任意 `CommandHandler`：上下文带幂等键时，先查询记录，已处理则直接返回成功；
//! 否则执行内部处理器，成功后写入幂等记录。未带幂等键的命令原样转发。
//!
use super::RequestManager;
use crate::{command::Command, command_handler::CommandHandler, context::AppContext, error::AppError};
use async_trait::async_trait;
use ddd_domain::entity::Identity;
use std::{marker::PhantomData, sync::Arc};
use tracing::{info, warn};

pub struct IdempotentCommandHandler<H, M, I> {
    inner: H,
    requests: Arc<M>,
    _id: PhantomData<fn() -> I>,
}

impl<H, M, I> IdempotentCommandHandler<H, M, I>
where
    M: RequestManager<I>,
    I: Identity,
{
    pub fn new(inner: H, requests: Arc<M>) -> Self {
        Self {
            inner,
            requests,
            _id: PhantomData,
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    fn parse_key(key: &str) -> Result<I, AppError> {
        key.parse::<I>().map_err(|_| AppError::InvalidIdempotencyKey {
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl<C, H, M, I> CommandHandler<C> for IdempotentCommandHandler<H, M, I>
where
    C: Command,
    H: CommandHandler<C>,
    M: RequestManager<I>,
    I: Identity,
{
    async fn handle(&self, ctx: &AppContext, cmd: C) -> Result<(), AppError> {
        let Some(key) = ctx.idempotency_key.as_deref() else {
            return self.inner.handle(ctx, cmd).await;
        };
        let request_id = Self::parse_key(key)?;

        if self.requests.exists(&request_id).await? {
            info!(command = C::NAME, %request_id, "duplicate request ignored");
            return Ok(());
        }

        self.inner.handle(ctx, cmd).await?;

        match self
            .requests
            .create_request_for_command(request_id.clone(), C::NAME)
            .await
        {
            Err(err) if err.is_already_processed() => {
                warn!(command = C::NAME, %request_id, "request recorded concurrently");
                Ok(())
            }
            other => other,
        }
    }
}
