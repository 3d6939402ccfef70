//! 事件投递模型（SerializedEvent）
//!
//! 事件在通知总线上的统一形态：一次分发可以跨越多个聚合类型，
//! 因此以 JSON 载荷加元数据的方式擦除具体事件类型。
//!
use crate::{aggregate_root::AggregateRoot, domain_event::DomainEvent, error::DomainResult};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct SerializedEvent {
    /// 事件唯一标识符
    event_id: String,
    /// 事件类型，用于订阅方路由
    event_type: String,
    /// 事件版本
    event_version: usize,
    /// 聚合 ID，标识事件所属的聚合根实例
    aggregate_id: String,
    /// 聚合类型
    aggregate_type: String,
    /// 事件被收集（分发）的时间
    occurred_at: DateTime<Utc>,
    /// 事件负载
    payload: Value,
}

impl SerializedEvent {
    /// 将聚合上排队的事件转换为投递形态
    pub fn from_domain_event<A>(aggregate: &A, event: &A::Event) -> DomainResult<Self>
    where
        A: AggregateRoot,
    {
        Ok(Self {
            event_id: ulid::Ulid::new().to_string(),
            event_type: event.event_type().to_string(),
            event_version: event.event_version(),
            aggregate_id: aggregate.id().to_string(),
            aggregate_type: A::TYPE.to_string(),
            occurred_at: Utc::now(),
            payload: serde_json::to_value(event)?,
        })
    }

    /// 反序列化回具体事件类型
    pub fn to_domain_event<E>(&self) -> DomainResult<E>
    where
        E: DomainEvent,
    {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> usize {
        self.event_version
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}
