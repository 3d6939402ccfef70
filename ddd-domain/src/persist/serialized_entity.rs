use crate::{
    aggregate_root::AggregateRoot,
    error::{DomainError, DomainResult as Result},
};
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 聚合在存储中的行形态（领域事件队列不参与序列化）
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct SerializedEntity {
    aggregate_id: String,
    aggregate_type: String,
    payload: Value,
}

impl SerializedEntity {
    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// 将行反序列化为聚合实例
    pub fn to_aggregate<A>(&self) -> Result<A>
    where
        A: AggregateRoot,
    {
        if A::TYPE != self.aggregate_type {
            return Err(DomainError::TypeMismatch {
                expected: A::TYPE.to_string(),
                found: self.aggregate_type.clone(),
            });
        }

        let aggregate = serde_json::from_value(self.payload.clone())?;
        Ok(aggregate)
    }

    /// 从聚合实例创建行
    pub fn from_aggregate<A>(aggregate: &A) -> Result<Self>
    where
        A: AggregateRoot,
    {
        Ok(Self {
            aggregate_id: aggregate.id().to_string(),
            aggregate_type: A::TYPE.to_string(),
            payload: serde_json::to_value(aggregate)?,
        })
    }
}

/// 暂存变更的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// 一次提交中待写入存储的单条变更
#[derive(Debug, Clone, PartialEq)]
pub struct StagedChange {
    pub kind: ChangeKind,
    pub row: SerializedEntity,
}

impl StagedChange {
    pub fn insert(row: SerializedEntity) -> Self {
        Self {
            kind: ChangeKind::Insert,
            row,
        }
    }

    pub fn update(row: SerializedEntity) -> Self {
        Self {
            kind: ChangeKind::Update,
            row,
        }
    }

    pub fn delete(row: SerializedEntity) -> Self {
        Self {
            kind: ChangeKind::Delete,
            row,
        }
    }
}
