//! 聚合根（AggregateRoot）标记
//!
//! 仅聚合根可以作为通用仓储的操作目标；聚合内部的子实体只能经由聚合根导航访问。
//!
use crate::entity::Entity;
use serde::{Serialize, de::DeserializeOwned};

/// 聚合根能力标记
///
/// 要求可序列化（持久化行）与可克隆（身份映射返回副本）。
/// `TYPE` 为稳定的聚合类型名，同时作为默认表名。
pub trait AggregateRoot: Entity + Clone + Serialize + DeserializeOwned + 'static {
    const TYPE: &'static str;
}
