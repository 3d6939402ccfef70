use super::DomainEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 通用通知事件：事件类型 + 任意 JSON 载荷
///
/// 未声明专用事件枚举的实体默认使用该类型。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event_type: String,
    pub payload: Value,
}

impl Notification {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

impl DomainEvent for Notification {
    fn event_type(&self) -> &str {
        &self.event_type
    }
}
