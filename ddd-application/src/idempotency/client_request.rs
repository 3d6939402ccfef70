use chrono::{DateTime, Utc};
use ddd_domain::{
    aggregate_root::AggregateRoot,
    entity::Identity,
    persist::{StoreMapping, TableName},
};
use ddd_macros::entity;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// 幂等记录的聚合类型名
pub const CLIENT_REQUEST_TYPE: &str = "client_request";

/// 幂等记录：创建一次，从不更新
///
/// `tenant_id`、`correlation_id` 与领域事件队列不写入存储。
#[entity(id = I)]
#[derive(Clone)]
pub struct ClientRequest<I: Identity> {
    pub name: String,
    pub time: DateTime<Utc>,
    #[serde(skip)]
    pub tenant_id: Option<String>,
    #[serde(skip)]
    pub correlation_id: Option<String>,
}

impl<I: Identity> ClientRequest<I> {
    pub fn new(id: I, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            time: Utc::now(),
            ..Default::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_correlation(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

impl<I> AggregateRoot for ClientRequest<I>
where
    I: Identity + Serialize + DeserializeOwned,
{
    const TYPE: &'static str = CLIENT_REQUEST_TYPE;
}

/// 幂等记录表配置，默认 `dbo.Requests`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestTableConfig {
    pub name: String,
    pub schema: Option<String>,
}

impl Default for RequestTableConfig {
    fn default() -> Self {
        Self {
            name: "Requests".to_string(),
            schema: Some("dbo".to_string()),
        }
    }
}

impl RequestTableConfig {
    pub fn table(&self) -> TableName {
        TableName::new(self.name.clone(), self.schema.clone())
    }

    /// 在存储映射中登记幂等记录表
    pub fn register(&self, mapping: StoreMapping) -> StoreMapping {
        mapping.map(CLIENT_REQUEST_TYPE, self.table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddd_domain::{entity::Entity, persist::SerializedEntity};
    use uuid::Uuid;

    #[test]
    fn ignored_fields_are_not_persisted() {
        let request = ClientRequest::new(Uuid::new_v4(), "PlaceOrder")
            .with_tenant(Some("t-1".into()))
            .with_correlation(Some("c-1".into()));

        let row = SerializedEntity::from_aggregate(&request).unwrap();
        let payload = row.payload().as_object().unwrap();
        assert!(payload.contains_key("id"));
        assert!(payload.contains_key("name"));
        assert!(payload.contains_key("time"));
        assert!(!payload.contains_key("tenant_id"));
        assert!(!payload.contains_key("correlation_id"));
        assert!(!payload.contains_key("domain_events"));

        let restored: ClientRequest<Uuid> = row.to_aggregate().unwrap();
        assert_eq!(restored.id(), request.id());
        assert_eq!(restored.name, "PlaceOrder");
        assert_eq!(restored.tenant_id, None);
    }

    #[test]
    fn default_table_is_dbo_requests() {
        let mapping = RequestTableConfig::default().register(StoreMapping::default());
        assert_eq!(mapping.table_for(CLIENT_REQUEST_TYPE).to_string(), "dbo.Requests");
    }
}
