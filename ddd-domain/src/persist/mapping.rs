//! 存储映射（StoreMapping）
//!
//! 聚合类型到表名的显式映射，在存储初始化时作为配置值传入，
//! 未显式映射的聚合使用 `默认 schema + 聚合类型名`。
//!
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// 带可选 schema 的表名
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(name: impl Into<String>, schema: Option<String>) -> Self {
        Self {
            schema,
            name: name.into(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreMapping {
    default_schema: Option<String>,
    tables: HashMap<String, TableName>,
}

impl StoreMapping {
    pub fn new(default_schema: Option<String>) -> Self {
        Self {
            default_schema,
            tables: HashMap::new(),
        }
    }

    /// 为聚合类型指定表（链式）
    pub fn map(mut self, aggregate_type: impl Into<String>, table: TableName) -> Self {
        self.tables.insert(aggregate_type.into(), table);
        self
    }

    pub fn insert(&mut self, aggregate_type: impl Into<String>, table: TableName) {
        self.tables.insert(aggregate_type.into(), table);
    }

    pub fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    /// 解析聚合类型对应的表
    pub fn table_for(&self, aggregate_type: &str) -> TableName {
        match self.tables.get(aggregate_type) {
            Some(table) => table.clone(),
            None => TableName::new(aggregate_type, self.default_schema.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_mapping_wins_over_default_schema() {
        let mapping = StoreMapping::new(Some("dbo".into()))
            .map("client_request", TableName::new("Requests", Some("idem".into())));

        assert_eq!(mapping.table_for("client_request").to_string(), "idem.Requests");
        assert_eq!(mapping.table_for("order").to_string(), "dbo.order");
        assert_eq!(StoreMapping::default().table_for("order").to_string(), "order");
    }
}
