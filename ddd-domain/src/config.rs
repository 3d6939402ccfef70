//! 持久化配置（PersistenceConfig）
//!
//! 可由 JSON/TOML 等任意 serde 格式反序列化，缺省字段取默认值；
//! 时长以毫秒表示。经 `validate` 校验后转换为 `StoreMapping` 与 `RetryStrategy`。
//!
use crate::{
    error::{DomainError, DomainResult},
    persist::{Backoff, RetryStrategy, StoreMapping, TableName},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub mapping: MappingConfig,
    pub retry: RetryConfig,
    /// 为 false 时工作单元不分发领域事件（迁移、测试场景）
    pub dispatch_events: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            mapping: MappingConfig::default(),
            retry: RetryConfig::default(),
            dispatch_events: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub default_schema: Option<String>,
    /// 聚合类型 -> 表
    pub tables: HashMap<String, TableName>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            default_schema: Some("dbo".to_string()),
            tables: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retry_count: usize,
    pub base_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_count: 10,
            base_delay_ms: 1_000,
            max_retry_delay_ms: 30_000,
            backoff: Backoff::Exponential,
        }
    }
}

impl PersistenceConfig {
    pub fn from_json(raw: &str) -> DomainResult<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|e| DomainError::Configuration {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.retry.max_retry_delay_ms < self.retry.base_delay_ms {
            return Err(DomainError::Configuration {
                reason: format!(
                    "retry.max_retry_delay_ms ({}) must not be less than retry.base_delay_ms ({})",
                    self.retry.max_retry_delay_ms, self.retry.base_delay_ms
                ),
            });
        }
        if let Some(schema) = &self.mapping.default_schema
            && schema.trim().is_empty()
        {
            return Err(DomainError::Configuration {
                reason: "mapping.default_schema must not be blank".to_string(),
            });
        }
        for (aggregate_type, table) in &self.mapping.tables {
            if table.name.trim().is_empty() {
                return Err(DomainError::Configuration {
                    reason: format!("table name for '{aggregate_type}' must not be blank"),
                });
            }
        }
        Ok(())
    }

    pub fn store_mapping(&self) -> StoreMapping {
        let mut mapping = StoreMapping::new(self.mapping.default_schema.clone());
        for (aggregate_type, table) in &self.mapping.tables {
            mapping.insert(aggregate_type.clone(), table.clone());
        }
        mapping
    }

    pub fn retry_strategy(&self) -> RetryStrategy {
        RetryStrategy {
            max_retry_count: self.retry.max_retry_count,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_retry_delay: Duration::from_millis(self.retry.max_retry_delay_ms),
            backoff: self.retry.backoff,
        }
    }
}
