//! 领域层统一错误定义
//!
//! 覆盖参数/状态校验、业务规则校验、持久化（瞬时与永久故障）、事件发布与取消等，
//! 便于在仓储、工作单元与应用层之间统一传播与分类。
//!
use crate::validation::Violation;
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 参数/状态 ---
    #[error("null argument: {name}")]
    NullArgument { name: &'static str },
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },

    // --- 业务规则 ---
    #[error("validation failed: {}", format_violations(.violations))]
    Validation { violations: Vec<Violation> },

    // --- 持久化 ---
    #[error("transient infrastructure error: {reason}")]
    TransientInfrastructure { reason: String },
    #[error("persistence error: {reason}")]
    Persistence { reason: String },
    #[error("retries exhausted after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: usize, reason: String },

    // --- 事件系统 ---
    #[error("publish failed: event_type={event_type}, reason={reason}")]
    Publish { event_type: String, reason: String },
    #[error("event bus error: {reason}")]
    EventBus { reason: String },

    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("parse error: {reason}")]
    Parse { reason: String },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 通用 ---
    #[error("configuration error: {reason}")]
    Configuration { reason: String },
    #[error("operation cancelled")]
    Cancelled,
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn not_found(reason: impl Into<String>) -> Self {
        DomainError::NotFound {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        DomainError::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        DomainError::TransientInfrastructure {
            reason: reason.into(),
        }
    }

    pub fn persistence(reason: impl Into<String>) -> Self {
        DomainError::Persistence {
            reason: reason.into(),
        }
    }

    pub fn event_bus(reason: impl Into<String>) -> Self {
        DomainError::EventBus {
            reason: reason.into(),
        }
    }

    /// 是否为可自动重试的瞬时基础设施故障
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::TransientInfrastructure { .. })
    }

    /// 是否为致命的持久化错误（含重试耗尽）
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            DomainError::Persistence { .. } | DomainError::RetriesExhausted { .. }
        )
    }

    /// 校验失败时返回完整的违规列表
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            DomainError::Validation { violations } => Some(violations),
            _ => None,
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::Parse {
            reason: err.to_string(),
        }
    }
}

impl From<std::num::ParseIntError> for DomainError {
    fn from(err: std::num::ParseIntError) -> Self {
        DomainError::Parse {
            reason: err.to_string(),
        }
    }
}

// ---- 基础设施错误分类 ----
// 连接中断、连接池超时、死锁牺牲者与序列化冲突视为瞬时故障，其余为永久故障。

#[cfg(feature = "infra-sqlx")]
const TRANSIENT_SQLSTATES: &[&str] = &["40001", "40P01", "08000", "08003", "08006", "57P01"];

#[cfg(feature = "infra-sqlx")]
impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::not_found("row not found"),
            sqlx::Error::Io(e) => DomainError::transient(e.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DomainError::transient(err.to_string())
            }
            sqlx::Error::Database(db) => {
                let transient = db
                    .code()
                    .map(|code| TRANSIENT_SQLSTATES.contains(&&*code))
                    .unwrap_or(false);
                if transient {
                    DomainError::transient(db.to_string())
                } else {
                    DomainError::persistence(db.to_string())
                }
            }
            other => DomainError::persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(DomainError::transient("connection reset").is_transient());
        assert!(!DomainError::persistence("unique violation").is_transient());
        assert!(DomainError::persistence("unique violation").is_persistence());
        assert!(
            DomainError::RetriesExhausted {
                attempts: 3,
                reason: "deadlock".into()
            }
            .is_persistence()
        );
        assert!(!DomainError::not_found("x").is_transient());
        assert!(!DomainError::Cancelled.is_persistence());
    }

    #[test]
    fn validation_message_lists_every_violation() {
        let err = DomainError::Validation {
            violations: vec![
                Violation::new("name", "too short"),
                Violation::new("email", "required"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("name: too short"));
        assert!(msg.contains("email: required"));
        assert_eq!(err.violations().map(|v| v.len()), Some(2));
    }

    #[cfg(feature = "infra-sqlx")]
    #[test]
    fn sqlx_errors_are_classified() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(DomainError::from(io).is_transient());
        assert!(DomainError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(matches!(
            DomainError::from(sqlx::Error::RowNotFound),
            DomainError::NotFound { .. }
        ));
    }
}
