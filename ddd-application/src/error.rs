use ddd_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("request already processed: id={request_id}, command={command}")]
    AlreadyProcessed { request_id: String, command: String },

    #[error("invalid idempotency key: {key}")]
    InvalidIdempotencyKey { key: String },
}

impl AppError {
    /// 是否为重复请求
    pub fn is_already_processed(&self) -> bool {
        matches!(self, AppError::AlreadyProcessed { .. })
    }
}
