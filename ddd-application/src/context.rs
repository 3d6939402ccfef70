/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用所需的横切信息，例如：
/// - 链路追踪 `correlation_id` 与租户 `tenant_id`；
/// - 幂等键（`idempotency_key`）：客户端为一次命令生成的请求标识，
///   由 `IdempotentCommandHandler` 用于拒绝重放。
///
/// 典型用法：
/// ```rust
/// use ddd_application::context::AppContext;
///
/// let ctx = AppContext {
///     correlation_id: Some("cor-123".into()),
///     tenant_id: None,
///     idempotency_key: Some("5f0c3a52-5d4c-4d8e-9f55-0b1f7a1f6f3e".into()),
/// };
/// assert!(ctx.idempotency_key.is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    /// 关联追踪 ID
    pub correlation_id: Option<String>,
    /// 租户 ID
    pub tenant_id: Option<String>,
    /// 幂等键（可选）：为空则不参与幂等检查
    pub idempotency_key: Option<String>,
}

impl AppContext {
    pub fn with_idempotency_key(key: impl Into<String>) -> Self {
        Self {
            idempotency_key: Some(key.into()),
            ..Self::default()
        }
    }
}
