//! 积分账本服务错误类型
//!
//! 定义服务层的业务错误和系统错误

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// 积分账本错误类型
#[derive(Debug, Error)]
pub enum LedgerError {
    // === 身份错误 ===
    #[error("未授权: {0}")]
    Unauthorized(String),

    // === 校验错误 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("订单号校验失败: {0}")]
    InvalidOrderNumber(String),

    // === 冲突错误 ===
    #[error("订单已存在: number={number}, owner={owner_id}")]
    OrderAlreadyExists { number: String, owner_id: Uuid },

    /// 唯一约束冲突（并发插入中落败的一方）
    #[error("重复的订单号: {0}")]
    DuplicateOrder(String),

    #[error("订单已被其他用户上传: {0}")]
    OrderOwnedByAnotherUser(String),

    // === 资源不存在 ===
    #[error("订单不存在: {0}")]
    OrderNotFound(String),

    #[error("积分账户不存在: user_id={0}")]
    ScoreNotFound(Uuid),

    // === 余额错误 ===
    #[error("积分余额不足: 请求 {requested}, 可用 {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    // === 外部积分系统错误 ===
    #[error("积分系统调用失败: {0}")]
    Integration(String),

    #[error("积分系统暂不可用: {0}")]
    IntegrationUnavailable(String),

    #[error("积分系统调用超时")]
    IntegrationTimeout,

    // === 部分失败 ===
    #[error("多步写入部分完成: {0}")]
    PartialFailure(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::PartialFailure(e) => {
                tracing::error!(error = %e, "多步写入部分完成");
                "服务内部错误，请稍后重试".to_string()
            }
            other if status.is_server_error() => {
                tracing::error!(error = %other, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for LedgerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 积分账本 Result 类型别名
pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// 检查是否为可重试的错误
    ///
    /// 积分系统的网络错误、超时、限流和 5xx 可重试；格式错误和未知状态码不可重试。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::IntegrationUnavailable(_) | Self::IntegrationTimeout
        )
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_)
                | Self::Validation(_)
                | Self::InvalidOrderNumber(_)
                | Self::OrderAlreadyExists { .. }
                | Self::DuplicateOrder(_)
                | Self::OrderOwnedByAnotherUser(_)
                | Self::OrderNotFound(_)
                | Self::ScoreNotFound(_)
                | Self::InsufficientFunds { .. }
        )
    }

    /// 是否为外部积分系统错误
    pub fn is_integration_failure(&self) -> bool {
        matches!(
            self,
            Self::Integration(_) | Self::IntegrationUnavailable(_) | Self::IntegrationTimeout
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::OrderAlreadyExists { .. } => "ORDER_ALREADY_EXISTS",
            Self::DuplicateOrder(_) => "DUPLICATE_ORDER",
            Self::OrderOwnedByAnotherUser(_) => "ORDER_OWNED_BY_ANOTHER_USER",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::ScoreNotFound(_) => "SCORE_NOT_FOUND",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Integration(_) => "INTEGRATION_FAILURE",
            Self::IntegrationUnavailable(_) => "INTEGRATION_UNAVAILABLE",
            Self::IntegrationTimeout => "INTEGRATION_TIMEOUT",
            Self::PartialFailure(_) => "PARTIAL_FAILURE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidOrderNumber(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OrderAlreadyExists { .. }
            | Self::DuplicateOrder(_)
            | Self::OrderOwnedByAnotherUser(_) => StatusCode::CONFLICT,
            Self::OrderNotFound(_) | Self::ScoreNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::Integration(_)
            | Self::IntegrationUnavailable(_)
            | Self::IntegrationTimeout
            | Self::PartialFailure(_)
            | Self::Database(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 判断 sqlx 错误是否为唯一约束冲突（SQLSTATE 23505）
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
            _ => false,
        }
    }
}
