//! HTTP 处理器
//!
//! 用户身份由上游网关认证后通过 `X-User-Id` 头传入

pub mod balance;
pub mod health;
pub mod orders;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::LedgerError;

/// 网关传入的用户 ID 请求头
pub const USER_ID_HEADER: &str = "x-user-id";

/// 当前请求的用户
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = LedgerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| LedgerError::Unauthorized("缺少用户身份".to_string()))?;

        value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v).ok())
            .map(CurrentUser)
            .ok_or_else(|| LedgerError::Unauthorized("用户身份格式无效".to_string()))
    }
}
