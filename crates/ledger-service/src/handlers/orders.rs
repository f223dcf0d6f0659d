//! 订单 API 处理器
//!
//! - `POST /api/user/orders`：上传订单号（请求体为纯文本）
//! - `GET /api/user/orders`：查询用户的订单列表

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use super::CurrentUser;
use crate::error::Result;
use crate::service::dto::UploadOutcome;
use crate::state::AppState;

/// 上传订单
///
/// 202 新订单已受理；200 该用户已上传过此订单
#[instrument(skip(state, user, body), fields(user_id = %user.0))]
pub async fn upload_order(
    State(state): State<AppState>,
    user: CurrentUser,
    body: String,
) -> Result<StatusCode> {
    match state.order_service.upload(&body, user.0).await? {
        UploadOutcome::Accepted(_) => Ok(StatusCode::ACCEPTED),
        UploadOutcome::AlreadyUploaded => Ok(StatusCode::OK),
    }
}

/// 查询订单列表，没有订单时返回 204
#[instrument(skip(state, user), fields(user_id = %user.0))]
pub async fn list_orders(State(state): State<AppState>, user: CurrentUser) -> Result<Response> {
    let orders = state.query_service.orders(user.0).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    Ok(Json(orders).into_response())
}
