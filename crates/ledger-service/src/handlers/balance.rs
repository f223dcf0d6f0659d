//! 余额与提现 API 处理器

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::instrument;
use validator::Validate;

use super::CurrentUser;
use crate::error::Result;
use crate::service::dto::{BalanceDto, WithdrawRequest, WithdrawalReceipt};
use crate::state::AppState;

/// 查询余额
#[instrument(skip(state, user), fields(user_id = %user.0))]
pub async fn get_balance(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<BalanceDto>> {
    let balance = state.query_service.balance(user.0).await?;
    Ok(Json(balance))
}

/// 申请提现
///
/// 402 余额不足；409 订单属于其他用户；422 订单号校验失败
#[instrument(skip(state, user, req), fields(user_id = %user.0))]
pub async fn withdraw(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<WithdrawalReceipt>> {
    req.validate()?;

    let receipt = state
        .withdrawal_service
        .withdraw_for_order(&req.order, req.sum, user.0)
        .await?;
    Ok(Json(receipt))
}

/// 查询提现记录，没有记录时返回 204
#[instrument(skip(state, user), fields(user_id = %user.0))]
pub async fn list_withdrawals(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response> {
    let withdrawals = state.query_service.withdrawals(user.0).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    Ok(Json(withdrawals).into_response())
}
