//! 账本查询服务
//!
//! 提供订单列表、余额与提现记录等只读查询

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::repository::{OrderRepositoryTrait, ScoreRepositoryTrait, TransactionRepositoryTrait};
use crate::service::dto::{BalanceDto, OrderDto, WithdrawalDto};

/// 账本查询服务
pub struct LedgerQueryService<OR, SR, TR>
where
    OR: OrderRepositoryTrait + ?Sized,
    SR: ScoreRepositoryTrait + ?Sized,
    TR: TransactionRepositoryTrait + ?Sized,
{
    order_repo: Arc<OR>,
    score_repo: Arc<SR>,
    transaction_repo: Arc<TR>,
}

impl<OR, SR, TR> LedgerQueryService<OR, SR, TR>
where
    OR: OrderRepositoryTrait + ?Sized,
    SR: ScoreRepositoryTrait + ?Sized,
    TR: TransactionRepositoryTrait + ?Sized,
{
    pub fn new(order_repo: Arc<OR>, score_repo: Arc<SR>, transaction_repo: Arc<TR>) -> Self {
        Self {
            order_repo,
            score_repo,
            transaction_repo,
        }
    }

    /// 用户订单列表（最新的在前）
    #[instrument(skip(self))]
    pub async fn orders(&self, user_id: Uuid) -> Result<Vec<OrderDto>> {
        let orders = self.order_repo.list_by_user(user_id).await?;
        Ok(orders.into_iter().map(OrderDto::from).collect())
    }

    /// 用户余额，没有积分账户时为 0
    #[instrument(skip(self))]
    pub async fn balance(&self, user_id: Uuid) -> Result<BalanceDto> {
        let current = self
            .score_repo
            .get_by_user(user_id)
            .await?
            .map(|s| s.total)
            .unwrap_or(Decimal::ZERO);
        let withdrawn = self.transaction_repo.sum_debits(user_id).await?;

        Ok(BalanceDto { current, withdrawn })
    }

    /// 用户提现记录（最早的在前）
    #[instrument(skip(self))]
    pub async fn withdrawals(&self, user_id: Uuid) -> Result<Vec<WithdrawalDto>> {
        let records = self.transaction_repo.list_debits(user_id).await?;
        Ok(records.into_iter().map(WithdrawalDto::from).collect())
    }
}
