//! 积分提现服务
//!
//! 余额检查、扣减与出账流水在账本的一个原子操作内完成，
//! 同一用户的并发提现不会让余额变为负数。

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use loyalty_shared::observability::metrics;

use crate::error::{LedgerError, Result};
use crate::models::AMOUNT_SCALE;
use crate::repository::{LedgerStoreTrait, OrderRepositoryTrait, WithdrawalOutcome};
use crate::service::dto::WithdrawalReceipt;
use crate::service::order_service::OrderService;
use crate::validation::is_valid_order_number;

/// 积分提现服务
pub struct WithdrawalService<R, L>
where
    R: OrderRepositoryTrait + ?Sized,
    L: LedgerStoreTrait + ?Sized,
{
    order_service: Arc<OrderService<R>>,
    order_repo: Arc<R>,
    ledger: Arc<L>,
}

impl<R, L> WithdrawalService<R, L>
where
    R: OrderRepositoryTrait + ?Sized,
    L: LedgerStoreTrait + ?Sized,
{
    pub fn new(order_service: Arc<OrderService<R>>, order_repo: Arc<R>, ledger: Arc<L>) -> Self {
        Self {
            order_service,
            order_repo,
            ledger,
        }
    }

    /// 从用户余额中提现
    ///
    /// 余额必须严格大于提现金额；没有积分账户视为余额为 0。
    /// 金额最多两位小数，超出精度的金额直接拒绝而不是舍入。
    #[instrument(skip(self))]
    pub async fn withdraw(&self, amount: Decimal, order_id: Uuid, owner_id: Uuid) -> Result<Decimal> {
        check_amount(amount)?;

        let outcome = match self.ledger.withdraw(owner_id, order_id, amount).await {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_withdrawal("error");
                return Err(e);
            }
        };

        match outcome {
            WithdrawalOutcome::Debited { balance_after } => {
                metrics::record_withdrawal("success");
                info!(%owner_id, %amount, %balance_after, "提现成功");
                Ok(balance_after)
            }
            WithdrawalOutcome::Insufficient { available } => {
                metrics::record_withdrawal("insufficient_funds");
                warn!(%owner_id, %amount, %available, "积分余额不足");
                Err(LedgerError::InsufficientFunds {
                    requested: amount,
                    available,
                })
            }
        }
    }

    /// 针对订单号提现
    ///
    /// 订单号未登记时先登记（不启动积分结算，出账后也不会被轮询），已属于其他用户时拒绝
    #[instrument(skip(self))]
    pub async fn withdraw_for_order(
        &self,
        number: &str,
        amount: Decimal,
        owner_id: Uuid,
    ) -> Result<WithdrawalReceipt> {
        if number.is_empty() {
            return Err(LedgerError::Validation("订单号不能为空".to_string()));
        }
        if !is_valid_order_number(number) {
            return Err(LedgerError::InvalidOrderNumber(number.to_string()));
        }

        check_amount(amount)?;
        let order_id = self.resolve_order(number, owner_id).await?;
        let balance = self.withdraw(amount, order_id, owner_id).await?;

        Ok(WithdrawalReceipt {
            order: number.to_string(),
            sum: amount,
            balance,
        })
    }

    async fn resolve_order(&self, number: &str, owner_id: Uuid) -> Result<Uuid> {
        let ownership = match self.order_repo.exists(number).await? {
            Some(ownership) => ownership,
            None => match self.order_service.submit(number, owner_id).await {
                Ok(order) => return Ok(order.id),
                Err(LedgerError::OrderAlreadyExists { .. }) => self
                    .order_repo
                    .exists(number)
                    .await?
                    .ok_or_else(|| LedgerError::OrderNotFound(number.to_string()))?,
                Err(e) => return Err(e),
            },
        };

        if ownership.user_id != owner_id {
            return Err(LedgerError::OrderOwnedByAnotherUser(number.to_string()));
        }

        Ok(ownership.order_id)
    }
}

fn check_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "提现金额必须大于 0: {amount}"
        )));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::Validation(format!(
            "提现金额最多 {AMOUNT_SCALE} 位小数: {amount}"
        )));
    }
    Ok(())
}
