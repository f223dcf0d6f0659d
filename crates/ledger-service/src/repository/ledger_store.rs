//! 账本原子操作
//!
//! 订单结算与积分提现都涉及多张表的读改写，
//! 这里把每个流程放进一个数据库事务，依靠行级锁串行化同一用户的余额变更。

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::order_repo::OrderRepository;
use super::score_repo::ScoreRepository;
use super::traits::{LedgerStoreTrait, SettlementOutcome, WithdrawalOutcome};
use super::transaction_repo::TransactionRepository;
use crate::error::{LedgerError, Result};
use crate::models::{AccrualVerdict, Score, TransactionKind};

/// 基于 PostgreSQL 事务的账本实现
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 锁定用户积分账户，不存在时惰性创建
    ///
    /// 并发创建时 ON CONFLICT 落败的一方重新加锁读取已存在的行
    async fn lock_or_create_score(tx: &mut PgConnection, user_id: Uuid) -> Result<Score> {
        if let Some(score) = ScoreRepository::get_for_update(&mut *tx, user_id).await? {
            return Ok(score);
        }

        if ScoreRepository::try_insert_in_tx(&mut *tx, user_id, Decimal::ZERO).await? {
            debug!(%user_id, "创建积分账户");
        }

        ScoreRepository::get_for_update(&mut *tx, user_id)
            .await?
            .ok_or(LedgerError::ScoreNotFound(user_id))
    }
}

#[async_trait]
impl LedgerStoreTrait for PgLedgerStore {
    /// 在单个事务内完成：
    /// - 锁定订单，已是终态则直接返回
    /// - 写入订单状态与积分
    /// - 需要入账时锁定（或创建）积分账户并增加余额
    /// - 追加入账流水
    #[instrument(skip(self, verdict), fields(status = %verdict.status, accrual = %verdict.accrual))]
    async fn settle_accrual(
        &self,
        number: &str,
        user_id: Uuid,
        verdict: AccrualVerdict,
    ) -> Result<SettlementOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(order) = OrderRepository::get_for_update(&mut tx, number, user_id).await? else {
            return Ok(SettlementOutcome::OrderMissing);
        };

        if order.status.is_final() {
            debug!(order_number = number, status = %order.status, "订单已结算，跳过");
            return Ok(SettlementOutcome::AlreadySettled(order.status));
        }

        OrderRepository::apply_verdict_in_tx(&mut tx, order.id, verdict.status, verdict.accrual)
            .await?;

        let credited = if verdict.credits_points() {
            let score = Self::lock_or_create_score(&mut tx, user_id).await?;
            let new_total = score.total + verdict.accrual;

            ScoreRepository::update_in_tx(&mut tx, user_id, new_total).await?;
            TransactionRepository::append_in_tx(
                &mut tx,
                user_id,
                order.id,
                verdict.accrual,
                TransactionKind::Credit,
            )
            .await?;

            Some(verdict.accrual)
        } else {
            None
        };

        tx.commit().await?;

        if let Some(amount) = credited {
            info!(order_number = number, %user_id, %amount, "订单积分已入账");
        }

        Ok(SettlementOutcome::Applied {
            status: verdict.status,
            credited,
        })
    }

    /// 在单个事务内完成：
    /// - 锁定积分账户并检查余额
    /// - 写入新余额
    /// - 追加出账流水
    #[instrument(skip(self))]
    async fn withdraw(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<WithdrawalOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(score) = ScoreRepository::get_for_update(&mut tx, user_id).await? else {
            return Ok(WithdrawalOutcome::Insufficient {
                available: Decimal::ZERO,
            });
        };

        if !score.can_withdraw(amount) {
            return Ok(WithdrawalOutcome::Insufficient {
                available: score.total,
            });
        }

        let balance_after = score.total - amount;
        ScoreRepository::update_in_tx(&mut tx, user_id, balance_after).await?;
        TransactionRepository::append_in_tx(
            &mut tx,
            user_id,
            order_id,
            amount,
            TransactionKind::Debit,
        )
        .await?;

        tx.commit().await?;

        Ok(WithdrawalOutcome::Debited { balance_after })
    }
}
