//! 内存账本存储
//!
//! 用单把异步锁保护全部数据，实现所有仓储接口，适用于测试和本地开发。
//! 多步操作在同一次加锁内完成，因此与数据库事务实现具有相同的原子性。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use super::traits::{
    LedgerStoreTrait, OrderRepositoryTrait, ScoreRepositoryTrait, SettlementOutcome,
    TransactionRepositoryTrait, WithdrawalOutcome,
};
use crate::error::{LedgerError, Result};
use crate::models::{
    AccrualVerdict, DebitRecord, Order, OrderOwnership, OrderStatus, Score, Transaction,
    TransactionKind,
};

#[derive(Debug, Default)]
struct State {
    /// 订单，按订单号索引
    orders: HashMap<String, Order>,
    /// 积分账户，按用户索引
    scores: HashMap<Uuid, Score>,
    /// 流水，按追加顺序
    transactions: Vec<Transaction>,
}

impl State {
    fn apply_credit(&mut self, user_id: Uuid, order_id: Uuid, amount: Decimal) {
        let score = self
            .scores
            .entry(user_id)
            .or_insert_with(|| Score::new(user_id, Decimal::ZERO));
        score.total += amount;
        score.updated_at = Utc::now();

        self.transactions.push(Transaction::new(
            user_id,
            order_id,
            amount,
            TransactionKind::Credit,
        ));
    }

    /// 订单是否已有出账流水（提现时登记的订单）
    fn has_debit(&self, order_id: Uuid) -> bool {
        self.transactions
            .iter()
            .any(|t| t.order_id == order_id && t.kind == TransactionKind::Debit)
    }
}

/// 内存账本存储
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有流水的快照（按追加顺序）
    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().await.transactions.clone()
    }

    /// 用户的入账合计减去出账合计
    pub async fn ledger_balance(&self, user_id: Uuid) -> Decimal {
        self.state
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(Transaction::signed_amount)
            .sum()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl OrderRepositoryTrait for MemoryLedger {
    async fn exists(&self, number: &str) -> Result<Option<OrderOwnership>> {
        let state = self.state.lock().await;
        Ok(state.orders.get(number).map(|o| OrderOwnership {
            order_id: o.id,
            user_id: o.user_id,
        }))
    }

    async fn get_by_number(&self, number: &str) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(number).cloned())
    }

    async fn insert(&self, number: &str, user_id: Uuid) -> Result<Order> {
        let mut state = self.state.lock().await;
        if state.orders.contains_key(number) {
            return Err(LedgerError::DuplicateOrder(number.to_string()));
        }

        let order = Order::new(number, user_id);
        state.orders.insert(number.to_string(), order.clone());
        Ok(order)
    }

    async fn update(
        &self,
        number: &str,
        user_id: Uuid,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state
            .orders
            .get_mut(number)
            .filter(|o| o.is_owned_by(user_id))
        {
            Some(order) => {
                order.status = status;
                order.accrual = accrual;
                order.updated_at = Utc::now();
                Ok(true)
            }
            None => {
                warn!(order_number = number, %user_id, "更新订单未匹配到任何记录");
                Ok(false)
            }
        }
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.is_owned_by(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders)
    }

    async fn list_pending(&self, limit: i64, max_attempts: i32) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.is_pending() && !o.is_stalled(max_attempts))
            .filter(|o| !state.has_debit(o.id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| (a.updated_at, a.id).cmp(&(b.updated_at, b.id)));
        orders.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(orders)
    }

    async fn list_stalled(&self, max_attempts: i32, limit: i64) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.is_stalled(max_attempts))
            .cloned()
            .collect();
        orders.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        orders.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(orders)
    }

    async fn record_fetch_failure(&self, number: &str, message: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(order) = state.orders.get_mut(number) {
            order.last_error = Some(message.to_string());
            order.fetch_attempts += 1;
            order.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl ScoreRepositoryTrait for MemoryLedger {
    async fn get_by_user(&self, user_id: Uuid) -> Result<Option<Score>> {
        Ok(self.state.lock().await.scores.get(&user_id).cloned())
    }

    async fn insert(&self, user_id: Uuid, initial: Decimal) -> Result<Uuid> {
        let mut state = self.state.lock().await;
        if state.scores.contains_key(&user_id) {
            return Err(LedgerError::Internal(format!(
                "积分账户已存在: user_id={user_id}"
            )));
        }

        let score = Score::new(user_id, initial);
        let id = score.id;
        state.scores.insert(user_id, score);
        Ok(id)
    }

    async fn update(&self, user_id: Uuid, total: Decimal) -> Result<()> {
        let mut state = self.state.lock().await;
        let score = state
            .scores
            .get_mut(&user_id)
            .ok_or(LedgerError::ScoreNotFound(user_id))?;
        score.total = total;
        score.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TransactionRepositoryTrait for MemoryLedger {
    async fn append(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Result<Uuid> {
        let transaction = Transaction::new(user_id, order_id, amount, kind);
        let id = transaction.id;
        self.state.lock().await.transactions.push(transaction);
        Ok(id)
    }

    async fn sum_debits(&self, user_id: Uuid) -> Result<Decimal> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && t.kind == TransactionKind::Debit)
            .map(|t| t.amount)
            .sum())
    }

    async fn list_debits(&self, user_id: Uuid) -> Result<Vec<DebitRecord>> {
        let state = self.state.lock().await;
        let records = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && t.kind == TransactionKind::Debit)
            .filter_map(|t| {
                state
                    .orders
                    .values()
                    .find(|o| o.id == t.order_id)
                    .map(|o| DebitRecord {
                        order_number: o.number.clone(),
                        amount: t.amount,
                        processed_at: t.created_at,
                    })
            })
            .collect();
        Ok(records)
    }
}

#[async_trait]
impl LedgerStoreTrait for MemoryLedger {
    async fn settle_accrual(
        &self,
        number: &str,
        user_id: Uuid,
        verdict: AccrualVerdict,
    ) -> Result<SettlementOutcome> {
        let mut state = self.state.lock().await;

        let Some(order) = state
            .orders
            .get_mut(number)
            .filter(|o| o.is_owned_by(user_id))
        else {
            return Ok(SettlementOutcome::OrderMissing);
        };

        if order.status.is_final() {
            return Ok(SettlementOutcome::AlreadySettled(order.status));
        }

        order.status = verdict.status;
        order.accrual = verdict.accrual;
        order.last_error = None;
        if !verdict.status.is_final() {
            order.fetch_attempts += 1;
        }
        order.updated_at = Utc::now();
        let order_id = order.id;

        let credited = if verdict.credits_points() {
            state.apply_credit(user_id, order_id, verdict.accrual);
            Some(verdict.accrual)
        } else {
            None
        };

        Ok(SettlementOutcome::Applied {
            status: verdict.status,
            credited,
        })
    }

    async fn withdraw(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<WithdrawalOutcome> {
        let mut state = self.state.lock().await;

        let Some(score) = state.scores.get_mut(&user_id) else {
            return Ok(WithdrawalOutcome::Insufficient {
                available: Decimal::ZERO,
            });
        };

        if !score.can_withdraw(amount) {
            return Ok(WithdrawalOutcome::Insufficient {
                available: score.total,
            });
        }

        score.total -= amount;
        score.updated_at = Utc::now();
        let balance_after = score.total;

        state.transactions.push(Transaction::new(
            user_id,
            order_id,
            amount,
            TransactionKind::Debit,
        ));

        Ok(WithdrawalOutcome::Debited { balance_after })
    }
}
