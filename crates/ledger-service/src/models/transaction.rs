//! 交易流水实体定义

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::TransactionKind;

/// 积分交易流水
///
/// 只追加不修改，金额为正数，方向由 kind 决定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    /// 关联订单 ID
    pub order_id: Uuid,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(user_id: Uuid, order_id: Uuid, amount: Decimal, kind: TransactionKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            order_id,
            amount,
            kind,
            created_at: Utc::now(),
        }
    }

    /// 带符号的金额（入账为正，出账为负）
    pub fn signed_amount(&self) -> Decimal {
        self.amount * Decimal::from(self.kind.sign())
    }
}

/// 提现记录（关联订单号）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DebitRecord {
    pub order_number: String,
    pub amount: Decimal,
    pub processed_at: DateTime<Utc>,
}
