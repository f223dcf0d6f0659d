//! 积分账户实体定义

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 用户积分账户
///
/// 每个用户一行，首次入账时惰性创建，余额任何时刻都不为负
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Score {
    pub id: Uuid,
    pub user_id: Uuid,
    /// 当前可用积分
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Score {
    pub fn new(user_id: Uuid, initial: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            total: initial,
            created_at: now,
            updated_at: now,
        }
    }

    /// 检查余额是否足够提现
    ///
    /// 余额必须严格大于提现金额，等额提现会被拒绝
    pub fn can_withdraw(&self, amount: Decimal) -> bool {
        self.total > amount
    }
}
