//! 订单实体定义

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::OrderStatus;

/// 订单
///
/// 订单号全局唯一，创建后归属用户不再变化；状态与积分只由积分结算流程修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    /// 外部提供的订单号
    pub number: String,
    /// 归属用户 ID
    pub user_id: Uuid,
    pub status: OrderStatus,
    /// 已计入的积分
    pub accrual: Decimal,
    /// 最近一次查询积分系统失败的原因
    #[sqlx(default)]
    pub last_error: Option<String>,
    /// 未得到终态结论的查询次数（查询失败或积分系统仍在处理）
    pub fetch_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 新登记的订单（状态 NEW，积分 0）
    pub fn new(number: impl Into<String>, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            number: number.into(),
            user_id,
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
            last_error: None,
            fetch_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// 是否仍等待积分系统结论
    pub fn is_pending(&self) -> bool {
        !self.status.is_final()
    }

    /// 查询次数已达上限仍无终态结论，不再自动轮询
    pub fn is_stalled(&self, max_attempts: i32) -> bool {
        self.is_pending() && self.fetch_attempts >= max_attempts
    }
}

/// 订单存在性查询结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderOwnership {
    pub order_id: Uuid,
    pub user_id: Uuid,
}

/// 积分系统对某个订单给出的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualVerdict {
    pub status: OrderStatus,
    pub accrual: Decimal,
}

impl AccrualVerdict {
    /// 积分系统尚不知道该订单（204）
    pub fn unknown() -> Self {
        Self {
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
        }
    }

    /// 该结论是否需要给用户入账
    pub fn credits_points(&self) -> bool {
        self.status == OrderStatus::Processed && self.accrual > Decimal::ZERO
    }
}
