//! 积分账本枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 订单状态
///
/// 由积分计算系统的结论驱动，PROCESSED 与 INVALID 为终态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 新建 - 已登记，积分系统尚未给出结论
    #[default]
    New,
    /// 处理中 - 积分系统已受理，正在计算
    Processing,
    /// 已处理 - 积分已确定并入账
    Processed,
    /// 无效 - 积分系统拒绝该订单
    Invalid,
}

impl OrderStatus {
    /// 是否为终态（终态订单不会再被结算）
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Processed | Self::Invalid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Invalid => "INVALID",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 交易流水类型
///
/// 金额始终记为正数，方向由类型决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum TransactionKind {
    /// 入账（+）- 订单积分结算
    Credit,
    /// 出账（-）- 积分提现
    Debit,
}

impl TransactionKind {
    /// 返回该类型的金额符号
    pub fn sign(&self) -> i32 {
        match self {
            Self::Credit => 1,
            Self::Debit => -1,
        }
    }
}
