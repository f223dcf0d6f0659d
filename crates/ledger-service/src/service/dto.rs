//! 服务层数据传输对象
//!
//! 定义服务层与外部交互使用的 DTO，与内部领域模型解耦。
//! 金额在 JSON 中以数字表示。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{DebitRecord, Order, OrderStatus};

/// 订单上传结果
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// 新订单已登记，积分结算已在后台启动
    Accepted(Order),
    /// 同一用户重复上传，不做任何修改
    AlreadyUploaded,
}

/// 订单 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDto {
    pub number: String,
    pub status: OrderStatus,
    /// 未入账时不返回
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderDto {
    fn from(order: Order) -> Self {
        Self {
            accrual: (order.accrual > Decimal::ZERO).then_some(order.accrual),
            number: order.number,
            status: order.status,
            uploaded_at: order.created_at,
        }
    }
}

/// 余额 DTO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceDto {
    /// 当前可用积分
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    /// 累计已提现积分
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

/// 提现记录 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalDto {
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

impl From<DebitRecord> for WithdrawalDto {
    fn from(record: DebitRecord) -> Self {
        Self {
            order: record.order_number,
            sum: record.amount,
            processed_at: record.processed_at,
        }
    }
}

/// 提现请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WithdrawRequest {
    #[validate(length(min = 1, max = 64, message = "订单号长度必须在1-64个字符之间"))]
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
}

/// 提现结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    /// 提现后的余额
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}
