//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AccrualVerdict, DebitRecord, Order, OrderOwnership, OrderStatus, Score, TransactionKind,
};

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    /// 查询订单号是否已登记，返回订单 ID 与归属用户
    async fn exists(&self, number: &str) -> Result<Option<OrderOwnership>>;
    async fn get_by_number(&self, number: &str) -> Result<Option<Order>>;
    /// 登记新订单，订单号唯一约束冲突时返回 `DuplicateOrder`
    async fn insert(&self, number: &str, user_id: Uuid) -> Result<Order>;
    /// 按 (订单号, 用户) 更新状态与积分，未匹配到行时返回 false
    async fn update(
        &self,
        number: &str,
        user_id: Uuid,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<bool>;
    /// 用户的全部订单，最新的在前
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
    /// 待轮询的订单：尚无终态结论、查询次数低于上限且不是提现订单，
    /// 最久未被处理的在前
    async fn list_pending(&self, limit: i64, max_attempts: i32) -> Result<Vec<Order>>;
    /// 查询次数已达上限仍无终态结论的订单，需要人工介入
    async fn list_stalled(&self, max_attempts: i32, limit: i64) -> Result<Vec<Order>>;
    /// 记录一次积分系统查询失败
    async fn record_fetch_failure(&self, number: &str, message: &str) -> Result<()>;
}

/// 积分账户仓储接口
///
/// 不提供比较并交换语义，读改写的并发安全由 [`LedgerStoreTrait`] 负责
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoreRepositoryTrait: Send + Sync {
    async fn get_by_user(&self, user_id: Uuid) -> Result<Option<Score>>;
    async fn insert(&self, user_id: Uuid, initial: Decimal) -> Result<Uuid>;
    /// 覆盖写入余额，用户没有账户时返回 `ScoreNotFound`
    async fn update(&self, user_id: Uuid, total: Decimal) -> Result<()>;
}

/// 交易流水仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionRepositoryTrait: Send + Sync {
    async fn append(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Result<Uuid>;
    /// 出账总额，没有出账记录时为 0
    async fn sum_debits(&self, user_id: Uuid) -> Result<Decimal>;
    /// 出账记录（含订单号），最早的在前
    async fn list_debits(&self, user_id: Uuid) -> Result<Vec<DebitRecord>>;
}

/// 积分结算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// 订单已更新；`credited` 为本次入账的积分
    Applied {
        status: OrderStatus,
        credited: Option<Decimal>,
    },
    /// 订单已是终态，本次结算不做任何修改
    AlreadySettled(OrderStatus),
    /// 订单不存在或不属于该用户
    OrderMissing,
}

/// 提现结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalOutcome {
    Debited { balance_after: Decimal },
    Insufficient { available: Decimal },
}

/// 账本原子操作接口
///
/// 每个方法都是一个不可分割的单元：订单状态、余额与流水要么全部写入，要么全部不写入
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStoreTrait: Send + Sync {
    /// 应用积分系统结论，已是终态的订单保持不变
    async fn settle_accrual(
        &self,
        number: &str,
        user_id: Uuid,
        verdict: AccrualVerdict,
    ) -> Result<SettlementOutcome>;

    /// 扣减余额并追加出账流水，余额必须严格大于提现金额
    async fn withdraw(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<WithdrawalOutcome>;
}
