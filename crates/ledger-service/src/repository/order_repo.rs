//! 订单仓储
//!
//! 提供订单的数据访问，支持事务和行级锁

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::traits::OrderRepositoryTrait;
use crate::error::{LedgerError, Result};
use crate::models::{Order, OrderOwnership, OrderStatus};

/// 订单仓储
///
/// 订单号上有唯一约束，插入冲突被视为并发提交落败的权威信号
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 查询订单号的归属
    pub async fn exists(&self, number: &str) -> Result<Option<OrderOwnership>> {
        let ownership = sqlx::query_as::<_, OrderOwnership>(
            r#"
            SELECT id AS order_id, user_id
            FROM orders
            WHERE number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ownership)
    }

    /// 根据订单号获取订单
    pub async fn get_by_number(&self, number: &str) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, number, user_id, status, accrual, last_error,
                   fetch_attempts, created_at, updated_at
            FROM orders
            WHERE number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// 列出用户的所有订单（最新的在前）
    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, number, user_id, status, accrual, last_error,
                   fetch_attempts, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// 列出待轮询的订单
    ///
    /// 按 updated_at 排序：每次查询（成功或失败）都会刷新该时间，
    /// 使长期无结论的订单轮转到队尾，不会挡住后来的订单。
    /// 已有出账流水的订单是提现时登记的，不送积分系统查询。
    pub async fn list_pending(&self, limit: i64, max_attempts: i32) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT o.id, o.number, o.user_id, o.status, o.accrual, o.last_error,
                   o.fetch_attempts, o.created_at, o.updated_at
            FROM orders o
            WHERE o.status IN ('NEW', 'PROCESSING')
              AND o.fetch_attempts < $2
              AND NOT EXISTS (
                  SELECT 1 FROM transactions t
                  WHERE t.order_id = o.id AND t.kind = 'debit'
              )
            ORDER BY o.updated_at ASC, o.id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// 列出查询次数已达上限仍无终态结论的订单（最早的在前）
    pub async fn list_stalled(&self, max_attempts: i32, limit: i64) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, number, user_id, status, accrual, last_error,
                   fetch_attempts, created_at, updated_at
            FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
              AND fetch_attempts >= $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(max_attempts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    // ==================== 写入操作 ====================

    /// 登记新订单
    #[instrument(skip(self))]
    pub async fn insert(&self, number: &str, user_id: Uuid) -> Result<Order> {
        let order = Order::new(number, user_id);

        let inserted = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (id, number, user_id, status, accrual, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, number, user_id, status, accrual, last_error,
                      fetch_attempts, created_at, updated_at
            "#,
        )
        .bind(order.id)
        .bind(&order.number)
        .bind(order.user_id)
        .bind(order.status)
        .bind(order.accrual)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if LedgerError::is_unique_violation(&e) {
                LedgerError::DuplicateOrder(number.to_string())
            } else {
                LedgerError::Database(e)
            }
        })?;

        Ok(inserted)
    }

    /// 更新订单状态与积分
    ///
    /// 没有匹配的 (订单号, 用户) 时不做任何修改，记录告警并返回 false
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        number: &str,
        user_id: Uuid,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, accrual = $4, updated_at = NOW()
            WHERE number = $1 AND user_id = $2
            "#,
        )
        .bind(number)
        .bind(user_id)
        .bind(status)
        .bind(accrual)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(order_number = number, %user_id, "更新订单未匹配到任何记录");
            return Ok(false);
        }

        Ok(true)
    }

    /// 记录积分系统查询失败
    pub async fn record_fetch_failure(&self, number: &str, message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET last_error = $2, fetch_attempts = fetch_attempts + 1, updated_at = NOW()
            WHERE number = $1
            "#,
        )
        .bind(number)
        .bind(message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== 事务操作 ====================

    /// 在事务中获取订单（带行级锁）
    ///
    /// 使用 FOR UPDATE 锁定行，保证同一订单的结算串行执行
    pub async fn get_for_update(
        tx: &mut PgConnection,
        number: &str,
        user_id: Uuid,
    ) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, number, user_id, status, accrual, last_error,
                   fetch_attempts, created_at, updated_at
            FROM orders
            WHERE number = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(number)
        .bind(user_id)
        .fetch_optional(tx)
        .await?;

        Ok(order)
    }

    /// 在事务中写入积分结论，同时清除上一次的查询错误
    ///
    /// 非终态结论（NEW / PROCESSING）同样计入查询次数
    pub async fn apply_verdict_in_tx(
        tx: &mut PgConnection,
        order_id: Uuid,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<()> {
        let attempt: i32 = if status.is_final() { 0 } else { 1 };

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, accrual = $3, last_error = NULL,
                fetch_attempts = fetch_attempts + $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(status)
        .bind(accrual)
        .bind(attempt)
        .execute(tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    async fn exists(&self, number: &str) -> Result<Option<OrderOwnership>> {
        self.exists(number).await
    }

    async fn get_by_number(&self, number: &str) -> Result<Option<Order>> {
        self.get_by_number(number).await
    }

    async fn insert(&self, number: &str, user_id: Uuid) -> Result<Order> {
        self.insert(number, user_id).await
    }

    async fn update(
        &self,
        number: &str,
        user_id: Uuid,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<bool> {
        self.update(number, user_id, status, accrual).await
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        self.list_by_user(user_id).await
    }

    async fn list_pending(&self, limit: i64, max_attempts: i32) -> Result<Vec<Order>> {
        self.list_pending(limit, max_attempts).await
    }

    async fn list_stalled(&self, max_attempts: i32, limit: i64) -> Result<Vec<Order>> {
        self.list_stalled(max_attempts, limit).await
    }

    async fn record_fetch_failure(&self, number: &str, message: &str) -> Result<()> {
        self.record_fetch_failure(number, message).await
    }
}
