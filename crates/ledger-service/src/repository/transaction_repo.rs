//! 交易流水仓储
//!
//! 流水只追加，不提供修改和删除

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::traits::TransactionRepositoryTrait;
use crate::error::Result;
use crate::models::{DebitRecord, Transaction, TransactionKind};

pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Result<Uuid> {
        let mut conn = self.pool.acquire().await?;
        Self::append_in_tx(&mut *conn, user_id, order_id, amount, kind).await
    }

    /// 出账总额
    pub async fn sum_debits(&self, user_id: Uuid) -> Result<Decimal> {
        let total: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount)
            FROM transactions
            WHERE user_id = $1 AND kind = $2
            "#,
        )
        .bind(user_id)
        .bind(TransactionKind::Debit)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or_default())
    }

    /// 出账记录，关联订单号，按时间升序
    pub async fn list_debits(&self, user_id: Uuid) -> Result<Vec<DebitRecord>> {
        let records = sqlx::query_as::<_, DebitRecord>(
            r#"
            SELECT o.number AS order_number, t.amount, t.created_at AS processed_at
            FROM transactions t
            JOIN orders o ON o.id = t.order_id
            WHERE t.user_id = $1 AND t.kind = $2
            ORDER BY t.created_at ASC, t.id ASC
            "#,
        )
        .bind(user_id)
        .bind(TransactionKind::Debit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    // ==================== 事务操作 ====================

    /// 在事务中追加流水，返回流水 ID
    pub async fn append_in_tx(
        tx: &mut PgConnection,
        user_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Result<Uuid> {
        let transaction = Transaction::new(user_id, order_id, amount, kind);

        sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, order_id, amount, kind, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.user_id)
        .bind(transaction.order_id)
        .bind(transaction.amount)
        .bind(transaction.kind)
        .bind(transaction.created_at)
        .execute(tx)
        .await?;

        Ok(transaction.id)
    }
}

#[async_trait]
impl TransactionRepositoryTrait for TransactionRepository {
    async fn append(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Result<Uuid> {
        self.append(user_id, order_id, amount, kind).await
    }

    async fn sum_debits(&self, user_id: Uuid) -> Result<Decimal> {
        self.sum_debits(user_id).await
    }

    async fn list_debits(&self, user_id: Uuid) -> Result<Vec<DebitRecord>> {
        self.list_debits(user_id).await
    }
}
