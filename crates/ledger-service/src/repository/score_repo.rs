//! 积分账户仓储

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use super::traits::ScoreRepositoryTrait;
use crate::error::{LedgerError, Result};
use crate::models::Score;

/// 积分账户仓储
pub struct ScoreRepository {
    pool: PgPool,
}

impl ScoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_user(&self, user_id: Uuid) -> Result<Option<Score>> {
        let score = sqlx::query_as::<_, Score>(
            r#"
            SELECT id, user_id, total, created_at, updated_at
            FROM score
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(score)
    }

    /// 创建积分账户，返回账户 ID
    pub async fn insert(&self, user_id: Uuid, initial: Decimal) -> Result<Uuid> {
        let score = Score::new(user_id, initial);

        let row = sqlx::query(
            r#"
            INSERT INTO score (id, user_id, total, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(score.id)
        .bind(score.user_id)
        .bind(score.total)
        .bind(score.created_at)
        .bind(score.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    pub async fn update(&self, user_id: Uuid, total: Decimal) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE score
            SET total = $2, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(total)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::ScoreNotFound(user_id));
        }

        Ok(())
    }

    // ==================== 事务操作 ====================

    /// 在事务中获取积分账户（带行级锁）
    pub async fn get_for_update(tx: &mut PgConnection, user_id: Uuid) -> Result<Option<Score>> {
        let score = sqlx::query_as::<_, Score>(
            r#"
            SELECT id, user_id, total, created_at, updated_at
            FROM score
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(tx)
        .await?;

        Ok(score)
    }

    /// 在事务中尝试创建积分账户
    ///
    /// 账户已被并发创建时返回 false，调用方需重新加锁读取
    pub async fn try_insert_in_tx(
        tx: &mut PgConnection,
        user_id: Uuid,
        initial: Decimal,
    ) -> Result<bool> {
        let score = Score::new(user_id, initial);

        let result = sqlx::query(
            r#"
            INSERT INTO score (id, user_id, total, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(score.id)
        .bind(score.user_id)
        .bind(score.total)
        .bind(score.created_at)
        .bind(score.updated_at)
        .execute(tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// 在事务中写入新余额
    pub async fn update_in_tx(tx: &mut PgConnection, user_id: Uuid, total: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE score
            SET total = $2, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(total)
        .execute(tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ScoreRepositoryTrait for ScoreRepository {
    async fn get_by_user(&self, user_id: Uuid) -> Result<Option<Score>> {
        self.get_by_user(user_id).await
    }

    async fn insert(&self, user_id: Uuid, initial: Decimal) -> Result<Uuid> {
        self.insert(user_id, initial).await
    }

    async fn update(&self, user_id: Uuid, total: Decimal) -> Result<()> {
        self.update(user_id, total).await
    }
}
