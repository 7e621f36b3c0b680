use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::{Store, StoreTx};
use crate::errors::AppError;
use crate::models::interpretation::{InterpretationItemRow, InterpretationRow};
use crate::models::task::TaskRow;
use crate::models::user::{UserRow, UserUpsert};

/// Production `Store` backed by the shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn upsert_user(
        &mut self,
        user: &UserUpsert,
        now: DateTime<Utc>,
    ) -> Result<UserRow, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, google_id, email, nickname, avatar, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (google_id) DO UPDATE SET
                email = EXCLUDED.email,
                nickname = EXCLUDED.nickname,
                avatar = COALESCE(EXCLUDED.avatar, users.avatar),
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.google_id)
        .bind(&user.email)
        .bind(&user.nickname)
        .bind(&user.avatar)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn insert_interpretation(&mut self, row: &InterpretationRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO ai_interpretations
                (id, user_id, input_text, structured_result, original_result, ai_model,
                 ai_prompt_tokens, ai_completion_tokens, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(row.id)
        .bind(row.user_id)
        .bind(&row.input_text)
        .bind(&row.structured_result)
        .bind(&row.original_result)
        .bind(&row.ai_model)
        .bind(row.ai_prompt_tokens)
        .bind(row.ai_completion_tokens)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_interpretation(
        &mut self,
        id: Uuid,
    ) -> Result<Option<InterpretationRow>, AppError> {
        Ok(
            sqlx::query_as::<_, InterpretationRow>("SELECT * FROM ai_interpretations WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    async fn list_interpretations(
        &mut self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InterpretationRow>, AppError> {
        Ok(sqlx::query_as::<_, InterpretationRow>(
            r#"
            SELECT * FROM ai_interpretations
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn count_interpretations(&mut self, user_id: Uuid) -> Result<i64, AppError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM ai_interpretations WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *self.tx)
                .await?,
        )
    }

    async fn insert_item(&mut self, row: &InterpretationItemRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO interpretation_items
                (id, interpretation_id, item_index, resource_type, status, resource_id,
                 data, original_data, reviewed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.id)
        .bind(row.interpretation_id)
        .bind(row.item_index)
        .bind(&row.resource_type)
        .bind(&row.status)
        .bind(row.resource_id)
        .bind(&row.data)
        .bind(&row.original_data)
        .bind(row.reviewed_at)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_item(&mut self, id: Uuid) -> Result<Option<InterpretationItemRow>, AppError> {
        Ok(sqlx::query_as::<_, InterpretationItemRow>(
            "SELECT * FROM interpretation_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn list_items(
        &mut self,
        interpretation_id: Uuid,
    ) -> Result<Vec<InterpretationItemRow>, AppError> {
        Ok(sqlx::query_as::<_, InterpretationItemRow>(
            "SELECT * FROM interpretation_items WHERE interpretation_id = $1 ORDER BY item_index ASC",
        )
        .bind(interpretation_id)
        .fetch_all(&mut *self.tx)
        .await?)
    }

    async fn update_pending_item_data(
        &mut self,
        id: Uuid,
        data: &Value,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE interpretation_items
            SET data = $2, updated_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(data)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_item_created(
        &mut self,
        id: Uuid,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE interpretation_items
            SET status = 'created', resource_id = $2, reviewed_at = $3, updated_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(resource_id)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_task(&mut self, task: &TaskRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO tasks
                (id, user_id, title, description, due_at, status, source,
                 ai_interpretation_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(task.id)
        .bind(task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_at)
        .bind(&task.status)
        .bind(&task.source)
        .bind(task.ai_interpretation_id)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
