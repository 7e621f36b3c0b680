//! Storage seam for the interpretation pipeline.
//!
//! Everything that touches the database goes through `Store::begin` and the
//! returned `StoreTx`. `with_transaction` is the only place that decides
//! between commit and rollback.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::interpretation::{InterpretationItemRow, InterpretationRow};
use crate::models::task::TaskRow;
use crate::models::user::{UserRow, UserUpsert};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

const MAX_CONNECTIONS: u32 = 25;
const MIN_CONNECTIONS: u32 = 5;
const MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(options: PgConnectOptions) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .min_connections(MIN_CONNECTIONS)
        .max_lifetime(MAX_LIFETIME)
        .connect_with(options)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Applies the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

/// Source of transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;
}

/// Operations available inside one open transaction.
///
/// Dropping a `StoreTx` without calling `commit` discards its writes.
#[async_trait]
pub trait StoreTx: Send {
    /// Inserts the user or refreshes its profile, keyed by `google_id`.
    async fn upsert_user(&mut self, user: &UserUpsert, now: DateTime<Utc>)
        -> Result<UserRow, AppError>;

    async fn insert_interpretation(&mut self, row: &InterpretationRow) -> Result<(), AppError>;

    async fn find_interpretation(&mut self, id: Uuid)
        -> Result<Option<InterpretationRow>, AppError>;

    /// Newest first.
    async fn list_interpretations(
        &mut self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InterpretationRow>, AppError>;

    async fn count_interpretations(&mut self, user_id: Uuid) -> Result<i64, AppError>;

    async fn insert_item(&mut self, row: &InterpretationItemRow) -> Result<(), AppError>;

    async fn find_item(&mut self, id: Uuid) -> Result<Option<InterpretationItemRow>, AppError>;

    /// Ordered by `item_index` ascending.
    async fn list_items(
        &mut self,
        interpretation_id: Uuid,
    ) -> Result<Vec<InterpretationItemRow>, AppError>;

    /// Replaces `data` of a pending item. Returns `false` when no pending row matched.
    async fn update_pending_item_data(
        &mut self,
        id: Uuid,
        data: &Value,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Flips a pending item to `created`. Returns `false` when no pending row matched.
    async fn mark_item_created(
        &mut self,
        id: Uuid,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn insert_task(&mut self, task: &TaskRow) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

/// Runs `work` inside one transaction: commit when it returns `Ok`, roll back
/// on `Err`. A panic or a dropped future drops the transaction, which also
/// rolls it back. The error from `work` is always returned unchanged.
pub async fn with_transaction<T, F>(store: &dyn Store, work: F) -> Result<T, AppError>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut Box<dyn StoreTx>) -> BoxFuture<'t, Result<T, AppError>> + Send,
{
    let mut tx = store.begin().await?;

    match work(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed after error ({e}): {rollback_err}");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    fn task(user_id: Uuid) -> TaskRow {
        let now = Utc::now();
        TaskRow {
            id: Uuid::new_v4(),
            user_id,
            title: "Water plants".to_string(),
            description: None,
            due_at: None,
            status: "todo".to_string(),
            source: "manual".to_string(),
            ai_interpretation_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_with_transaction_commits_on_ok() {
        let store = MemoryStore::new();
        let row = task(Uuid::new_v4());
        let id = row.id;

        let returned = with_transaction(&store, move |tx| {
            Box::pin(async move {
                tx.insert_task(&row).await?;
                Ok(row.id)
            })
        })
        .await
        .unwrap();

        assert_eq!(returned, id);
        assert_eq!(store.snapshot().await.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_with_transaction_rolls_back_and_returns_error() {
        let store = MemoryStore::new();
        let row = task(Uuid::new_v4());

        let err = with_transaction(&store, move |tx| {
            Box::pin(async move {
                tx.insert_task(&row).await?;
                Err::<(), _>(AppError::InvalidState("stop".into()))
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::InvalidState(ref m) if m == "stop"));
        assert!(store.snapshot().await.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_with_transaction_rolls_back_on_panic() {
        let store = MemoryStore::new();
        let row = task(Uuid::new_v4());
        let panicking = store.clone();

        let handle = tokio::spawn(async move {
            let _ = with_transaction(&panicking, move |tx| {
                Box::pin(async move {
                    tx.insert_task(&row).await?;
                    if !row.title.is_empty() {
                        panic!("boom");
                    }
                    Ok(())
                })
            })
            .await;
        });

        assert!(handle.await.is_err());
        assert!(store.snapshot().await.tasks.is_empty());
    }
}
