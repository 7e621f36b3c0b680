//! In-memory `Store` for tests.
//!
//! A transaction holds the store lock for its whole lifetime and works on a
//! copy of the state; `commit` swaps the copy in, anything else discards it.
//! Keys and foreign keys mirror the SQL schema.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::db::{Store, StoreTx};
use crate::errors::AppError;
use crate::models::interpretation::{InterpretationItemRow, InterpretationRow};
use crate::models::task::TaskRow;
use crate::models::user::{UserRow, UserUpsert};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub users: Vec<UserRow>,
    pub interpretations: Vec<InterpretationRow>,
    pub items: Vec<InterpretationItemRow>,
    pub tasks: Vec<TaskRow>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_task_inserts: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Writes rows directly, bypassing the pipeline.
    pub async fn seed(&self, seed: impl FnOnce(&mut MemoryState)) {
        seed(&mut *self.state.lock().await);
    }

    /// Makes every subsequent `insert_task` fail with a database error.
    pub fn fail_task_inserts(&self, fail: bool) {
        self.fail_task_inserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            fail_task_inserts: self.fail_task_inserts.load(Ordering::SeqCst),
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_task_inserts: bool,
}

fn constraint(message: &str) -> AppError {
    AppError::Database(sqlx::Error::Protocol(message.to_string()))
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn upsert_user(
        &mut self,
        user: &UserUpsert,
        now: DateTime<Utc>,
    ) -> Result<UserRow, AppError> {
        if let Some(existing) = self
            .working
            .users
            .iter_mut()
            .find(|u| u.google_id == user.google_id)
        {
            existing.email = user.email.clone();
            existing.nickname = user.nickname.clone();
            if user.avatar.is_some() {
                existing.avatar = user.avatar.clone();
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let row = UserRow {
            id: Uuid::new_v4(),
            google_id: user.google_id.clone(),
            email: user.email.clone(),
            nickname: user.nickname.clone(),
            avatar: user.avatar.clone(),
            created_at: now,
            updated_at: now,
        };
        self.working.users.push(row.clone());
        Ok(row)
    }

    async fn insert_interpretation(&mut self, row: &InterpretationRow) -> Result<(), AppError> {
        if self.working.interpretations.iter().any(|i| i.id == row.id) {
            return Err(constraint("duplicate key ai_interpretations.id"));
        }
        self.working.interpretations.push(row.clone());
        Ok(())
    }

    async fn find_interpretation(
        &mut self,
        id: Uuid,
    ) -> Result<Option<InterpretationRow>, AppError> {
        Ok(self
            .working
            .interpretations
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn list_interpretations(
        &mut self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InterpretationRow>, AppError> {
        let mut rows: Vec<_> = self
            .working
            .interpretations
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_interpretations(&mut self, user_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .working
            .interpretations
            .iter()
            .filter(|i| i.user_id == user_id)
            .count() as i64)
    }

    async fn insert_item(&mut self, row: &InterpretationItemRow) -> Result<(), AppError> {
        if !self
            .working
            .interpretations
            .iter()
            .any(|i| i.id == row.interpretation_id)
        {
            return Err(constraint("foreign key interpretation_items.interpretation_id"));
        }
        if self.working.items.iter().any(|i| {
            i.id == row.id
                || (i.interpretation_id == row.interpretation_id && i.item_index == row.item_index)
        }) {
            return Err(constraint("duplicate key interpretation_items"));
        }
        self.working.items.push(row.clone());
        Ok(())
    }

    async fn find_item(&mut self, id: Uuid) -> Result<Option<InterpretationItemRow>, AppError> {
        Ok(self.working.items.iter().find(|i| i.id == id).cloned())
    }

    async fn list_items(
        &mut self,
        interpretation_id: Uuid,
    ) -> Result<Vec<InterpretationItemRow>, AppError> {
        let mut rows: Vec<_> = self
            .working
            .items
            .iter()
            .filter(|i| i.interpretation_id == interpretation_id)
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.item_index);
        Ok(rows)
    }

    async fn update_pending_item_data(
        &mut self,
        id: Uuid,
        data: &Value,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self
            .working
            .items
            .iter_mut()
            .find(|i| i.id == id && i.status == "pending")
        {
            Some(item) => {
                item.data = data.clone();
                item.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_item_created(
        &mut self,
        id: Uuid,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self
            .working
            .items
            .iter_mut()
            .find(|i| i.id == id && i.status == "pending")
        {
            Some(item) => {
                item.status = "created".to_string();
                item.resource_id = Some(resource_id);
                item.reviewed_at = Some(now);
                item.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_task(&mut self, task: &TaskRow) -> Result<(), AppError> {
        if self.fail_task_inserts {
            return Err(constraint("injected task insert failure"));
        }
        self.working.tasks.push(task.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}
