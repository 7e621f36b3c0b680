//! Interpretation store: the only path through which interpretations and
//! their items enter the database, plus the owner-scoped read queries.

use chrono::Utc;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::db::{with_transaction, Store};
use crate::errors::AppError;
use crate::interpretation::interpreter::ModelInterpretation;
use crate::interpretation::models::{InterpretationPage, InterpretationResult, ListParams};
use crate::items::models::{ItemStatus, ResourceType, TaskData};
use crate::models::interpretation::{InterpretationItemRow, InterpretationRow};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Inserts `parent` and `items` in one transaction, items in `item_index`
/// order. Nil ids are replaced with fresh ones and every row gets the same
/// server-side timestamp. Any failure leaves neither parent nor children.
pub async fn create_interpretation(
    store: &dyn Store,
    mut parent: InterpretationRow,
    mut items: Vec<InterpretationItemRow>,
) -> Result<(InterpretationRow, Vec<InterpretationItemRow>), AppError> {
    let now = Utc::now();

    if parent.id.is_nil() {
        parent.id = Uuid::new_v4();
    }
    parent.created_at = now;
    parent.updated_at = now;

    items.sort_by_key(|item| item.item_index);
    for item in &mut items {
        check_item(item)?;
        if item.id.is_nil() {
            item.id = Uuid::new_v4();
        }
        item.interpretation_id = parent.id;
        item.created_at = now;
        item.updated_at = now;
    }

    let (parent, items) = with_transaction(store, move |tx| {
        Box::pin(async move {
            tx.insert_interpretation(&parent).await?;
            for item in &items {
                tx.insert_item(item).await?;
            }
            Ok((parent, items))
        })
    })
    .await?;

    info!(
        "Created interpretation {} with {} item(s)",
        parent.id,
        items.len()
    );
    Ok((parent, items))
}

/// Rejects rows whose `{status, resource_id, reviewed_at}` disagree.
fn check_item(item: &InterpretationItemRow) -> Result<(), AppError> {
    if item.item_index < 0 {
        return Err(AppError::InvalidRequest(format!(
            "item_index must be >= 0, got {}",
            item.item_index
        )));
    }
    let consistent = match ItemStatus::parse(&item.status) {
        Some(ItemStatus::Pending) => item.resource_id.is_none() && item.reviewed_at.is_none(),
        Some(ItemStatus::Created) => item.resource_id.is_some() && item.reviewed_at.is_some(),
        None => false,
    };
    if !consistent {
        return Err(AppError::InvalidState(format!(
            "item {} has inconsistent status '{}'",
            item.item_index, item.status
        )));
    }
    Ok(())
}

/// Stages one model call: the parent record plus one pending `task` item.
pub async fn stage_interpretation(
    store: &dyn Store,
    user_id: Uuid,
    input_text: String,
    model: ModelInterpretation,
) -> Result<(InterpretationRow, Vec<InterpretationItemRow>), AppError> {
    let now = Utc::now();
    let structured_result = serde_json::to_value(&model.result)
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    let item = pending_task_item(&model.result, model.original_data, now)?;

    let parent = InterpretationRow {
        id: Uuid::new_v4(),
        user_id,
        input_text,
        structured_result,
        original_result: model.original_result,
        ai_model: model.model,
        ai_prompt_tokens: Some(model.prompt_tokens),
        ai_completion_tokens: Some(model.completion_tokens),
        created_at: now,
        updated_at: now,
    };

    create_interpretation(store, parent, vec![item]).await
}

fn pending_task_item(
    result: &InterpretationResult,
    original_data: Value,
    now: chrono::DateTime<Utc>,
) -> Result<InterpretationItemRow, AppError> {
    let task = TaskData {
        title: result.title.clone(),
        description: result.description.clone(),
        due_at: result.metadata.deadline.map(|d| d.with_timezone(&Utc)),
        priority: result.metadata.priority.clone(),
        status: None,
        tags: result.metadata.tags.clone(),
    };
    let data =
        serde_json::to_value(&task).map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

    Ok(InterpretationItemRow {
        id: Uuid::nil(),
        interpretation_id: Uuid::nil(),
        item_index: 0,
        resource_type: ResourceType::Task.as_str().to_string(),
        status: ItemStatus::Pending.as_str().to_string(),
        resource_id: None,
        data,
        original_data,
        reviewed_at: None,
        created_at: now,
        updated_at: now,
    })
}

/// Fetches an interpretation owned by `user_id`. Other owners see `NotFound`.
pub async fn get_interpretation(
    store: &dyn Store,
    user_id: Uuid,
    id: Uuid,
) -> Result<InterpretationRow, AppError> {
    with_transaction(store, move |tx| {
        Box::pin(async move {
            match tx.find_interpretation(id).await? {
                Some(row) if row.user_id == user_id => Ok(row),
                _ => Err(AppError::NotFound(format!("Interpretation {id} not found"))),
            }
        })
    })
    .await
}

/// Newest first. `limit` defaults to 20 and is clamped to `[1, 100]`;
/// a negative `offset` is rejected. `total` counts all of the user's rows.
pub async fn list_interpretations(
    store: &dyn Store,
    user_id: Uuid,
    params: ListParams,
) -> Result<InterpretationPage, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::InvalidRequest(format!(
            "offset must be >= 0, got {offset}"
        )));
    }

    with_transaction(store, move |tx| {
        Box::pin(async move {
            let interpretations = tx.list_interpretations(user_id, limit, offset).await?;
            let total = tx.count_interpretations(user_id).await?;
            Ok(InterpretationPage {
                interpretations,
                total,
                limit,
                offset,
            })
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::interpretation::interpreter::parse_model_output;
    use chrono::Duration;
    use serde_json::json;

    const BUY_MILK: &str = r#"{"type":"todo","title":"Buy milk","metadata":{"deadline":"2030-01-01T09:00:00Z","priority":"medium","tags":["shopping"]}}"#;

    fn model_output() -> ModelInterpretation {
        parse_model_output(BUY_MILK.into(), None, "Buy milk tomorrow", "canned-model").unwrap()
    }

    fn parent(user_id: Uuid) -> InterpretationRow {
        let now = Utc::now();
        InterpretationRow {
            id: Uuid::nil(),
            user_id,
            input_text: "text".into(),
            structured_result: json!({"type": "todo", "title": "t"}),
            original_result: "{}".into(),
            ai_model: "m".into(),
            ai_prompt_tokens: None,
            ai_completion_tokens: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(index: i32) -> InterpretationItemRow {
        let now = Utc::now();
        InterpretationItemRow {
            id: Uuid::nil(),
            interpretation_id: Uuid::nil(),
            item_index: index,
            resource_type: "task".into(),
            status: "pending".into(),
            resource_id: None,
            data: json!({"title": format!("item {index}")}),
            original_data: json!({"title": format!("item {index}")}),
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_stage_writes_parent_and_pending_task_item() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        let (parent, items) =
            stage_interpretation(&store, user_id, "Buy milk tomorrow".into(), model_output())
                .await
                .unwrap();

        assert_eq!(parent.original_result, BUY_MILK);
        assert_eq!(parent.ai_prompt_tokens, Some(4));
        assert_eq!(parent.ai_completion_tokens, Some(100));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].interpretation_id, parent.id);
        assert_eq!(items[0].status, "pending");
        assert_eq!(items[0].data["title"], "Buy milk");
        assert_eq!(items[0].data["due_at"], "2030-01-01T09:00:00Z");
        assert_eq!(items[0].original_data, serde_json::from_str::<Value>(BUY_MILK).unwrap());
        assert_eq!(parent.created_at, items[0].created_at);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.interpretations.len(), 1);
        assert_eq!(snapshot.items.len(), 1);
    }

    #[tokio::test]
    async fn test_create_inserts_items_in_index_order_with_fresh_ids() {
        let store = MemoryStore::new();
        let (_, items) = create_interpretation(
            &store,
            parent(Uuid::new_v4()),
            vec![item(2), item(0), item(1)],
        )
        .await
        .unwrap();

        let indexes: Vec<i32> = items.iter().map(|i| i.item_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(items.iter().all(|i| !i.id.is_nil()));
    }

    #[tokio::test]
    async fn test_failed_child_insert_leaves_no_parent() {
        let store = MemoryStore::new();

        let err = create_interpretation(&store, parent(Uuid::new_v4()), vec![item(0), item(0)])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
        let snapshot = store.snapshot().await;
        assert!(snapshot.interpretations.is_empty());
        assert!(snapshot.items.is_empty());
    }

    #[tokio::test]
    async fn test_inconsistent_item_is_refused_before_writing() {
        let store = MemoryStore::new();
        let mut bad = item(0);
        bad.status = "created".into();

        let err = create_interpretation(&store, parent(Uuid::new_v4()), vec![bad])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(store.snapshot().await.interpretations.is_empty());
    }

    #[tokio::test]
    async fn test_get_hides_other_users_rows() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let (row, _) = create_interpretation(&store, parent(owner), vec![]).await.unwrap();

        assert_eq!(get_interpretation(&store, owner, row.id).await.unwrap().id, row.id);
        assert!(matches!(
            get_interpretation(&store, Uuid::new_v4(), row.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let base = Utc::now();
        store
            .seed(|state| {
                for n in 0..5 {
                    let mut row = parent(user_id);
                    row.id = Uuid::new_v4();
                    row.input_text = format!("note {n}");
                    row.created_at = base + Duration::seconds(n);
                    state.interpretations.push(row);
                }
                let mut other = parent(Uuid::new_v4());
                other.id = Uuid::new_v4();
                state.interpretations.push(other);
            })
            .await;

        for (limit, offset, expected) in [(2, 0, 2), (2, 4, 1), (10, 0, 5), (3, 5, 0), (3, 9, 0)] {
            let page = list_interpretations(
                &store,
                user_id,
                ListParams {
                    limit: Some(limit),
                    offset: Some(offset),
                },
            )
            .await
            .unwrap();
            assert_eq!(page.interpretations.len(), expected, "limit={limit} offset={offset}");
            assert_eq!(page.total, 5);
        }

        let page = list_interpretations(&store, user_id, ListParams::default())
            .await
            .unwrap();
        let texts: Vec<&str> = page.interpretations.iter().map(|r| r.input_text.as_str()).collect();
        assert_eq!(texts, vec!["note 4", "note 3", "note 2", "note 1", "note 0"]);
        assert_eq!((page.limit, page.offset), (20, 0));
    }

    #[tokio::test]
    async fn test_list_clamps_limit_and_rejects_negative_offset() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        let page = list_interpretations(
            &store,
            user_id,
            ListParams {
                limit: Some(1000),
                offset: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(page.limit, 100);

        let page = list_interpretations(
            &store,
            user_id,
            ListParams {
                limit: Some(0),
                offset: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(page.limit, 1);

        assert!(matches!(
            list_interpretations(
                &store,
                user_id,
                ListParams {
                    limit: None,
                    offset: Some(-1)
                }
            )
            .await,
            Err(AppError::InvalidRequest(_))
        ));
    }
}
