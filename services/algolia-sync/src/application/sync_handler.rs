/// ドキュメント変更の同期ハンドラー
///
/// 変更イベントの(before, after)を見て、削除かupsertのどちらか一方だけを
/// インデックスに対して実行する。再試行や部分失敗の処理は行わず、
/// インデックスのエラーはそのまま呼び出し元（トリガーランタイム）に返す。
use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{ChangeEvent, DocumentSnapshot, RecordShaper, ShapeError};
use crate::infrastructure::{IndexError, IndexHandle, IndexTask};

/// エラーを発生させたインデックス操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOperation {
    /// saveObjects
    Save,
    /// deleteObjects
    Delete,
}

impl fmt::Display for IndexOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexOperation::Save => write!(f, "save_objects"),
            IndexOperation::Delete => write!(f, "delete_objects"),
        }
    }
}

/// 同期処理のエラー型
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// ドキュメントをレコードに整形できない
    #[error("レコード整形に失敗: {0}")]
    Shape(#[from] ShapeError),

    /// インデックス操作の失敗
    #[error("インデックス操作 {operation} に失敗: {source}")]
    Index {
        /// 失敗した操作
        operation: IndexOperation,
        /// 元のエラー
        source: IndexError,
    },
}

/// 同期処理の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// レコードを削除した
    Deleted {
        /// 削除したレコード識別子
        object_id: String,
        /// インデックス操作の完了シグナル
        task: IndexTask,
    },
    /// レコードを保存した
    Upserted {
        /// 保存したレコード識別子
        object_ids: Vec<String>,
        /// インデックス操作の完了シグナル
        task: IndexTask,
    },
}

impl SyncOutcome {
    /// 操作対象のレコード識別子
    pub fn object_ids(&self) -> Vec<String> {
        match self {
            SyncOutcome::Deleted { object_id, .. } => vec![object_id.clone()],
            SyncOutcome::Upserted { object_ids, .. } => object_ids.clone(),
        }
    }

    /// インデックス操作の完了シグナル
    pub fn task(&self) -> &IndexTask {
        match self {
            SyncOutcome::Deleted { task, .. } | SyncOutcome::Upserted { task, .. } => task,
        }
    }
}

/// FirestoreのドキュメントをAlgoliaに同期するハンドラー
pub struct SyncHandler<I>
where
    I: IndexHandle,
{
    /// 注入されたインデックスハンドル
    index: I,
    /// レコード整形
    shaper: RecordShaper,
}

impl<I> SyncHandler<I>
where
    I: IndexHandle,
{
    /// 新しいSyncHandlerを作成
    pub fn new(index: I, shaper: RecordShaper) -> Self {
        Self { index, shaper }
    }

    /// 変更イベントを処理する
    ///
    /// - `after`が存在しない: `before`のキーで`delete_objects`を呼ぶ
    /// - それ以外: `after`を整形して`save_objects`を呼ぶ
    ///
    /// 1回の呼び出しで実行するインデックス操作はちょうど1つ。
    pub async fn handle(&self, change: &ChangeEvent) -> Result<SyncOutcome, SyncError> {
        debug!(
            document_id = change.after().id(),
            kind = %change.kind(),
            "変更イベントを処理"
        );

        if !change.after().exists() {
            return self.remove_object(change.before()).await;
        }

        self.update_existing_or_add_new(change.after()).await
    }

    /// 変更前のキーでレコードを削除
    async fn remove_object(&self, before: &DocumentSnapshot) -> Result<SyncOutcome, SyncError> {
        let object_id = before.key().to_string();

        let task = self
            .index
            .delete_objects(std::slice::from_ref(&object_id))
            .await
            .map_err(|source| {
                warn!(object_id = %object_id, error = %source, "レコード削除に失敗");
                SyncError::Index {
                    operation: IndexOperation::Delete,
                    source,
                }
            })?;

        info!(object_id = %object_id, task_id = task.task_id, "レコードを削除");

        Ok(SyncOutcome::Deleted { object_id, task })
    }

    /// 変更後のドキュメントを整形して保存
    async fn update_existing_or_add_new(
        &self,
        after: &DocumentSnapshot,
    ) -> Result<SyncOutcome, SyncError> {
        let records = self.shaper.shape(after).inspect_err(|e| {
            warn!(document_id = after.id(), error = %e, "レコード整形に失敗");
        })?;

        let object_ids: Vec<String> = records
            .iter()
            .map(|record| record.object_id().to_string())
            .collect();

        let task = self.index.save_objects(&records).await.map_err(|source| {
            warn!(document_id = after.id(), error = %source, "レコード保存に失敗");
            SyncError::Index {
                operation: IndexOperation::Save,
                source,
            }
        })?;

        info!(
            document_id = after.id(),
            record_count = records.len(),
            task_id = task.task_id,
            "レコードを保存"
        );

        Ok(SyncOutcome::Upserted { object_ids, task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentShape, Payload, ShapePolicy};
    use crate::infrastructure::index_handle::tests::{IndexCall, MockIndexHandle};
    use crate::infrastructure::logging::init_test_logging;
    use serde_json::{Value, json};

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            other => panic!("オブジェクトではありません: {:?}", other),
        }
    }

    fn create_handler(index: MockIndexHandle) -> SyncHandler<MockIndexHandle> {
        SyncHandler::new(index, RecordShaper::default())
    }

    fn deletion(id: &str, before: Value) -> ChangeEvent {
        ChangeEvent::new(
            DocumentSnapshot::new(id, payload(before)),
            DocumentSnapshot::missing(id),
        )
    }

    fn upsert(id: &str, after: Value) -> ChangeEvent {
        ChangeEvent::new(
            DocumentSnapshot::missing(id),
            DocumentSnapshot::new(id, payload(after)),
        )
    }

    // ==================== 削除パス ====================

    #[tokio::test]
    async fn test_delete_calls_only_delete_objects() {
        init_test_logging();
        let index = MockIndexHandle::with_task_id(11);
        let handler = create_handler(index.clone());

        let outcome = handler
            .handle(&deletion("u1", json!({"name": "Alice"})))
            .await
            .expect("同期に失敗");

        assert_eq!(index.calls(), vec![IndexCall::Delete(vec!["u1".to_string()])]);
        assert_eq!(
            outcome,
            SyncOutcome::Deleted {
                object_id: "u1".to_string(),
                task: IndexTask {
                    task_id: 11,
                    object_ids: vec!["u1".to_string()],
                },
            }
        );
    }

    #[tokio::test]
    async fn test_delete_uses_before_key_for_nested_document() {
        // Nestedドキュメントの削除でもドキュメント自身のキーを使う
        let index = MockIndexHandle::new();
        let handler = create_handler(index.clone());

        handler
            .handle(&deletion("container", json!({"n1": {"name": "A"}})))
            .await
            .expect("同期に失敗");

        assert_eq!(
            index.calls(),
            vec![IndexCall::Delete(vec!["container".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_delete_failure_is_tagged_and_propagated() {
        let index = MockIndexHandle::new();
        let error = IndexError::HttpError {
            status: 500,
            message: "boom".to_string(),
        };
        index.fail_with(error.clone());
        let handler = create_handler(index);

        let result = handler.handle(&deletion("u1", json!({"a": 1}))).await;

        assert_eq!(
            result,
            Err(SyncError::Index {
                operation: IndexOperation::Delete,
                source: error,
            })
        );
    }

    // ==================== upsertパス ====================

    #[tokio::test]
    async fn test_upsert_flat_calls_only_save_objects() {
        let index = MockIndexHandle::new();
        let handler = create_handler(index.clone());

        let outcome = handler
            .handle(&upsert("u1", json!({"name": "Alice", "age": 30})))
            .await
            .expect("同期に失敗");

        let calls = index.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            IndexCall::Save(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(
                    records[0].to_value(),
                    json!({"name": "Alice", "age": 30, "objectID": "u1"})
                );
            }
            other => panic!("予期しない呼び出し: {:?}", other),
        }
        assert_eq!(outcome.object_ids(), vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn test_upsert_nested_saves_one_record_per_entry() {
        let index = MockIndexHandle::new();
        let handler = create_handler(index.clone());

        let outcome = handler
            .handle(&upsert(
                "container",
                json!({"n1": {"name": "A"}, "n2": {"name": "B"}}),
            ))
            .await
            .expect("同期に失敗");

        assert_eq!(
            outcome.object_ids(),
            vec!["n1".to_string(), "n2".to_string()]
        );
        assert!(matches!(&index.calls()[..], [IndexCall::Save(records)] if records.len() == 2));
    }

    #[tokio::test]
    async fn test_update_with_existing_before_upserts() {
        let index = MockIndexHandle::new();
        let handler = create_handler(index.clone());
        let change = ChangeEvent::new(
            DocumentSnapshot::new("u1", payload(json!({"name": "Old"}))),
            DocumentSnapshot::new("u1", payload(json!({"name": "New"}))),
        );

        let outcome = handler.handle(&change).await.expect("同期に失敗");

        assert!(matches!(outcome, SyncOutcome::Upserted { .. }));
        assert!(
            index
                .calls()
                .iter()
                .all(|call| matches!(call, IndexCall::Save(_)))
        );
    }

    #[tokio::test]
    async fn test_upsert_shape_error_skips_index() {
        let index = MockIndexHandle::new();
        let handler = create_handler(index.clone());

        let result = handler.handle(&upsert("empty", json!({}))).await;

        assert_eq!(
            result,
            Err(SyncError::Shape(ShapeError::EmptyDocument {
                id: "empty".to_string()
            }))
        );
        assert!(index.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_failure_is_tagged_and_propagated() {
        let index = MockIndexHandle::new();
        index.fail_with(IndexError::NetworkError("timeout".to_string()));
        let handler = create_handler(index);

        let result = handler.handle(&upsert("u1", json!({"a": 1}))).await;

        assert!(matches!(
            result,
            Err(SyncError::Index {
                operation: IndexOperation::Save,
                source: IndexError::NetworkError(_),
            })
        ));
    }

    #[tokio::test]
    async fn test_declared_policy_is_applied() {
        let index = MockIndexHandle::new();
        let handler = SyncHandler::new(
            index.clone(),
            RecordShaper::new(ShapePolicy::Declared(DocumentShape::Flat)),
        );

        let outcome = handler
            .handle(&upsert("u1", json!({"address": {"city": "Tokyo"}})))
            .await
            .expect("同期に失敗");

        assert_eq!(outcome.object_ids(), vec!["u1".to_string()]);
    }

    // ==================== 型テスト ====================

    #[test]
    fn test_outcome_task_accessor() {
        let task = IndexTask {
            task_id: 3,
            object_ids: vec![],
        };
        let outcome = SyncOutcome::Deleted {
            object_id: "u1".to_string(),
            task: task.clone(),
        };
        assert_eq!(outcome.task(), &task);
    }

    #[test]
    fn test_error_display_includes_operation() {
        let error = SyncError::Index {
            operation: IndexOperation::Delete,
            source: IndexError::NetworkError("x".to_string()),
        };
        assert!(error.to_string().contains("delete_objects"));

        let error = SyncError::from(ShapeError::EmptyDocument {
            id: "d".to_string(),
        });
        assert!(error.to_string().contains("レコード整形"));
    }
}
