//! Firestoreトリガー受信用HTTPルーター
//!
//! トリガーランタイムはドキュメント変更ごとにイベントデータを`POST /`で送信する。
//! - 2xx: 処理完了
//! - 4xx: 恒久的な失敗（デコード不能、整形不能）
//! - 5xx: 一時的な失敗（インデックス操作エラー。ランタイムの再試行対象）

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::application::{SyncHandler, SyncOutcome};
use crate::infrastructure::api_error::ApiError;
use crate::infrastructure::firestore_event::FirestoreEvent;
use crate::infrastructure::index_handle::IndexHandle;

/// CloudEvent IDヘッダー
const CE_ID_HEADER: &str = "ce-id";

/// CloudEvent種別ヘッダー
const CE_TYPE_HEADER: &str = "ce-type";

/// CloudEventサブジェクトヘッダー（例: "documents/users/u1"）
const CE_SUBJECT_HEADER: &str = "ce-subject";

/// ルーター全体で共有される状態
pub struct AppState<I>
where
    I: IndexHandle,
{
    handler: Arc<SyncHandler<I>>,
}

impl<I> Clone for AppState<I>
where
    I: IndexHandle,
{
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

/// 同期成功時のレスポンスボディ
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncResponse {
    /// "upserted" または "deleted"
    pub action: &'static str,
    /// 操作したレコード識別子
    #[serde(rename = "objectIDs")]
    pub object_ids: Vec<String>,
    /// Algoliaタスク ID
    #[serde(rename = "taskID")]
    pub task_id: i64,
}

impl From<&SyncOutcome> for SyncResponse {
    fn from(outcome: &SyncOutcome) -> Self {
        let action = match outcome {
            SyncOutcome::Deleted { .. } => "deleted",
            SyncOutcome::Upserted { .. } => "upserted",
        };
        Self {
            action,
            object_ids: outcome.object_ids(),
            task_id: outcome.task().task_id,
        }
    }
}

/// ルーターを構築する
///
/// TraceLayerによりリクエスト/レスポンスの構造化ログを自動記録する。
pub fn create_router<I>(handler: Arc<SyncHandler<I>>) -> Router
where
    I: IndexHandle + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/", post(receive_event::<I>))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { handler })
}

/// ヘルスチェックエンドポイント
async fn health() -> &'static str {
    "OK"
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// トリガーイベント受信エンドポイント (POST /)
async fn receive_event<I>(
    State(state): State<AppState<I>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    I: IndexHandle + 'static,
{
    let span = info_span!(
        "firestore_event",
        event_id = header_str(&headers, CE_ID_HEADER).unwrap_or_default(),
        event_type = header_str(&headers, CE_TYPE_HEADER).unwrap_or_default(),
        subject = header_str(&headers, CE_SUBJECT_HEADER).unwrap_or_default(),
    );

    async move {
        match process(&state, &headers, &body).await {
            Ok(response) => (axum::http::StatusCode::OK, Json(response)).into_response(),
            Err(err) => {
                if err.status().is_server_error() {
                    error!(error = err.message(), "同期に失敗（再試行対象）");
                } else {
                    warn!(error = err.message(), "同期に失敗（恒久的）");
                }
                err.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn process<I>(
    state: &AppState<I>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<SyncResponse, ApiError>
where
    I: IndexHandle,
{
    let event: FirestoreEvent = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("イベントのパースに失敗: {}", e)))?;

    if let Some(mask) = &event.update_mask {
        debug!(field_paths = ?mask.field_paths, "更新マスク");
    }

    let change = event.into_change_event(header_str(headers, CE_SUBJECT_HEADER))?;
    let outcome = state.handler.handle(&change).await?;

    info!(
        document_id = change.after().id(),
        kind = %change.kind(),
        object_count = outcome.object_ids().len(),
        "同期完了"
    );

    Ok(SyncResponse::from(&outcome))
}
