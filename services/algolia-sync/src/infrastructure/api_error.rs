//! トリガーエンドポイントのエラーレスポンス
//!
//! すべてのエラーはJSON形式で返却され、`error`と`message`フィールドを含む。
//! 4xxはトリガーランタイムに再試行させない恒久的な失敗、
//! 5xxは再試行ポリシーの対象となる一時的な失敗を表す。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::application::SyncError;
use crate::infrastructure::firestore_event::EventDecodeError;

/// エラーレスポンスのボディ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    /// エラー種別（例: "bad_request", "invalid_document_shape", "index_error"）
    pub error: String,
    /// 詳細なエラーメッセージ
    pub message: String,
}

/// エンドポイントのエラー
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorBody,
}

impl ApiError {
    /// 新しいApiErrorを作成
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                error: error.into(),
                message: message.into(),
            },
        }
    }

    /// 400 Bad Requestエラーを作成
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// エラー種別を取得
    pub fn error(&self) -> &str {
        &self.body.error
    }

    /// エラーメッセージを取得
    pub fn message(&self) -> &str {
        &self.body.message
    }

    /// ステータスコードを取得
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<EventDecodeError> for ApiError {
    fn from(err: EventDecodeError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Shape(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "invalid_document_shape", err.to_string())
            }
            SyncError::Index { .. } => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "index_error", err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
