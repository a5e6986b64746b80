/// 検索インデックス操作の抽象化
///
/// ディスパッチャーはこのトレイト越しにインデックスを操作するため、
/// 実際のAlgoliaクライアントとテスト用モックを差し替えられる。
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::Record;

/// インデックス操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    /// HTTPエラー（ステータスコード付き）
    #[error("HTTPエラー: status={status}, message={message}")]
    HttpError {
        /// HTTPステータスコード
        status: u16,
        /// エラーメッセージ
        message: String,
    },

    /// ネットワークエラー
    #[error("ネットワークエラー: {0}")]
    NetworkError(String),

    /// シリアライズエラー
    #[error("シリアライズエラー: {0}")]
    SerializationError(String),

    /// 再試行回数超過エラー
    #[error("再試行回数超過: {0}")]
    RetryExhausted(String),

    /// レスポンスの形式が不正
    #[error("不正なレスポンス: {0}")]
    InvalidResponse(String),
}

/// インデックス操作の完了シグナル
///
/// Algoliaのバッチ応答`{"taskID": n, "objectIDs": [...]}`に対応する。
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct IndexTask {
    /// 非同期タスクID
    #[serde(rename = "taskID")]
    pub task_id: i64,
    /// 操作対象のレコード識別子
    #[serde(rename = "objectIDs", default)]
    pub object_ids: Vec<String>,
}

/// 検索インデックスハンドル
///
/// このシステムが所有しない外部インデックスへの接続を表す。呼び出し側から注入される。
#[async_trait]
pub trait IndexHandle: Send + Sync {
    /// レコードを追加または置換（upsert）
    ///
    /// # 引数
    /// * `records` - 保存するレコード（各レコードは`objectID`を持つ）
    ///
    /// # 戻り値
    /// * 成功時は`Ok(IndexTask)`
    /// * 失敗時は`Err(IndexError)`
    async fn save_objects(&self, records: &[Record]) -> Result<IndexTask, IndexError>;

    /// レコードを削除
    ///
    /// # 引数
    /// * `object_ids` - 削除するレコード識別子
    async fn delete_objects(&self, object_ids: &[String]) -> Result<IndexTask, IndexError>;
}
