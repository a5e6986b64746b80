// AlgoliaIndexClient - Algolia REST APIクライアント
//
// バッチAPI（POST /1/indexes/{indexName}/batch）でレコードの保存・削除を行う。
// saveObjectsはupdateObject、deleteObjectsはdeleteObjectアクションの一括送信。

use super::config::AlgoliaConfig;
use crate::domain::{OBJECT_ID_FIELD, Record};
use crate::infrastructure::index_handle::{IndexError, IndexHandle, IndexTask};
use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Serialize;
use serde::ser::SerializeMap;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use url::Url;

/// 最大再試行回数
const MAX_RETRIES: u32 = 3;

/// リクエストタイムアウト（秒）
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// 接続タイムアウト（秒）
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// アプリケーションIDヘッダー
const APPLICATION_ID_HEADER: &str = "X-Algolia-Application-Id";

/// APIキーヘッダー
const API_KEY_HEADER: &str = "X-Algolia-API-Key";

/// 削除リクエストのボディ（{"objectID": "..."}）
struct ObjectIdBody<'a>(&'a str);

impl Serialize for ObjectIdBody<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(OBJECT_ID_FIELD, self.0)?;
        map.end()
    }
}

/// バッチ操作1件（{"action": "...", "body": {...}}）
#[derive(Serialize)]
#[serde(tag = "action", content = "body", rename_all = "camelCase")]
enum BatchOperation<'a> {
    UpdateObject(&'a Record),
    DeleteObject(ObjectIdBody<'a>),
}

/// バッチリクエスト
#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<BatchOperation<'a>>,
}

/// AlgoliaIndexClient - Algoliaインデックスへの書き込みクライアント
///
/// 指数バックオフによる再試行機能を持つ。
#[derive(Clone)]
pub struct AlgoliaIndexClient {
    /// HTTPクライアント（再試行ミドルウェア付き）
    client: ClientWithMiddleware,
    /// バッチエンドポイントURL
    batch_url: Url,
    /// アプリケーションID
    app_id: String,
    /// APIキー
    api_key: String,
    /// インデックス名
    index_name: String,
}

impl std::fmt::Debug for AlgoliaIndexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgoliaIndexClient")
            .field("batch_url", &self.batch_url.as_str())
            .field("index_name", &self.index_name)
            .finish_non_exhaustive()
    }
}

impl AlgoliaIndexClient {
    /// 設定からAlgoliaIndexClientを作成
    ///
    /// # エラー
    /// - `NetworkError`: HTTPクライアントの構築に失敗
    /// - `InvalidResponse`: ホストURLからバッチURLを構築できない
    pub fn new(config: &AlgoliaConfig) -> Result<Self, IndexError> {
        info!(
            host = %config.host(),
            index_name = config.index_name(),
            "AlgoliaIndexClientを初期化"
        );

        let base_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| IndexError::NetworkError(format!("HTTPクライアントの構築に失敗: {}", e)))?;

        // 指数バックオフ再試行ポリシー
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);

        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            batch_url: Self::build_batch_url(config.host(), config.index_name())?,
            app_id: config.app_id().to_string(),
            api_key: config.api_key().to_string(),
            index_name: config.index_name().to_string(),
        })
    }

    /// バッチエンドポイントURLを構築（インデックス名はパーセントエンコードされる）
    fn build_batch_url(host: &Url, index_name: &str) -> Result<Url, IndexError> {
        let mut url = host.clone();
        url.path_segments_mut()
            .map_err(|_| IndexError::InvalidResponse(format!("ベースURLにできないホスト: {}", host)))?
            .pop_if_empty()
            .extend(["1", "indexes", index_name, "batch"]);
        Ok(url)
    }

    /// インデックス名を取得
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// バッチエンドポイントURLを取得
    pub fn batch_url(&self) -> &str {
        self.batch_url.as_str()
    }

    /// バッチリクエストを送信
    async fn send_batch(&self, request: &BatchRequest<'_>) -> Result<IndexTask, IndexError> {
        let body = serde_json::to_vec(request).map_err(|e| {
            error!(error = %e, "バッチリクエストのシリアライズに失敗");
            IndexError::SerializationError(e.to_string())
        })?;

        let response = self
            .client
            .post(self.batch_url.clone())
            .header(APPLICATION_ID_HEADER, &self.app_id)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "バッチリクエスト失敗");
                if e.is_timeout() || e.is_connect() {
                    IndexError::NetworkError(e.to_string())
                } else {
                    IndexError::RetryExhausted(e.to_string())
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Algoliaエラーレスポンス");
            return Err(IndexError::HttpError {
                status: status.as_u16(),
                message: body,
            });
        }

        let task = response.json::<IndexTask>().await.map_err(|e| {
            error!(error = %e, "バッチレスポンスのパースに失敗");
            IndexError::InvalidResponse(e.to_string())
        })?;

        debug!(task_id = task.task_id, "バッチリクエスト成功");
        Ok(task)
    }
}

#[async_trait]
impl IndexHandle for AlgoliaIndexClient {
    #[instrument(skip(self, records), fields(record_count = records.len()))]
    async fn save_objects(&self, records: &[Record]) -> Result<IndexTask, IndexError> {
        if records.is_empty() {
            return Ok(IndexTask::default());
        }

        let request = BatchRequest {
            requests: records.iter().map(BatchOperation::UpdateObject).collect(),
        };
        let task = self.send_batch(&request).await?;

        info!(index = %self.index_name, task_id = task.task_id, "レコードを保存");
        Ok(task)
    }

    #[instrument(skip(self, object_ids), fields(object_count = object_ids.len()))]
    async fn delete_objects(&self, object_ids: &[String]) -> Result<IndexTask, IndexError> {
        if object_ids.is_empty() {
            return Ok(IndexTask::default());
        }

        let request = BatchRequest {
            requests: object_ids
                .iter()
                .map(|id| BatchOperation::DeleteObject(ObjectIdBody(id)))
                .collect(),
        };
        let task = self.send_batch(&request).await?;

        info!(index = %self.index_name, task_id = task.task_id, "レコードを削除");
        Ok(task)
    }
}
