// Algolia接続設定
//
// 環境変数からアプリケーションID、APIキー、インデックス名を読み取る。
// ホストは通常アプリケーションIDから導出するが、テストやプロキシ用に上書きできる。

use thiserror::Error;
use url::Url;

/// Algolia設定のエラー型
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlgoliaConfigError {
    /// 環境変数が欠落
    #[error("環境変数が設定されていません: {0}")]
    MissingEnvVar(String),

    /// ホストURLが無効
    #[error("無効なホストURL: {0}")]
    InvalidHost(String),
}

/// Algolia接続設定
///
/// 環境変数:
/// - ALGOLIA_APP_ID: アプリケーションID（必須）
/// - ALGOLIA_API_KEY: 書き込み権限のあるAPIキー（必須）
/// - ALGOLIA_INDEX_NAME: インデックス名（必須）
/// - ALGOLIA_HOST: ホストURL（オプション、デフォルト: https://{app_id}.algolia.net）
#[derive(Clone)]
pub struct AlgoliaConfig {
    app_id: String,
    api_key: String,
    index_name: String,
    host: Url,
}

impl std::fmt::Debug for AlgoliaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgoliaConfig")
            .field("app_id", &self.app_id)
            .field("index_name", &self.index_name)
            .field("host", &self.host.as_str())
            .finish_non_exhaustive()
    }
}

impl AlgoliaConfig {
    /// 明示的な値で設定を作成（ホストはアプリケーションIDから導出）
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Result<Self, AlgoliaConfigError> {
        let app_id = app_id.into();
        let host = Self::default_host(&app_id)?;
        Ok(Self {
            app_id,
            api_key: api_key.into(),
            index_name: index_name.into(),
            host,
        })
    }

    /// ホストURLを上書きする
    ///
    /// # エラー
    /// - `InvalidHost`: URLとして不正、またはhttp/https以外のスキーム
    pub fn with_host(mut self, host: &str) -> Result<Self, AlgoliaConfigError> {
        self.host = Self::validate_host(host)?;
        Ok(self)
    }

    /// 環境変数から設定を読み込む
    ///
    /// # エラー
    /// - `MissingEnvVar`: 必須の環境変数が設定されていない
    /// - `InvalidHost`: ALGOLIA_HOSTが無効
    pub fn from_env() -> Result<Self, AlgoliaConfigError> {
        let app_id = required_env("ALGOLIA_APP_ID")?;
        let api_key = required_env("ALGOLIA_API_KEY")?;
        let index_name = required_env("ALGOLIA_INDEX_NAME")?;

        let config = Self::new(app_id, api_key, index_name)?;
        match std::env::var("ALGOLIA_HOST") {
            Ok(host) if !host.trim().is_empty() => config.with_host(host.trim()),
            _ => Ok(config),
        }
    }

    fn default_host(app_id: &str) -> Result<Url, AlgoliaConfigError> {
        Self::validate_host(&format!("https://{}.algolia.net", app_id))
    }

    /// ホストURLのバリデーション
    fn validate_host(host: &str) -> Result<Url, AlgoliaConfigError> {
        let url = Url::parse(host)
            .map_err(|e| AlgoliaConfigError::InvalidHost(format!("{}: {}", host, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(AlgoliaConfigError::InvalidHost(format!(
                "{}: スキームはhttpまたはhttpsである必要があります",
                host
            )));
        }

        Ok(url)
    }

    /// アプリケーションIDを取得
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// APIキーを取得
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// インデックス名を取得
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// ホストURLを取得
    pub fn host(&self) -> &Url {
        &self.host
    }
}

fn required_env(name: &str) -> Result<String, AlgoliaConfigError> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AlgoliaConfigError::MissingEnvVar(name.to_string()))
}
