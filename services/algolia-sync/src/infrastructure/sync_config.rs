// 同期関数の実行設定
//
// ドキュメント形状ポリシーと待ち受けポートを環境変数から読み取る。

use crate::domain::ShapePolicy;
use thiserror::Error;

/// 同期設定のエラー型
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncConfigError {
    /// 環境変数の値が不正
    #[error("環境変数の値が不正です: {name}={value} ({reason})")]
    InvalidValue {
        /// 環境変数名
        name: String,
        /// 設定されていた値
        value: String,
        /// 理由
        reason: String,
    },
}

/// 同期関数の実行設定
///
/// 環境変数:
/// - DOCUMENT_SHAPE: detect / flat / nested（デフォルト: detect）
/// - PORT: 待ち受けポート（デフォルト: 8080）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    shape_policy: ShapePolicy,
    port: u16,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            shape_policy: ShapePolicy::default(),
            port: Self::DEFAULT_PORT,
        }
    }
}

impl SyncConfig {
    /// デフォルトの待ち受けポート
    pub const DEFAULT_PORT: u16 = 8080;

    /// 明示的な値で設定を作成
    pub fn new(shape_policy: ShapePolicy, port: u16) -> Self {
        Self { shape_policy, port }
    }

    /// 環境変数から設定を読み込む
    ///
    /// 未設定の項目はデフォルト値を使う。
    pub fn from_env() -> Result<Self, SyncConfigError> {
        let mut config = Self::default();

        if let Some(value) = optional_env("DOCUMENT_SHAPE") {
            config.shape_policy = value.parse().map_err(|e: crate::domain::ParseShapePolicyError| {
                SyncConfigError::InvalidValue {
                    name: "DOCUMENT_SHAPE".to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        if let Some(value) = optional_env("PORT") {
            config.port = value
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| SyncConfigError::InvalidValue {
                    name: "PORT".to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
        }

        Ok(config)
    }

    /// ドキュメント形状ポリシー
    pub fn shape_policy(&self) -> ShapePolicy {
        self.shape_policy
    }

    /// 待ち受けポート
    pub fn port(&self) -> u16 {
        self.port
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
