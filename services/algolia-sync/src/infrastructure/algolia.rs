// Algolia関連のインフラストラクチャ実装
//
// Algolia REST APIへの接続設定と、IndexHandleを実装するクライアントを提供する。

mod client;
mod config;

// 再エクスポート
pub use client::AlgoliaIndexClient;
pub use config::{AlgoliaConfig, AlgoliaConfigError};
