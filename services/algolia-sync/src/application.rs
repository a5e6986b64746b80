// アプリケーション層モジュール
pub mod sync_handler;

// 再エクスポート
pub use sync_handler::{IndexOperation, SyncError, SyncHandler, SyncOutcome};
