/// Firestore → Algolia 同期関数
///
/// トリガーランタイムから`POST /`で届くドキュメント変更イベントを受け取り、
/// ドキュメントをレコードに整形してAlgoliaインデックスへ反映する。
/// 削除イベントではdeleteObjects、作成・更新イベントではsaveObjectsを送信する。
///
/// # 環境変数
/// - `ALGOLIA_APP_ID`, `ALGOLIA_API_KEY`, `ALGOLIA_INDEX_NAME`: 必須
/// - `ALGOLIA_HOST`: APIホスト（デフォルト: https://{app_id}.algolia.net）
/// - `DOCUMENT_SHAPE`: detect / flat / nested（デフォルト: detect）
/// - `PORT`: 待ち受けポート（デフォルト: 8080）
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use algolia_sync::application::SyncHandler;
use algolia_sync::domain::RecordShaper;
use algolia_sync::infrastructure::{
    AlgoliaConfig, AlgoliaIndexClient, SyncConfig, create_router, init_logging,
};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // 構造化ログを初期化
    init_logging();

    let sync_config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "同期設定読み込み失敗");
            return Err(err.into());
        }
    };

    let algolia_config = match AlgoliaConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Algolia設定読み込み失敗");
            return Err(err.into());
        }
    };

    let client = match AlgoliaIndexClient::new(&algolia_config) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "AlgoliaIndexClient初期化失敗");
            return Err(err.into());
        }
    };

    let shaper = RecordShaper::new(sync_config.shape_policy());
    let handler = Arc::new(SyncHandler::new(client, shaper));
    let app = create_router(handler);

    let addr = SocketAddr::from(([0, 0, 0, 0], sync_config.port()));
    info!(
        addr = %addr,
        index_name = algolia_config.index_name(),
        shape_policy = %sync_config.shape_policy(),
        "同期関数を起動"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // シグナル受信後は処理中のリクエスト完了を待ってから終了する
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("同期関数が正常に停止しました");
    Ok(())
}

/// SIGINT または SIGTERM を待機する
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Ctrl+C シグナルハンドラーの登録に失敗");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "SIGTERM シグナルハンドラーの登録に失敗");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("SIGINT を受信しました。graceful shutdownを開始します");
        }
        _ = terminate => {
            info!("SIGTERM を受信しました。graceful shutdownを開始します");
        }
    }
}
