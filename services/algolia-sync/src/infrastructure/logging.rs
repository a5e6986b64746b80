/// ログ基盤モジュール
///
/// トリガー関数向けの構造化ログ設定を提供する。
/// tracingクレートを使用し、JSON形式での出力をサポートする。
use std::sync::Once;

use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// ログサブスクライバー初期化用の同期プリミティブ
static INIT: Once = Once::new();

/// 関数実行環境向けのログサブスクライバーを初期化する
///
/// JSON形式での構造化ログ出力を設定し、環境変数`RUST_LOG`または
/// デフォルトのログレベル（info）でフィルタリングを行う。
///
/// この関数は複数回呼び出しても安全で、最初の呼び出しのみ初期化を実行する。
///
/// # 使用例
/// ```ignore
/// use algolia_sync::infrastructure::init_logging;
///
/// init_logging();
/// tracing::info!("sync function started");
/// ```
pub fn init_logging() {
    INIT.call_once(|| {
        // ログ出力先が無いため標準エラーに書く
        if let Err(err) = install_json_subscriber() {
            eprintln!("ログサブスクライバーの初期化に失敗: {}", err);
        }
    });
}

/// JSON形式のサブスクライバーをグローバルに登録する
///
/// 既に別のサブスクライバーが登録されている場合はエラー。
fn install_json_subscriber() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Cloud Logging向け
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .flatten_event(true)
        .with_current_span(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .try_init()
}

/// テスト用のログサブスクライバーを初期化する（人間が読みやすい形式）
///
/// # 注意
/// この関数はテスト専用であり、本番環境では`init_logging`を使用すること。
#[cfg(test)]
pub fn init_test_logging() {
    static TEST_INIT: Once = Once::new();

    TEST_INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_target(true)
            .compact();

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();
    });
}
