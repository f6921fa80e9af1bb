/// ログ基盤モジュール
///
/// リレーコア向けの構造化ログ設定を提供する。
/// 出力形式は環境変数`RELAY_LOG_FORMAT`で切り替える（既定はJSON）。
use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 環境変数名: ログ出力形式
pub const ENV_LOG_FORMAT: &str = "RELAY_LOG_FORMAT";

/// ログサブスクライバー初期化用の同期プリミティブ
static INIT: Once = Once::new();

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 1行1JSONの構造化ログ（ログ収集向け）
    #[default]
    Json,
    /// 人間が読みやすい形式
    Pretty,
}

impl LogFormat {
    /// 設定値から出力形式を決定する（"pretty"以外はJSON）
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var(ENV_LOG_FORMAT).ok().as_deref())
    }
}

/// ログサブスクライバーを初期化する
///
/// `RUST_LOG`またはデフォルトのログレベル（info）でフィルタリングを行う。
/// 複数回呼び出しても最初の呼び出しのみ初期化を実行する。
/// 既に別のグローバルサブスクライバーが設定されている場合は何もしない。
///
/// # 使用例
/// ```ignore
/// use relay_core::infrastructure::init_logging;
///
/// init_logging();
/// tracing::info!("relay started");
/// ```
pub fn init_logging() {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let format = LogFormat::from_env();

        let json_layer = (format == LogFormat::Json).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .flatten_event(true)
                .with_current_span(false)
        });

        let pretty_layer = (format == LogFormat::Pretty)
            .then(|| tracing_subscriber::fmt::layer().with_target(true).pretty());

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .with(pretty_layer)
            .try_init();
    });
}

/// テスト用のログサブスクライバーを初期化する（人間が読みやすい形式）
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
