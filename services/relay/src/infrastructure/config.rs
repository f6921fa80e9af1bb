/// SQLiteストア設定
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

/// 環境変数名: データベースファイルのパス
pub const ENV_DB_PATH: &str = "RELAY_DB_PATH";

/// 環境変数名: ロック待ちタイムアウト（ミリ秒）
pub const ENV_DB_BUSY_TIMEOUT_MS: &str = "RELAY_DB_BUSY_TIMEOUT_MS";

/// ロック待ちタイムアウトのデフォルト値（ミリ秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// SQLite設定のエラー型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// SQLiteストア設定
///
/// 環境変数:
/// - RELAY_DB_PATH: データベースファイルのパス（必須）
/// - RELAY_DB_BUSY_TIMEOUT_MS: ロック待ちタイムアウト（省略時5000）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    db_path: String,
    busy_timeout: Duration,
}

impl SqliteConfig {
    pub fn from_env() -> Result<Self, SqliteConfigError> {
        let db_path = std::env::var(ENV_DB_PATH)
            .map_err(|_| SqliteConfigError::MissingEnvVar(ENV_DB_PATH.to_string()))?;

        let busy_timeout_ms = match std::env::var(ENV_DB_BUSY_TIMEOUT_MS) {
            Ok(value) => value.parse::<u64>().unwrap_or_else(|_| {
                warn!(
                    key = ENV_DB_BUSY_TIMEOUT_MS,
                    value = %value,
                    default = DEFAULT_BUSY_TIMEOUT_MS,
                    "Environment variable parse error, using default"
                );
                DEFAULT_BUSY_TIMEOUT_MS
            }),
            Err(_) => DEFAULT_BUSY_TIMEOUT_MS,
        };

        info!(db_path = %db_path, busy_timeout_ms, "SqliteConfig loaded");

        Ok(Self::new(db_path, Duration::from_millis(busy_timeout_ms)))
    }

    /// 明示的な値で作成（テスト用）
    pub fn new(db_path: impl Into<String>, busy_timeout: Duration) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout,
        }
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // テストで環境変数を安全に設定/削除するヘルパー
    // 安全性: シングルスレッドテスト環境（#[serial]）で使用
    unsafe fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    unsafe fn cleanup_sqlite_env() {
        unsafe {
            remove_env(ENV_DB_PATH);
            remove_env(ENV_DB_BUSY_TIMEOUT_MS);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_requires_db_path() {
        unsafe { cleanup_sqlite_env() };

        assert_eq!(
            SqliteConfig::from_env(),
            Err(SqliteConfigError::MissingEnvVar("RELAY_DB_PATH".to_string()))
        );
    }

    #[test]
    #[serial]
    fn test_from_env_uses_default_timeout() {
        unsafe {
            cleanup_sqlite_env();
            set_env(ENV_DB_PATH, "/tmp/relay.db");
        }

        let config = SqliteConfig::from_env().unwrap();
        assert_eq!(config.db_path(), "/tmp/relay.db");
        assert_eq!(config.busy_timeout(), Duration::from_millis(5000));

        unsafe { cleanup_sqlite_env() };
    }

    #[test]
    #[serial]
    fn test_from_env_reads_timeout() {
        unsafe {
            cleanup_sqlite_env();
            set_env(ENV_DB_PATH, "relay.db");
            set_env(ENV_DB_BUSY_TIMEOUT_MS, "250");
        }

        let config = SqliteConfig::from_env().unwrap();
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));

        unsafe { cleanup_sqlite_env() };
    }

    #[test]
    #[serial]
    fn test_from_env_falls_back_on_bad_timeout() {
        unsafe {
            cleanup_sqlite_env();
            set_env(ENV_DB_PATH, "relay.db");
            set_env(ENV_DB_BUSY_TIMEOUT_MS, "soon");
        }

        let config = SqliteConfig::from_env().unwrap();
        assert_eq!(config.busy_timeout(), Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS));

        unsafe { cleanup_sqlite_env() };
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            SqliteConfigError::MissingEnvVar("X".to_string()).to_string(),
            "Missing environment variable: X"
        );
    }
}
