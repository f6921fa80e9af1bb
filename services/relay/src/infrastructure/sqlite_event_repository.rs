//! SQLiteイベントリポジトリ
//!
//! EventRepositoryのSQLite実装。
//! - 通常イベント: `events` テーブル（id主キー）
//! - 置換可能イベント: `replaceable_events` テーブル（(kind, pubkey, d_tag)主キー）
//! - 書き込み・読み取りとも単一接続（Arc<Mutex<Connection>>）、WALモード

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::domain::event::SignedEvent;
use crate::infrastructure::config::SqliteConfig;
use crate::infrastructure::event_repository::{
    EventRepository, EventRepositoryError, SaveResult, newest_first,
};

impl From<rusqlite::Error> for EventRepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        EventRepositoryError::DatabaseError(err.to_string())
    }
}

/// SQLiteデータベースのスキーマを定義するSQL
const SCHEMA_SQL: &str = r#"
-- WALモード設定
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;

-- 通常イベント
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,           -- 64文字hex (イベントID)
    pubkey TEXT NOT NULL,          -- 64文字hex (公開鍵)
    kind INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    event_json TEXT NOT NULL       -- 完全なイベントJSON
);

-- 置換可能イベント（キーごとに1行）
CREATE TABLE IF NOT EXISTS replaceable_events (
    kind INTEGER NOT NULL,
    pubkey TEXT NOT NULL,
    d_tag TEXT NOT NULL,           -- 置換可能(kind 0, 3, 10000-19999)は空文字列
    id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    event_json TEXT NOT NULL,
    PRIMARY KEY (kind, pubkey, d_tag)
);

CREATE INDEX IF NOT EXISTS idx_events_pubkey ON events(pubkey);
CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_replaceable_events_pubkey ON replaceable_events(pubkey);
"#;

/// EventRepositoryのSQLite実装
#[derive(Debug, Clone)]
pub struct SqliteEventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEventRepository {
    /// データベースファイルを開き、スキーマを初期化する
    pub fn open(config: &SqliteConfig) -> Result<Self, EventRepositoryError> {
        let conn = Connection::open(config.db_path())
            .map_err(|e| EventRepositoryError::ConnectionError(e.to_string()))?;
        conn.busy_timeout(config.busy_timeout())?;
        let repo = Self::initialize(conn)?;
        info!(db_path = config.db_path(), "SQLiteイベントストアを開きました");
        Ok(repo)
    }

    /// インメモリデータベース（テスト・一時利用向け）
    pub fn open_in_memory() -> Result<Self, EventRepositoryError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EventRepositoryError::ConnectionError(e.to_string()))?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, EventRepositoryError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, EventRepositoryError> {
        self.conn
            .lock()
            .map_err(|e| EventRepositoryError::ConnectionError(e.to_string()))
    }

    fn encode(event: &SignedEvent) -> Result<(String, i64), EventRepositoryError> {
        let event_json = serde_json::to_string(event)
            .map_err(|e| EventRepositoryError::SerializationError(e.to_string()))?;
        let created_at = i64::try_from(event.created_at()).map_err(|_| {
            EventRepositoryError::SerializationError(format!(
                "created_at out of range: {}",
                event.created_at()
            ))
        })?;
        Ok((event_json, created_at))
    }

    fn decode(event_json: &str) -> Result<SignedEvent, EventRepositoryError> {
        let value: Value = serde_json::from_str(event_json)
            .map_err(|e| EventRepositoryError::SerializationError(e.to_string()))?;
        SignedEvent::validate(&value)
            .map_err(|e| EventRepositoryError::SerializationError(e.to_string()))
    }
}

impl EventRepository for SqliteEventRepository {
    fn append_event(&self, event: &SignedEvent) -> Result<SaveResult, EventRepositoryError> {
        let (event_json, created_at) = Self::encode(event)?;
        let conn = self.lock()?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO events (id, pubkey, kind, created_at, event_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id().to_hex(),
                event.pubkey().to_hex(),
                event.kind(),
                created_at,
                event_json,
            ],
        )?;

        if inserted == 0 {
            trace!(event_id = %event.id(), "重複イベント");
            Ok(SaveResult::Duplicate)
        } else {
            Ok(SaveResult::Saved)
        }
    }

    fn upsert_replaceable(
        &self,
        event: &SignedEvent,
        d_tag: &str,
    ) -> Result<SaveResult, EventRepositoryError> {
        let (event_json, created_at) = Self::encode(event)?;
        let pubkey = event.pubkey().to_hex();
        let mut conn = self.lock()?;

        // 読み取りから書き込みまでを1つの書き込みトランザクションで行う
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT event_json FROM replaceable_events WHERE kind = ?1 AND pubkey = ?2 AND d_tag = ?3",
                params![event.kind(), pubkey, d_tag],
                |row| row.get(0),
            )
            .optional()?;

        let result = match existing.as_deref().map(Self::decode).transpose()? {
            None => SaveResult::Saved,
            Some(current) if current.id() == event.id() => SaveResult::Duplicate,
            Some(current) if event.supersedes(&current) => SaveResult::Replaced,
            Some(_) => SaveResult::Outdated,
        };

        if matches!(result, SaveResult::Saved | SaveResult::Replaced) {
            tx.execute(
                "INSERT INTO replaceable_events (kind, pubkey, d_tag, id, created_at, event_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (kind, pubkey, d_tag) DO UPDATE SET
                     id = excluded.id,
                     created_at = excluded.created_at,
                     event_json = excluded.event_json",
                params![
                    event.kind(),
                    pubkey,
                    d_tag,
                    event.id().to_hex(),
                    created_at,
                    event_json,
                ],
            )?;
        }
        tx.commit()?;

        debug!(event_id = %event.id(), kind = event.kind(), d_tag, result = ?result, "置換可能イベントを処理");
        Ok(result)
    }

    fn query_by_authors(&self, authors: &[String]) -> Result<Vec<SignedEvent>, EventRepositoryError> {
        let sql = if authors.is_empty() {
            "SELECT event_json FROM events UNION ALL SELECT event_json FROM replaceable_events"
                .to_string()
        } else {
            let placeholders = (1..=authors.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "SELECT event_json FROM events WHERE pubkey IN ({0}) \
                 UNION ALL SELECT event_json FROM replaceable_events WHERE pubkey IN ({0})",
                placeholders
            )
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(authors.iter()), |row| {
            row.get::<_, String>(0)
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(Self::decode(&row?)?);
        }
        events.sort_by(newest_first);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signature::Keys;
    use crate::infrastructure::event_repository::tests::{
        assert_repository_contract, signed, signed_with_d,
    };
    use std::time::Duration;
    use tempfile::tempdir;

    /// テスト用の一時データベース設定を生成
    fn temp_config() -> (tempfile::TempDir, SqliteConfig) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relay.db");
        let config = SqliteConfig::new(path.to_string_lossy(), Duration::from_millis(1000));
        (dir, config)
    }

    // ========================================
    // スキーマ・接続のテスト
    // ========================================

    #[test]
    fn test_open_creates_tables() {
        let (_dir, config) = temp_config();
        let repo = SqliteEventRepository::open(&config).unwrap();

        let conn = repo.conn.lock().unwrap();
        for table in ["events", "replaceable_events"] {
            let name: String = conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(name, table);
        }
    }

    #[test]
    fn test_wal_mode_enabled() {
        let (_dir, config) = temp_config();
        let repo = SqliteEventRepository::open(&config).unwrap();

        let conn = repo.conn.lock().unwrap();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");

        // synchronous=NORMALは1
        let synchronous: i32 = conn
            .query_row("PRAGMA synchronous", [], |row| row.get(0))
            .unwrap();
        assert_eq!(synchronous, 1);
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let config = SqliteConfig::new("/nonexistent/dir/relay.db", Duration::from_millis(10));
        assert!(matches!(
            SqliteEventRepository::open(&config),
            Err(EventRepositoryError::ConnectionError(_))
        ));
    }

    // ========================================
    // 保存・検索のテスト
    // ========================================

    #[test]
    fn test_repository_contract_in_memory() {
        assert_repository_contract(&SqliteEventRepository::open_in_memory().unwrap());
    }

    #[test]
    fn test_repository_contract_on_disk() {
        let (_dir, config) = temp_config();
        assert_repository_contract(&SqliteEventRepository::open(&config).unwrap());
    }

    #[test]
    fn test_stores_full_event_json() {
        let repo = SqliteEventRepository::open_in_memory().unwrap();
        let keys = Keys::generate();
        let event = signed(&keys, 1, 42, "stored \"json\"");
        repo.append_event(&event).unwrap();

        let conn = repo.conn.lock().unwrap();
        let json: String = conn
            .query_row(
                "SELECT event_json FROM events WHERE id = ?1",
                [event.id().to_hex()],
                |row| row.get(0),
            )
            .unwrap();
        let stored: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(stored, event.to_value());
    }

    #[test]
    fn test_events_survive_reopen() {
        let (_dir, config) = temp_config();
        let keys = Keys::generate();
        let note = signed(&keys, 1, 10, "persisted");
        let profile = signed_with_d(&keys, 30000, 20, "slot");
        {
            let repo = SqliteEventRepository::open(&config).unwrap();
            repo.append_event(&note).unwrap();
            repo.upsert_replaceable(&profile, "slot").unwrap();
        }

        let reopened = SqliteEventRepository::open(&config).unwrap();
        let events = reopened.query_by_authors(&[]).unwrap();
        assert_eq!(events, vec![profile, note]);
    }

    #[test]
    fn test_outdated_write_leaves_row_unchanged() {
        let repo = SqliteEventRepository::open_in_memory().unwrap();
        let keys = Keys::generate();
        let newer = signed(&keys, 10002, 200, "newer");
        let older = signed(&keys, 10002, 100, "older");

        repo.upsert_replaceable(&newer, "").unwrap();
        assert_eq!(repo.upsert_replaceable(&older, "").unwrap(), SaveResult::Outdated);
        assert_eq!(repo.query_by_authors(&[]).unwrap(), vec![newer]);
    }

    #[test]
    fn test_concurrent_upserts_keep_single_winner() {
        let (_dir, config) = temp_config();
        let repo = SqliteEventRepository::open(&config).unwrap();
        let keys = Keys::generate();
        let events: Vec<SignedEvent> = (0..8)
            .map(|i| signed(&keys, 0, 500 + i, &format!("profile {i}")))
            .collect();

        std::thread::scope(|scope| {
            for event in &events {
                let repo = repo.clone();
                scope.spawn(move || repo.upsert_replaceable(event, "").unwrap());
            }
        });

        let stored = repo.query_by_authors(&[keys.public_key().to_hex()]).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].created_at(), 507);
    }
}
