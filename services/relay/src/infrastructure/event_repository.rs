/// イベントの永続化ポート
///
/// リレーコアが依存するストレージ抽象と、そのインメモリ実装。
/// 通常イベントはidで、置換可能イベントは (kind, pubkey, d_tag) で保持する。
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::trace;

use crate::domain::event::SignedEvent;
use crate::domain::validation::{EventId, PublicKey};

/// イベントリポジトリ操作のエラー型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventRepositoryError {
    /// ストアへの接続・初期化に失敗
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// データベースエンジンのエラー
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// 書き込みに失敗
    #[error("Write error: {0}")]
    WriteError(String),

    /// 読み取りに失敗
    #[error("Read error: {0}")]
    ReadError(String),

    /// データのシリアライズ/デシリアライズに失敗
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// イベント保存結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// 新しいイベントとして保存された
    Saved,
    /// 既存イベントを置換した
    Replaced,
    /// 同一IDが既に存在
    Duplicate,
    /// 既存の置換可能イベントの方が新しいため保存しなかった
    Outdated,
}

/// イベント永続化用トレイト
///
/// 実装はスレッド間で共有され、書き込み直後の読み取りで結果が見えること。
pub trait EventRepository: Send + Sync + Clone {
    /// 通常イベントをidをキーに追加する（重複はDuplicate）
    fn append_event(&self, event: &SignedEvent) -> Result<SaveResult, EventRepositoryError>;

    /// 置換可能イベントを (kind, pubkey, d_tag) をキーに保存する
    ///
    /// 既存行がある場合は `SignedEvent::supersedes` で勝者を決める。
    fn upsert_replaceable(
        &self,
        event: &SignedEvent,
        d_tag: &str,
    ) -> Result<SaveResult, EventRepositoryError>;

    /// 作者で絞り込んだ全イベント（通常 + 置換可能）を新しい順に返す
    ///
    /// `authors` が空の場合は全件。
    fn query_by_authors(&self, authors: &[String]) -> Result<Vec<SignedEvent>, EventRepositoryError>;
}

/// created_at降順、同一タイムスタンプはid昇順
pub fn newest_first(a: &SignedEvent, b: &SignedEvent) -> Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| a.id().cmp(b.id()))
}

type ReplaceableKey = (u16, PublicKey, String);

#[derive(Debug, Default)]
struct MemoryStore {
    events: HashMap<EventId, SignedEvent>,
    replaceable: HashMap<ReplaceableKey, SignedEvent>,
}

/// EventRepositoryのインメモリ実装
#[derive(Debug, Clone, Default)]
pub struct MemoryEventRepository {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存されているイベント数
    pub fn event_count(&self) -> Result<usize, EventRepositoryError> {
        let store = self
            .store
            .read()
            .map_err(|e| EventRepositoryError::ReadError(e.to_string()))?;
        Ok(store.events.len() + store.replaceable.len())
    }
}

impl EventRepository for MemoryEventRepository {
    fn append_event(&self, event: &SignedEvent) -> Result<SaveResult, EventRepositoryError> {
        let mut store = self
            .store
            .write()
            .map_err(|e| EventRepositoryError::WriteError(e.to_string()))?;

        if store.events.contains_key(event.id()) {
            trace!(event_id = %event.id(), "重複イベント");
            return Ok(SaveResult::Duplicate);
        }
        store.events.insert(*event.id(), event.clone());
        Ok(SaveResult::Saved)
    }

    fn upsert_replaceable(
        &self,
        event: &SignedEvent,
        d_tag: &str,
    ) -> Result<SaveResult, EventRepositoryError> {
        let mut store = self
            .store
            .write()
            .map_err(|e| EventRepositoryError::WriteError(e.to_string()))?;

        let key = (event.kind(), *event.pubkey(), d_tag.to_string());
        let result = match store.replaceable.get(&key) {
            None => SaveResult::Saved,
            Some(existing) if existing.id() == event.id() => return Ok(SaveResult::Duplicate),
            Some(existing) if event.supersedes(existing) => SaveResult::Replaced,
            Some(_) => return Ok(SaveResult::Outdated),
        };
        store.replaceable.insert(key, event.clone());
        Ok(result)
    }

    fn query_by_authors(&self, authors: &[String]) -> Result<Vec<SignedEvent>, EventRepositoryError> {
        let store = self
            .store
            .read()
            .map_err(|e| EventRepositoryError::ReadError(e.to_string()))?;

        let mut events: Vec<SignedEvent> = store
            .events
            .values()
            .chain(store.replaceable.values())
            .filter(|event| authors.is_empty() || authors.contains(&event.pubkey().to_hex()))
            .cloned()
            .collect();
        events.sort_by(newest_first);
        Ok(events)
    }
}
