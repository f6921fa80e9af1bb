/// 投稿者側のイベントファクトリー
///
/// 公開鍵に紐づく定型イベント（テキストノート、プロフィール、フォローリスト、
/// 削除リクエスト、リレーリスト）の署名前ドラフトを組み立てる。
use serde_json::{Map, Value};

use crate::domain::event::Event;
use crate::domain::validation::{PublicKey, ValidationError};

/// kind 0: プロフィールメタデータ
pub const KIND_METADATA: u16 = 0;
/// kind 1: テキストノート
pub const KIND_TEXT_NOTE: u16 = 1;
/// kind 3: フォローリスト
pub const KIND_FOLLOW_LIST: u16 = 3;
/// kind 5: 削除リクエスト
pub const KIND_DELETION_REQUEST: u16 = 5;
/// kind 10002: リレーリスト
pub const KIND_RELAY_LIST: u16 = 10002;

/// フォローリストの1エントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Follow {
    pub pubkey: String,
    pub relay_url: String,
    pub petname: String,
}

impl Follow {
    pub fn new(pubkey: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            relay_url: String::new(),
            petname: String::new(),
        }
    }
}

/// リレーリストでの用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayUsage {
    ReadWrite,
    Read,
    Write,
}

/// 投稿者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Author {
    pubkey: PublicKey,
}

impl Author {
    pub fn new(pubkey: PublicKey) -> Self {
        Self { pubkey }
    }

    pub fn pubkey(&self) -> &PublicKey {
        &self.pubkey
    }

    pub fn text_note(&self, content: impl Into<String>) -> Event {
        Event::with_kind(content, KIND_TEXT_NOTE, self.pubkey)
    }

    /// プロフィール（contentはJSONオブジェクト）
    ///
    /// `extra` の同名キーは name/about/picture で上書きされる。
    pub fn user_metadata(
        &self,
        name: &str,
        about: &str,
        picture: &str,
        extra: Map<String, Value>,
    ) -> Event {
        let mut content = extra;
        content.insert("name".to_string(), Value::from(name));
        content.insert("about".to_string(), Value::from(about));
        content.insert("picture".to_string(), Value::from(picture));
        Event::with_kind(Value::Object(content).to_string(), KIND_METADATA, self.pubkey)
    }

    /// フォローリスト（`["p", pubkey, relay_url, petname]`）
    pub fn follow_list(&self, follows: &[Follow]) -> Result<Event, ValidationError> {
        let mut event = Event::with_kind("", KIND_FOLLOW_LIST, self.pubkey);
        for follow in follows {
            event.ref_pubkey(&follow.pubkey, &[follow.relay_url.as_str(), follow.petname.as_str()])?;
        }
        Ok(event)
    }

    /// 削除リクエスト（`["e", event_id]`）
    pub fn deletion_request(
        &self,
        explanation: impl Into<String>,
        event_ids: &[&str],
    ) -> Result<Event, ValidationError> {
        let mut event = Event::with_kind(explanation, KIND_DELETION_REQUEST, self.pubkey);
        for event_id in event_ids {
            event.ref_event(event_id, &[])?;
        }
        Ok(event)
    }

    /// リレーリスト（`["r", url]`、用途が片方のみなら `"read"`/`"write"` を付ける）
    pub fn relay_list(&self, relays: &[(&str, RelayUsage)]) -> Result<Event, ValidationError> {
        let mut event = Event::with_kind("", KIND_RELAY_LIST, self.pubkey);
        for (url, usage) in relays {
            match usage {
                RelayUsage::ReadWrite => event.add_tag("r", url, &[])?,
                RelayUsage::Read => event.add_tag("r", url, &["read"])?,
                RelayUsage::Write => event.add_tag("r", url, &["write"])?,
            };
        }
        Ok(event)
    }
}
