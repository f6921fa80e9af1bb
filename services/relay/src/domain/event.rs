/// イベントモデル
///
/// 署名前のドラフト `Event` と、署名済みで不変の `SignedEvent` を提供する。
/// `Event::sign` はドラフトを消費するため、署名後にタグを変更することはできない。
use std::cmp::Ordering;

use chrono::Utc;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;

use crate::domain::canonical;
use crate::domain::event_validator::{EventValidator, VerifyError};
use crate::domain::signature::{self, SecretKey};
use crate::domain::validation::{
    self, EventId, MAX_TAG_ELEMENTS, MAX_TAGS, PublicKey, Signature, ValidationError,
};

/// 現在のUnix時刻（秒）
pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// 署名前のイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    content: String,
    kind: u16,
    tags: Vec<Vec<String>>,
    pubkey: PublicKey,
}

impl Event {
    pub fn new(
        content: impl Into<String>,
        kind: u16,
        tags: Vec<Vec<String>>,
        pubkey: PublicKey,
    ) -> Result<Self, ValidationError> {
        validation::check_tags(&tags)?;
        Ok(Self {
            content: content.into(),
            kind,
            tags,
            pubkey,
        })
    }

    /// タグなしのイベント
    pub fn with_kind(content: impl Into<String>, kind: u16, pubkey: PublicKey) -> Self {
        Self {
            content: content.into(),
            kind,
            tags: Vec::new(),
            pubkey,
        }
    }

    /// kind 1 のテキストノート
    pub fn text_note(content: impl Into<String>, pubkey: PublicKey) -> Self {
        Self::with_kind(content, 1, pubkey)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn kind(&self) -> u16 {
        self.kind
    }

    pub fn tags(&self) -> &[Vec<String>] {
        &self.tags
    }

    pub fn pubkey(&self) -> &PublicKey {
        &self.pubkey
    }

    /// `[name, value, rest...]` のタグを追加する
    pub fn add_tag(
        &mut self,
        name: &str,
        value: &str,
        rest: &[&str],
    ) -> Result<&mut Self, ValidationError> {
        if self.tags.len() >= MAX_TAGS {
            return Err(ValidationError::TooManyTags {
                count: self.tags.len() + 1,
                max: MAX_TAGS,
            });
        }
        let count = 2 + rest.len();
        if count > MAX_TAG_ELEMENTS {
            return Err(ValidationError::TooManyTagElements {
                count,
                max: MAX_TAG_ELEMENTS,
            });
        }

        let mut tag = Vec::with_capacity(count);
        tag.push(name.to_string());
        tag.push(value.to_string());
        tag.extend(rest.iter().map(|s| s.to_string()));
        self.tags.push(tag);
        Ok(self)
    }

    /// `e` タグでイベントを参照する
    pub fn ref_event(
        &mut self,
        event_id_hex: &str,
        rest: &[&str],
    ) -> Result<&mut Self, ValidationError> {
        let event_id = EventId::from_hex(event_id_hex)?;
        self.add_tag("e", &event_id.to_hex(), rest)
    }

    /// `p` タグで公開鍵を参照する
    pub fn ref_pubkey(
        &mut self,
        pubkey_hex: &str,
        rest: &[&str],
    ) -> Result<&mut Self, ValidationError> {
        let pubkey = PublicKey::from_hex(pubkey_hex)?;
        self.add_tag("p", &pubkey.to_hex(), rest)
    }

    /// `a` タグで置換可能イベントを参照する（値は `kind:pubkey:d_tag`）
    pub fn ref_replace(
        &mut self,
        kind: u16,
        pubkey_hex: &str,
        d_tag: &str,
        rest: &[&str],
    ) -> Result<&mut Self, ValidationError> {
        let pubkey = PublicKey::from_hex(pubkey_hex)?;
        let value = format!("{}:{}:{}", kind, pubkey, d_tag);
        self.add_tag("a", &value, rest)
    }

    /// 指定時刻での正準バイト列
    pub fn canonical_bytes(&self, created_at: u64) -> Vec<u8> {
        canonical::encode(
            &self.pubkey.to_hex(),
            created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// 指定時刻でのダイジェスト（= イベントID）
    pub fn digest(&self, created_at: u64) -> [u8; 32] {
        canonical::hash(&self.canonical_bytes(created_at))
    }

    /// 現在時刻で署名する
    pub fn sign(self, secret_key: &SecretKey) -> Result<SignedEvent, ValidationError> {
        self.sign_at(secret_key, unix_now())
    }

    /// 指定時刻で署名する
    pub fn sign_at(
        self,
        secret_key: &SecretKey,
        created_at: u64,
    ) -> Result<SignedEvent, ValidationError> {
        if secret_key.public_key() != self.pubkey {
            return Err(ValidationError::SigningKeyMismatch);
        }
        validation::check_timestamp(created_at)?;
        let digest = self.digest(created_at);
        let sig = signature::sign(secret_key, &digest);
        Ok(SignedEvent {
            event: self,
            created_at,
            id: EventId::from_bytes(digest),
            sig,
        })
    }
}

/// 署名済みイベント
///
/// 構築後は変更できない。ワイヤ形式からは `SignedEvent::validate` で構築し、
/// `verify` で署名とIDを検証する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEvent {
    event: Event,
    created_at: u64,
    id: EventId,
    sig: Signature,
}

impl SignedEvent {
    pub(crate) fn from_parts(event: Event, created_at: u64, id: EventId, sig: Signature) -> Self {
        Self {
            event,
            created_at,
            id,
            sig,
        }
    }

    /// ワイヤ形式のイベントオブジェクトを検証して構築する（暗号検証なし）
    pub fn validate(raw: &Value) -> Result<Self, ValidationError> {
        EventValidator::validate_structure(raw)
    }

    /// 署名を検証し、`check_id` の場合はIDも再計算して検証する
    pub fn verify(&self, check_id: bool) -> Result<&Self, VerifyError> {
        EventValidator::verify(self, check_id)?;
        Ok(self)
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn content(&self) -> &str {
        self.event.content()
    }

    pub fn kind(&self) -> u16 {
        self.event.kind()
    }

    pub fn tags(&self) -> &[Vec<String>] {
        self.event.tags()
    }

    pub fn pubkey(&self) -> &PublicKey {
        self.event.pubkey()
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn sig(&self) -> &Signature {
        &self.sig
    }

    /// 名前が一致する最初のタグ
    pub fn first_tag(&self, name: &str) -> Option<&[String]> {
        self.tags()
            .iter()
            .find(|tag| tag.first().is_some_and(|n| n == name))
            .map(Vec::as_slice)
    }

    /// 最初の `d` タグの値（なければ空文字列）
    pub fn d_tag(&self) -> &str {
        self.first_tag("d")
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// 置換可能イベントのタイブレーク
    ///
    /// created_atが新しい方が勝ち、同じ場合はIDが辞書順で小さい方が勝つ。
    pub fn supersedes(&self, other: &SignedEvent) -> bool {
        match self.created_at.cmp(&other.created_at) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.id < other.id,
        }
    }

    /// ワイヤ形式のJSON値
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for SignedEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SignedEvent", 7)?;
        state.serialize_field("id", &self.id.to_hex())?;
        state.serialize_field("pubkey", &self.pubkey().to_hex())?;
        state.serialize_field("created_at", &self.created_at)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("tags", self.tags())?;
        state.serialize_field("content", self.content())?;
        state.serialize_field("sig", &self.sig.to_hex())?;
        state.end()
    }
}
