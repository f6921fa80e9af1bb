/// NIP-01準拠のイベントバリデーション
///
/// ワイヤ形式のフィールド検証（暗号処理なし）と、
/// 署名・イベントIDの暗号検証を行う。
use serde_json::Value;
use thiserror::Error;

use crate::domain::event::{Event, SignedEvent};
use crate::domain::signature;
use crate::domain::validation::{self, EventId, PublicKey, Signature, ValidationError};

/// 暗号検証エラー
///
/// 表示形式はそのまま OK メッセージの本文になる。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// 署名が pubkey と id に対して有効でない
    #[error("SignatureCheck: {0}")]
    SignatureCheck(String),
    /// id が再計算したダイジェストと一致しない
    #[error("IdCheck: {0}")]
    IdCheck(String),
}

/// イベントバリデーター
pub struct EventValidator;

impl EventValidator {
    /// フィールドを content, pubkey, kind, tags, created_at, id, sig の順に検証する
    pub fn validate_structure(event_json: &Value) -> Result<SignedEvent, ValidationError> {
        let obj = event_json.as_object().ok_or(ValidationError::NotAnObject)?;
        let field = |name: &str| {
            obj.get(name)
                .ok_or_else(|| ValidationError::MissingField(name.to_string()))
        };

        let content = validation::parse_content(field("content")?)?;
        let pubkey = field("pubkey")?
            .as_str()
            .ok_or(ValidationError::InvalidPubkeyFormat)
            .and_then(PublicKey::from_hex)?;
        let kind = validation::parse_kind(field("kind")?)?;
        let tags = validation::parse_tags(field("tags")?)?;
        let created_at = validation::parse_timestamp(field("created_at")?)?;
        let id = field("id")?
            .as_str()
            .ok_or(ValidationError::InvalidIdFormat)
            .and_then(EventId::from_hex)?;
        let sig = field("sig")?
            .as_str()
            .ok_or(ValidationError::InvalidSignatureFormat)
            .and_then(Signature::from_hex)?;

        let event = Event::new(content, kind, tags, pubkey)?;
        Ok(SignedEvent::from_parts(event, created_at, id, sig))
    }

    /// 署名を検証する（id をメッセージとして pubkey で検証）
    pub fn verify_signature(event: &SignedEvent) -> Result<(), VerifyError> {
        if signature::verify(event.pubkey(), event.id().as_bytes(), event.sig()) {
            Ok(())
        } else {
            Err(VerifyError::SignatureCheck(event.sig().to_hex()))
        }
    }

    /// 正準シリアライズから id を再計算して検証する
    pub fn verify_id(event: &SignedEvent) -> Result<(), VerifyError> {
        let digest = event.event().digest(event.created_at());
        if &digest == event.id().as_bytes() {
            Ok(())
        } else {
            Err(VerifyError::IdCheck(event.id().to_hex()))
        }
    }

    /// 署名、続けて（check_id の場合）id を検証する
    pub fn verify(event: &SignedEvent, check_id: bool) -> Result<(), VerifyError> {
        Self::verify_signature(event)?;
        if check_id {
            Self::verify_id(event)?;
        }
        Ok(())
    }
}
