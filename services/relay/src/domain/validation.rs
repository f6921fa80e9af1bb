/// 入力検証ライブラリ
///
/// イベントのフィールド、hex識別子、タグ、ヘルプメッセージ形式の検証を行う。各関数は状態を持たず、
/// 検証済みの型付き値か `ValidationError` を返す。
use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// 1イベントあたりの最大タグ数
pub const MAX_TAGS: usize = 9999;

/// 1タグあたりの最大要素数
pub const MAX_TAG_ELEMENTS: usize = 99;

/// created_atの最大値（符号付き64bit整数で保存できる範囲）
pub const MAX_TIMESTAMP: u64 = i64::MAX as u64;

/// サブスクリプションIDの最大文字数（NIP-01）
pub const MAX_SUBSCRIPTION_ID_LENGTH: usize = 64;

/// 検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// イベントがJSONオブジェクトではない
    #[error("event must be a JSON object")]
    NotAnObject,

    /// 必須フィールドが存在しない
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// idフィールドの形式が不正（64文字の小文字hex文字列でない）
    #[error("id must be 64 lowercase hex characters")]
    InvalidIdFormat,

    /// pubkeyフィールドの形式が不正（64文字の小文字hex文字列でない）
    #[error("pubkey must be 64 lowercase hex characters")]
    InvalidPubkeyFormat,

    /// sigフィールドの形式が不正（128文字の小文字hex文字列でない）
    #[error("sig must be 128 lowercase hex characters")]
    InvalidSignatureFormat,

    /// 公開鍵のバイト長が32でない
    #[error("pubkey must be 32 bytes, got {0}")]
    InvalidPubkeyLength(usize),

    /// 秘密鍵として不正な値
    #[error("invalid secret key")]
    InvalidSecretKey,

    /// kindフィールドが範囲外（0-65535）
    #[error("kind must be 0-65535")]
    InvalidKindRange,

    /// tagsフィールドの形式が不正
    #[error("tags must be an array of non-empty string arrays")]
    InvalidTagsFormat,

    /// タグ数が上限を超えている
    #[error("too many tags: {count} > {max}")]
    TooManyTags { count: usize, max: usize },

    /// タグ要素数が上限を超えている
    #[error("too many tag elements: {count} > {max}")]
    TooManyTagElements { count: usize, max: usize },

    /// contentフィールドが文字列ではない
    #[error("content must be a string")]
    InvalidContentFormat,

    /// created_atフィールドが0以上MAX_TIMESTAMP以下の整数ではない
    #[error("created_at must be a Unix timestamp")]
    InvalidTimestamp,

    /// 署名に使った秘密鍵がイベントのpubkeyと一致しない
    #[error("secret key does not match event pubkey")]
    SigningKeyMismatch,
}

/// 小文字hex文字列かどうか
pub fn is_lower_hex(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// 固定長の小文字hex文字列をバイト配列にデコードする
///
/// 長さが `N * 2` でない、または小文字hex以外を含む場合は `None`。
fn decode_lower_hex<const N: usize>(value: &str) -> Option<[u8; N]> {
    if value.len() != N * 2 || !is_lower_hex(value) {
        return None;
    }
    let mut bytes = [0u8; N];
    hex::decode_to_slice(value, &mut bytes).ok()?;
    Some(bytes)
}

/// イベントID（32バイトのSHA-256ダイジェスト）
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId([u8; 32]);

impl EventId {
    pub fn from_hex(value: &str) -> Result<Self, ValidationError> {
        decode_lower_hex(value)
            .map(Self)
            .ok_or(ValidationError::InvalidIdFormat)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// 公開鍵（BIP-340 x-only、32バイト）
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_hex(value: &str) -> Result<Self, ValidationError> {
        decode_lower_hex(value)
            .map(Self)
            .ok_or(ValidationError::InvalidPubkeyFormat)
    }

    /// 任意長のバイト列から構築する。32バイト以外はエラー。
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        <[u8; 32]>::try_from(bytes)
            .map(Self)
            .map_err(|_| ValidationError::InvalidPubkeyLength(bytes.len()))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Schnorr署名（64バイト）
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_hex(value: &str) -> Result<Self, ValidationError> {
        decode_lower_hex(value)
            .map(Self)
            .ok_or(ValidationError::InvalidSignatureFormat)
    }

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

macro_rules! impl_hex_fmt {
    ($($ty:ident),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.to_hex())
                }
            }

            impl fmt::Debug for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}({})", stringify!($ty), self.to_hex())
                }
            }
        )*
    };
}

impl_hex_fmt!(EventId, PublicKey, Signature);

/// kindフィールドを検証する（0-65535の整数）
pub fn parse_kind(value: &Value) -> Result<u16, ValidationError> {
    value
        .as_u64()
        .and_then(|kind| u16::try_from(kind).ok())
        .ok_or(ValidationError::InvalidKindRange)
}

/// created_atフィールドを検証する（0以上MAX_TIMESTAMP以下の整数）
pub fn parse_timestamp(value: &Value) -> Result<u64, ValidationError> {
    value
        .as_u64()
        .ok_or(ValidationError::InvalidTimestamp)
        .and_then(check_timestamp)
}

/// created_atが保存可能な範囲か
pub fn check_timestamp(created_at: u64) -> Result<u64, ValidationError> {
    if created_at <= MAX_TIMESTAMP {
        Ok(created_at)
    } else {
        Err(ValidationError::InvalidTimestamp)
    }
}

/// contentフィールドを検証する（文字列）
pub fn parse_content(value: &Value) -> Result<String, ValidationError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(ValidationError::InvalidContentFormat)
}

/// tagsフィールドを検証する（文字列配列の配列）
pub fn parse_tags(value: &Value) -> Result<Vec<Vec<String>>, ValidationError> {
    let tags = value.as_array().ok_or(ValidationError::InvalidTagsFormat)?;
    let tags = tags
        .iter()
        .map(|tag| {
            tag.as_array()
                .ok_or(ValidationError::InvalidTagsFormat)?
                .iter()
                .map(|element| {
                    element
                        .as_str()
                        .map(str::to_string)
                        .ok_or(ValidationError::InvalidTagsFormat)
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    check_tags(&tags)?;
    Ok(tags)
}

/// タグ数・要素数の上限と空タグを検証する
pub fn check_tags(tags: &[Vec<String>]) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        return Err(ValidationError::TooManyTags {
            count: tags.len(),
            max: MAX_TAGS,
        });
    }
    for tag in tags {
        if tag.is_empty() {
            return Err(ValidationError::InvalidTagsFormat);
        }
        if tag.len() > MAX_TAG_ELEMENTS {
            return Err(ValidationError::TooManyTagElements {
                count: tag.len(),
                max: MAX_TAG_ELEMENTS,
            });
        }
    }
    Ok(())
}

/// 機械可読なヘルプメッセージ形式 `<prefix>: <detail>` かどうか
///
/// prefixは `[A-Za-z0-9_-]+`。
pub fn is_help_message(message: &str) -> bool {
    match message.split_once(": ") {
        Some((prefix, _)) => {
            !prefix.is_empty()
                && prefix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        }
        None => false,
    }
}
