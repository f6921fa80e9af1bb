/// クライアントメッセージパーサー
///
/// NIP-01準拠のクライアントメッセージ（EVENT, REQ, CLOSE）をパースする。
/// クライアント側で送信メッセージを組み立てるためのコンストラクタも提供する。
use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::event::SignedEvent;
use crate::domain::filter::Filter;
use crate::domain::limitation_config::LimitationConfig;

/// クライアントからリレーへのメッセージ
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// EVENTメッセージ: ["EVENT", <event JSON>]
    Event(Value),

    /// REQメッセージ: ["REQ", <subscription_id>, <filters>...]
    Req {
        subscription_id: String,
        filters: Vec<Value>,
    },

    /// CLOSEメッセージ: ["CLOSE", <subscription_id>]
    Close { subscription_id: String },
}

/// メッセージパースエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// JSONパースに失敗
    #[error("failed to parse JSON")]
    InvalidJson,

    /// メッセージがJSON配列でない
    #[error("message must be a JSON array")]
    NotArray,

    /// メッセージタイプが文字列でない
    #[error("message type must be a string")]
    InvalidMessageType,

    /// 未知のメッセージタイプ
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// 必須フィールドが不足
    #[error("missing required fields")]
    MissingFields,

    /// 無効なsubscription_id
    #[error("invalid subscription id")]
    InvalidSubscriptionId,

    /// メッセージが長すぎる
    #[error("message too long: {length} > {max} bytes")]
    MessageTooLong { length: usize, max: u32 },
}

impl ClientMessage {
    /// イベントを公開するEVENTメッセージ
    pub fn publish(event: &SignedEvent) -> Self {
        ClientMessage::Event(event.to_value())
    }

    /// REQメッセージ（フィルターが空ならEOSEのみが返る）
    pub fn subscribe(subscription_id: &str, filters: &[Filter]) -> Result<Self, ParseError> {
        MessageParser::validate_subscription_id(subscription_id)?;
        Ok(ClientMessage::Req {
            subscription_id: subscription_id.to_string(),
            filters: filters.iter().map(Filter::to_value).collect(),
        })
    }

    /// CLOSEメッセージ
    pub fn close(subscription_id: &str) -> Result<Self, ParseError> {
        MessageParser::validate_subscription_id(subscription_id)?;
        Ok(ClientMessage::Close {
            subscription_id: subscription_id.to_string(),
        })
    }

    /// JSON文字列に変換
    pub fn to_json(&self) -> String {
        match self {
            ClientMessage::Event(event) => json!(["EVENT", event]).to_string(),
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                let mut array = vec![json!("REQ"), json!(subscription_id)];
                array.extend(filters.iter().cloned());
                Value::Array(array).to_string()
            }
            ClientMessage::Close { subscription_id } => {
                json!(["CLOSE", subscription_id]).to_string()
            }
        }
    }
}

/// クライアントメッセージパーサー
pub struct MessageParser;

impl MessageParser {
    /// メッセージをパースしてClientMessageに変換（デフォルト制限値を使用）
    ///
    /// # 例
    /// ```
    /// use relay_core::application::MessageParser;
    ///
    /// let result = MessageParser::parse(r#"["CLOSE", "sub1"]"#);
    /// assert!(result.is_ok());
    /// ```
    pub fn parse(message: &str) -> Result<ClientMessage, ParseError> {
        Self::parse_with_config(message, &LimitationConfig::default())
    }

    /// メッセージをパースしてClientMessageに変換（制限値設定を指定）
    ///
    /// メッセージ長は`max_message_length`、subscription_idの長さは
    /// `max_subid_length`で検証する。
    pub fn parse_with_config(
        message: &str,
        config: &LimitationConfig,
    ) -> Result<ClientMessage, ParseError> {
        if !config.accepts_message_length(message.len()) {
            return Err(ParseError::MessageTooLong {
                length: message.len(),
                max: config.max_message_length,
            });
        }

        let value: Value = serde_json::from_str(message).map_err(|_| ParseError::InvalidJson)?;

        let array = value.as_array().ok_or(ParseError::NotArray)?;

        // 最低1要素（メッセージタイプ）が必要
        let message_type = array
            .first()
            .ok_or(ParseError::MissingFields)?
            .as_str()
            .ok_or(ParseError::InvalidMessageType)?;

        match message_type {
            "EVENT" => Self::parse_event(array),
            "REQ" => Self::parse_req(array, config),
            "CLOSE" => Self::parse_close(array, config),
            other => Err(ParseError::UnknownMessageType(other.to_string())),
        }
    }

    /// フォーマット: ["EVENT", <event JSON>]
    fn parse_event(array: &[Value]) -> Result<ClientMessage, ParseError> {
        let event_json = array.get(1).ok_or(ParseError::MissingFields)?;
        Ok(ClientMessage::Event(event_json.clone()))
    }

    /// フォーマット: ["REQ", <subscription_id>, <filters>...]
    fn parse_req(array: &[Value], config: &LimitationConfig) -> Result<ClientMessage, ParseError> {
        let subscription_id = Self::subscription_id_at(array, config)?;
        let filters: Vec<Value> = array.iter().skip(2).cloned().collect();

        Ok(ClientMessage::Req {
            subscription_id,
            filters,
        })
    }

    /// フォーマット: ["CLOSE", <subscription_id>]
    fn parse_close(array: &[Value], config: &LimitationConfig) -> Result<ClientMessage, ParseError> {
        let subscription_id = Self::subscription_id_at(array, config)?;
        Ok(ClientMessage::Close { subscription_id })
    }

    fn subscription_id_at(array: &[Value], config: &LimitationConfig) -> Result<String, ParseError> {
        let subscription_id = array
            .get(1)
            .ok_or(ParseError::MissingFields)?
            .as_str()
            .ok_or(ParseError::InvalidSubscriptionId)?;
        if !config.accepts_subscription_id(subscription_id) {
            return Err(ParseError::InvalidSubscriptionId);
        }
        Ok(subscription_id.to_string())
    }

    /// subscription_idを既定の制限値で検証
    pub fn validate_subscription_id(subscription_id: &str) -> Result<(), ParseError> {
        if LimitationConfig::default().accepts_subscription_id(subscription_id) {
            Ok(())
        } else {
            Err(ParseError::InvalidSubscriptionId)
        }
    }
}
