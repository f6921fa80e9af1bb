/// Relay to client messages
use std::fmt::Display;

use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::event::SignedEvent;
use crate::domain::event_validator::VerifyError;
use crate::domain::validation::{EventId, ValidationError};

/// Machine-readable prefixes for OK, CLOSED and NOTICE messages
///
/// Every rejection reads `<prefix>: <detail>`.
pub mod error_prefix {
    pub const SIGNATURE_CHECK: &str = "SignatureCheck";
    pub const ID_CHECK: &str = "IdCheck";
    pub const KIND: &str = "kind";
    pub const VALIDATION: &str = "ValidationError";
    pub const PROTOCOL: &str = "ProtocolError";
    pub const STORAGE: &str = "StorageError";
    pub const UNEXPECTED: &str = "unexpected";
    pub const REASON: &str = "reason";
}

/// Errors when parsing a relay message on the client side
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayMessageError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("message must be a JSON array")]
    NotArray,
    #[error("message type must be a string")]
    InvalidMessageType,
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
    #[error("missing or malformed fields")]
    MissingFields,
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] ValidationError),
}

/// Relay to client messages
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    /// ["EVENT", <subscription_id>, <event JSON>]
    Event {
        subscription_id: String,
        event: SignedEvent,
    },

    /// ["OK", <event_id>, <true|false>, <message>]
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },

    /// ["EOSE", <subscription_id>]
    Eose { subscription_id: String },

    /// ["CLOSED", <subscription_id>, <message>]
    Closed {
        subscription_id: String,
        message: String,
    },

    /// ["NOTICE", <message>]
    Notice { message: String },
}

impl RelayMessage {
    /// Convert message to a JSON array value
    pub fn to_value(&self) -> Value {
        match self {
            RelayMessage::Event {
                subscription_id,
                event,
            } => json!(["EVENT", subscription_id, event.to_value()]),

            RelayMessage::Ok {
                event_id,
                accepted,
                message,
            } => json!(["OK", event_id, accepted, message]),

            RelayMessage::Eose { subscription_id } => json!(["EOSE", subscription_id]),

            RelayMessage::Closed {
                subscription_id,
                message,
            } => json!(["CLOSED", subscription_id, message]),

            RelayMessage::Notice { message } => json!(["NOTICE", message]),
        }
    }

    /// Convert message to a JSON string
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Parse a relay message (client side)
    ///
    /// EVENT payloads are validated but not verified.
    pub fn from_json(text: &str) -> Result<Self, RelayMessageError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| RelayMessageError::InvalidJson(e.to_string()))?;
        let arr = value.as_array().ok_or(RelayMessageError::NotArray)?;
        let msg_type = arr
            .first()
            .ok_or(RelayMessageError::MissingFields)?
            .as_str()
            .ok_or(RelayMessageError::InvalidMessageType)?;
        let string_at = |index: usize| {
            arr.get(index)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(RelayMessageError::MissingFields)
        };

        match msg_type {
            "EVENT" => {
                let subscription_id = string_at(1)?;
                let raw = arr.get(2).ok_or(RelayMessageError::MissingFields)?;
                Ok(RelayMessage::Event {
                    subscription_id,
                    event: SignedEvent::validate(raw)?,
                })
            }
            "OK" => Ok(RelayMessage::Ok {
                event_id: string_at(1)?,
                accepted: arr
                    .get(2)
                    .and_then(Value::as_bool)
                    .ok_or(RelayMessageError::MissingFields)?,
                message: string_at(3)?,
            }),
            "EOSE" => Ok(RelayMessage::Eose {
                subscription_id: string_at(1)?,
            }),
            "CLOSED" => Ok(RelayMessage::Closed {
                subscription_id: string_at(1)?,
                message: string_at(2)?,
            }),
            "NOTICE" => Ok(RelayMessage::Notice {
                message: string_at(1)?,
            }),
            other => Err(RelayMessageError::UnknownMessageType(other.to_string())),
        }
    }

    // ==================== OK Message Helpers ====================

    /// Accepted; the message is always empty
    pub fn ok_success(event_id: &EventId) -> Self {
        RelayMessage::Ok {
            event_id: event_id.to_hex(),
            accepted: true,
            message: String::new(),
        }
    }

    /// Rejected with `<prefix>: <detail>`
    pub fn ok_error(event_id: &EventId, prefix: &str, detail: impl Display) -> Self {
        RelayMessage::Ok {
            event_id: event_id.to_hex(),
            accepted: false,
            message: format!("{}: {}", prefix, detail),
        }
    }

    /// Rejected by signature or id verification
    pub fn ok_verify_failed(event_id: &EventId, error: &VerifyError) -> Self {
        RelayMessage::Ok {
            event_id: event_id.to_hex(),
            accepted: false,
            message: error.to_string(),
        }
    }

    /// Rejected because of its kind
    pub fn ok_kind_rejected(event_id: &EventId, kind: u16) -> Self {
        Self::ok_error(event_id, error_prefix::KIND, kind)
    }

    // ==================== EOSE / CLOSED Helpers ====================

    pub fn eose(subscription_id: &str) -> Self {
        RelayMessage::Eose {
            subscription_id: subscription_id.to_string(),
        }
    }

    pub fn closed(subscription_id: &str, prefix: &str, detail: impl Display) -> Self {
        RelayMessage::Closed {
            subscription_id: subscription_id.to_string(),
            message: format!("{}: {}", prefix, detail),
        }
    }

    /// Reply to a client CLOSE
    pub fn closed_requested(subscription_id: &str) -> Self {
        Self::closed(subscription_id, error_prefix::REASON, "CLOSE requested")
    }

    // ==================== NOTICE Helpers ====================

    pub fn notice(prefix: &str, detail: impl Display) -> Self {
        RelayMessage::Notice {
            message: format!("{}: {}", prefix, detail),
        }
    }

    pub fn notice_protocol_error(detail: impl Display) -> Self {
        Self::notice(error_prefix::PROTOCOL, detail)
    }

    pub fn notice_validation_error(detail: impl Display) -> Self {
        Self::notice(error_prefix::VALIDATION, detail)
    }

    pub fn notice_storage_error(detail: impl Display) -> Self {
        Self::notice(error_prefix::STORAGE, detail)
    }

    /// Unknown client message type
    pub fn notice_unexpected(msg_type: &str) -> Self {
        Self::notice(error_prefix::UNEXPECTED, msg_type)
    }
}
