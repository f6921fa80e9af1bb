/// リレーコア
///
/// クライアントメッセージ1件を受け取り、返すべきリレーメッセージ列を生成する。
/// トランスポート（WebSocket等）は呼び出し側の責務。
use tracing::{debug, trace};

use crate::application::{
    ClientMessage, EventHandler, MessageParser, ParseError, SubscriptionHandler,
};
use crate::domain::{LimitationConfig, RelayMessage};
use crate::infrastructure::EventRepository;

/// メッセージ種別ごとのハンドラーを束ねるディスパッチャー
///
/// 接続状態を持たないため、リポジトリが`Send + Sync`であれば
/// 複数スレッドから共有できる。
#[derive(Debug, Clone)]
pub struct Relay<R: EventRepository> {
    event_handler: EventHandler<R>,
    subscription_handler: SubscriptionHandler<R>,
    limits: LimitationConfig,
    repository: R,
}

impl<R: EventRepository> Relay<R> {
    pub fn new(repository: R, limits: LimitationConfig) -> Self {
        Self {
            event_handler: EventHandler::new(repository.clone()),
            subscription_handler: SubscriptionHandler::new(repository.clone(), limits.clone()),
            limits,
            repository,
        }
    }

    pub fn limits(&self) -> &LimitationConfig {
        &self.limits
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// クライアントメッセージを処理し、応答メッセージを返す
    ///
    /// - EVENT: OK または NOTICE の1件
    /// - REQ: EVENT* + EOSE、または NOTICE の1件
    /// - CLOSE: CLOSED の1件
    /// - 不正なメッセージ: NOTICE の1件
    pub fn ingest(&self, message: &str) -> Vec<RelayMessage> {
        let client_message = match MessageParser::parse_with_config(message, &self.limits) {
            Ok(client_message) => client_message,
            Err(err) => {
                debug!(error = %err, "メッセージパース失敗");
                return vec![Self::parse_error_notice(&err)];
            }
        };

        match client_message {
            ClientMessage::Event(event_json) => {
                trace!("EVENTメッセージ受信");
                vec![self.event_handler.handle(&event_json)]
            }
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                trace!(subscription_id = %subscription_id, "REQメッセージ受信");
                self.subscription_handler.handle_req(&subscription_id, &filters)
            }
            ClientMessage::Close { subscription_id } => {
                trace!(subscription_id = %subscription_id, "CLOSEメッセージ受信");
                vec![self.subscription_handler.handle_close(&subscription_id)]
            }
        }
    }

    /// `ingest`の結果をワイヤー形式のJSON文字列で返す
    pub fn ingest_json(&self, message: &str) -> Vec<String> {
        self.ingest(message)
            .iter()
            .map(RelayMessage::to_json)
            .collect()
    }

    fn parse_error_notice(err: &ParseError) -> RelayMessage {
        match err {
            ParseError::UnknownMessageType(message_type) => {
                RelayMessage::notice_unexpected(message_type)
            }
            _ => RelayMessage::notice_protocol_error(err),
        }
    }
}
