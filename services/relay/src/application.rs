// アプリケーション層モジュール
pub mod event_handler;
pub mod message_parser;
pub mod relay;
pub mod subscription_handler;

// 再エクスポート
pub use event_handler::EventHandler;
pub use message_parser::{ClientMessage, MessageParser, ParseError};
pub use relay::Relay;
pub use subscription_handler::{SubscriptionHandler, SubscriptionHandlerError};
