//! Nostrリレーのコア
//!
//! - domain: イベントモデル、正準シリアライズ、署名、フィルター、Kind分類
//! - application: クライアントメッセージのパースとEVENT/REQ/CLOSE処理
//! - infrastructure: イベントストア（インメモリ/SQLite）、設定、ログ

// Domain layer modules
pub mod domain;

// Application layer modules
pub mod application;

// Infrastructure layer modules
pub mod infrastructure;

pub use application::Relay;
