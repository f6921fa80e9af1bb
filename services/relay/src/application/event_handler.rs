/// EVENTメッセージハンドラー
///
/// NIP-01準拠のイベント処理を実行する
/// 構造検証 → 署名・ID検証 → Kind分類 → Kind別の保存 → OK応答
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::domain::{EventKind, RelayMessage, SignedEvent};
use crate::infrastructure::{EventRepository, EventRepositoryError, SaveResult};

/// EVENTメッセージを処理するハンドラー
#[derive(Debug, Clone)]
pub struct EventHandler<R: EventRepository> {
    repository: R,
}

impl<R: EventRepository> EventHandler<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// EVENTメッセージを処理
    ///
    /// # 処理フロー
    /// 1. イベントJSONの構造検証（失敗時はNOTICE）
    /// 2. 署名・IDの検証（失敗時はOK false）
    /// 3. Kind分類（Rejectedは OK false "kind: n"）
    /// 4. Ephemeral以外はリポジトリに保存
    /// 5. OK応答を返却
    ///
    /// 重複や置換に負けた書き込みも受理扱い（OK true）。
    /// 保存に失敗した場合はNOTICE("StorageError: …")。
    pub fn handle(&self, event_json: &Value) -> RelayMessage {
        let event = match SignedEvent::validate(event_json) {
            Ok(event) => event,
            Err(err) => {
                debug!(error = %err, "イベント構造検証失敗");
                return RelayMessage::notice_validation_error(err);
            }
        };

        trace!(event_id = %event.id(), kind = event.kind(), "EVENTメッセージ処理開始");

        if let Err(err) = event.verify(true) {
            debug!(event_id = %event.id(), error = %err, "署名・ID検証失敗");
            return RelayMessage::ok_verify_failed(event.id(), &err);
        }

        let kind = EventKind::classify(event.kind());
        debug!(
            event_id = %event.id(),
            kind = event.kind(),
            kind_type = ?kind,
            "Kind分類完了"
        );

        if !kind.is_accepted() {
            debug!(event_id = %event.id(), kind = event.kind(), "受け付けないKind");
            return RelayMessage::ok_kind_rejected(event.id(), event.kind());
        }

        if !kind.should_store() {
            debug!(event_id = %event.id(), "Ephemeralイベント: 保存しない");
            return RelayMessage::ok_success(event.id());
        }

        match self.store(&event, kind) {
            Ok(result) => {
                trace!(event_id = %event.id(), result = ?result, "イベント保存完了");
                RelayMessage::ok_success(event.id())
            }
            Err(err) => {
                warn!(event_id = %event.id(), error = %err, "イベント保存失敗");
                RelayMessage::notice_storage_error(err)
            }
        }
    }

    /// 保存対象のKindをリポジトリへ書き込む
    ///
    /// 置換可能イベントのキーは (kind, pubkey, d_tag)。
    /// d_tagはパラメータ付き置換可能イベントのみ使い、それ以外は空文字列。
    fn store(&self, event: &SignedEvent, kind: EventKind) -> Result<SaveResult, EventRepositoryError> {
        if !kind.is_replaceable() {
            return self.repository.append_event(event);
        }
        let d_tag = match kind {
            EventKind::ParameterizedReplaceable => event.d_tag(),
            _ => "",
        };
        self.repository.upsert_replaceable(event, d_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::Event;
    use crate::domain::signature::Keys;
    use crate::domain::validation::is_help_message;
    use crate::infrastructure::MemoryEventRepository;
    use crate::infrastructure::event_repository::tests::{FailingRepository, signed, signed_with_d};
    use serde_json::json;

    fn handler() -> (EventHandler<MemoryEventRepository>, MemoryEventRepository) {
        let repo = MemoryEventRepository::new();
        (EventHandler::new(repo.clone()), repo)
    }

    fn assert_accepted(message: &RelayMessage, event: &SignedEvent) {
        assert_eq!(
            message,
            &RelayMessage::Ok {
                event_id: event.id().to_hex(),
                accepted: true,
                message: String::new(),
            }
        );
    }

    fn rejection_message(message: &RelayMessage) -> &str {
        match message {
            RelayMessage::Ok {
                accepted: false,
                message,
                ..
            } => message,
            other => panic!("Expected rejected OK, got {:?}", other),
        }
    }

    // ==================== Kind別保存のテスト ====================

    #[test]
    fn test_regular_event_is_stored() {
        let (handler, repo) = handler();
        let keys = Keys::generate();
        let event = signed(&keys, 1, 100, "hello");

        assert_accepted(&handler.handle(&event.to_value()), &event);
        assert_eq!(repo.query_by_authors(&[]).unwrap(), vec![event]);
    }

    #[test]
    fn test_duplicate_event_is_accepted() {
        let (handler, repo) = handler();
        let keys = Keys::generate();
        let event = signed(&keys, 1, 100, "hello");

        handler.handle(&event.to_value());
        assert_accepted(&handler.handle(&event.to_value()), &event);
        assert_eq!(repo.event_count().unwrap(), 1);
    }

    #[test]
    fn test_replaceable_event_keeps_newest() {
        let (handler, repo) = handler();
        let keys = Keys::generate();
        let newer = signed(&keys, 0, 200, r#"{"name":"new"}"#);
        let older = signed(&keys, 0, 100, r#"{"name":"old"}"#);

        assert_accepted(&handler.handle(&newer.to_value()), &newer);
        // 古い方も受理されるが保存は変わらない
        assert_accepted(&handler.handle(&older.to_value()), &older);
        assert_eq!(repo.query_by_authors(&[]).unwrap(), vec![newer]);
    }

    #[test]
    fn test_parameterized_replaceable_keyed_by_d_tag() {
        let (handler, repo) = handler();
        let keys = Keys::generate();
        let a1 = signed_with_d(&keys, 30023, 100, "a");
        let b = signed_with_d(&keys, 30023, 100, "b");
        let mut a2 = Event::with_kind("a v2", 30023, *keys.public_key());
        a2.add_tag("d", "a", &[]).unwrap();
        let a2 = a2.sign_at(keys.secret_key(), 200).unwrap();

        for event in [&a1, &b, &a2] {
            assert_accepted(&handler.handle(&event.to_value()), event);
        }

        let stored = repo.query_by_authors(&[]).unwrap();
        assert_eq!(stored, vec![a2, b]);
    }

    #[test]
    fn test_replaceable_kind_ignores_d_tag() {
        let (handler, repo) = handler();
        let keys = Keys::generate();
        // 10000番台はdタグが違っても同じキーで置換される
        let older = signed_with_d(&keys, 10002, 100, "a");
        let newer = signed_with_d(&keys, 10002, 200, "b");

        assert_accepted(&handler.handle(&older.to_value()), &older);
        assert_accepted(&handler.handle(&newer.to_value()), &newer);
        assert_eq!(repo.query_by_authors(&[]).unwrap(), vec![newer]);
    }

    #[test]
    fn test_ephemeral_event_is_not_stored() {
        let (handler, repo) = handler();
        let keys = Keys::generate();
        let event = signed(&keys, 20001, 100, "typing");

        assert_accepted(&handler.handle(&event.to_value()), &event);
        assert_eq!(repo.event_count().unwrap(), 0);
    }

    #[test]
    fn test_rejected_kinds() {
        let (handler, repo) = handler();
        let keys = Keys::generate();

        for kind in [2u16, 45, 999, 31000, 65535] {
            let event = signed(&keys, kind, 100, "nope");
            let response = handler.handle(&event.to_value());
            assert_eq!(rejection_message(&response), format!("kind: {}", kind));
        }
        assert_eq!(repo.event_count().unwrap(), 0);
    }

    // ==================== 検証失敗のテスト ====================

    #[test]
    fn test_tampered_content_fails_id_check() {
        let (handler, repo) = handler();
        let keys = Keys::generate();
        let event = signed(&keys, 1, 100, "original");
        let mut raw = event.to_value();
        raw["content"] = json!("tampered");

        // 署名はidに対して有効なのでIdCheckで失敗する
        let response = handler.handle(&raw);
        let message = rejection_message(&response);
        assert_eq!(message, format!("IdCheck: {}", event.id()));
        assert!(is_help_message(message));
        assert_eq!(repo.event_count().unwrap(), 0);
    }

    #[test]
    fn test_foreign_signature_fails_signature_check() {
        let (handler, _) = handler();
        let keys = Keys::generate();
        let other = signed(&Keys::generate(), 1, 100, "other");
        let event = signed(&keys, 1, 100, "mine");
        let mut raw = event.to_value();
        raw["sig"] = json!(other.sig().to_hex());

        let response = handler.handle(&raw);
        assert_eq!(
            rejection_message(&response),
            format!("SignatureCheck: {}", other.sig())
        );
    }

    #[test]
    fn test_malformed_event_yields_validation_notice() {
        let (handler, _) = handler();
        let response = handler.handle(&json!({"content": "x"}));
        match response {
            RelayMessage::Notice { message } => {
                assert!(message.starts_with("ValidationError: "), "{}", message);
            }
            other => panic!("Expected NOTICE, got {:?}", other),
        }
    }

    // ==================== ストレージ障害のテスト ====================

    #[test]
    fn test_storage_failure_yields_storage_notice() {
        let handler = EventHandler::new(FailingRepository);
        let keys = Keys::generate();
        let event = signed(&keys, 1, 100, "hello");

        assert_eq!(
            handler.handle(&event.to_value()),
            RelayMessage::Notice {
                message: "StorageError: Write error: disk full".to_string(),
            }
        );
    }

    #[test]
    fn test_storage_failure_does_not_affect_ephemeral() {
        let handler = EventHandler::new(FailingRepository);
        let keys = Keys::generate();
        let event = signed(&keys, 25000, 100, "ephemeral");

        assert_accepted(&handler.handle(&event.to_value()), &event);
    }
}
