/// サブスクリプションハンドラー
///
/// NIP-01準拠のREQ/CLOSEメッセージ処理を実行する
/// 保存済みイベントを返してEOSEで終わる（ライブ配信は行わない）
use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::domain::{Filter, FilterError, LimitationConfig, RelayMessage, SignedEvent};
use crate::infrastructure::{EventRepository, EventRepositoryError};

/// サブスクリプションハンドラーのエラー型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionHandlerError {
    /// フィルター検証エラー
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    /// リポジトリエラー
    #[error("{0}")]
    RepositoryError(#[from] EventRepositoryError),
}

impl SubscriptionHandlerError {
    /// クライアントに返すNOTICEへ変換
    pub fn to_notice(&self) -> RelayMessage {
        match self {
            SubscriptionHandlerError::InvalidFilter(_) => RelayMessage::notice_validation_error(self),
            SubscriptionHandlerError::RepositoryError(err) => {
                RelayMessage::notice_storage_error(err)
            }
        }
    }
}

/// REQ/CLOSEメッセージを処理するハンドラー
#[derive(Debug, Clone)]
pub struct SubscriptionHandler<R: EventRepository> {
    repository: R,
    limits: LimitationConfig,
}

impl<R: EventRepository> SubscriptionHandler<R> {
    pub fn new(repository: R, limits: LimitationConfig) -> Self {
        Self { repository, limits }
    }

    /// REQメッセージを処理
    ///
    /// # 処理フロー
    /// 1. 全フィルターをパース（失敗時はNOTICE("ValidationError: …")のみ）
    /// 2. フィルターごとに作者で候補を取得し、述語で再確認
    /// 3. limit指定があれば新しい順に切り詰め（max_limitで上限）
    /// 4. フィルター間でid重複を除去
    /// 5. EVENTメッセージ群 + EOSE
    ///
    /// フィルターが0個の場合はEOSEのみ。
    pub fn handle_req(&self, subscription_id: &str, filters: &[Value]) -> Vec<RelayMessage> {
        trace!(
            subscription_id = subscription_id,
            filter_count = filters.len(),
            "REQメッセージ処理開始"
        );

        match self.collect(filters) {
            Ok(events) => {
                debug!(
                    subscription_id = subscription_id,
                    event_count = events.len(),
                    "保存済みイベント送信"
                );
                events
                    .into_iter()
                    .map(|event| RelayMessage::Event {
                        subscription_id: subscription_id.to_string(),
                        event,
                    })
                    .chain(std::iter::once(RelayMessage::eose(subscription_id)))
                    .collect()
            }
            Err(err) => {
                warn!(subscription_id = subscription_id, error = %err, "REQ処理失敗");
                vec![err.to_notice()]
            }
        }
    }

    /// CLOSEメッセージを処理
    pub fn handle_close(&self, subscription_id: &str) -> RelayMessage {
        debug!(subscription_id = subscription_id, "サブスクリプション終了");
        RelayMessage::closed_requested(subscription_id)
    }

    /// フィルター群にマッチする保存済みイベントを重複なしで集める
    pub fn collect(&self, filters: &[Value]) -> Result<Vec<SignedEvent>, SubscriptionHandlerError> {
        let filters = filters
            .iter()
            .map(Filter::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for filter in &filters {
            for event in self.query(filter)? {
                if seen.insert(*event.id()) {
                    results.push(event);
                }
            }
        }
        Ok(results)
    }

    fn query(&self, filter: &Filter) -> Result<Vec<SignedEvent>, EventRepositoryError> {
        let authors: Vec<String> = filter.authors.iter().cloned().collect();
        let matched = self
            .repository
            .query_by_authors(&authors)?
            .into_iter()
            .filter(|event| filter.matches(event));

        // 候補はリポジトリが新しい順で返す
        Ok(match filter.limit {
            Some(limit) => {
                let limit = usize::try_from(self.limits.clamp_limit(limit)).unwrap_or(usize::MAX);
                matched.take(limit).collect()
            }
            None => matched.collect(),
        })
    }
}
