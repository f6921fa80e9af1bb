// 制限値設定
//
// リレーが受け付けるメッセージサイズとクエリ件数の上限を保持し、
// 環境変数からの読み込みとデフォルト値を提供するドメイン層コンポーネント。

use tracing::{info, warn};

use crate::domain::validation::MAX_SUBSCRIPTION_ID_LENGTH;

// ===========================================
// デフォルト値定義
// ===========================================

/// クライアントメッセージの最大バイト数（128KB）
pub const DEFAULT_MAX_MESSAGE_LENGTH: u32 = 131072;

/// フィルターlimitの最大値
pub const DEFAULT_MAX_LIMIT: u32 = 5000;

// ===========================================
// 環境変数名定義
// ===========================================

/// 環境変数名: max_message_length
pub const ENV_MAX_MESSAGE_LENGTH: &str = "RELAY_MAX_MESSAGE_LENGTH";

/// 環境変数名: max_limit
pub const ENV_MAX_LIMIT: &str = "RELAY_MAX_LIMIT";

/// 制限値設定（ドメイン層）
///
/// 起動時に一度だけ初期化される不変データ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitationConfig {
    /// クライアントメッセージの最大バイト数
    pub max_message_length: u32,

    /// フィルターlimitの最大値
    pub max_limit: u32,

    /// サブスクリプションIDの最大長（64固定）
    pub max_subid_length: u32,
}

impl Default for LimitationConfig {
    fn default() -> Self {
        Self {
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_limit: DEFAULT_MAX_LIMIT,
            max_subid_length: MAX_SUBSCRIPTION_ID_LENGTH as u32,
        }
    }
}

impl LimitationConfig {
    /// 環境変数から設定を読み込み
    ///
    /// 未設定またはパースエラーの場合はデフォルト値を使用する。
    /// max_subid_lengthは常に64固定。
    ///
    /// # 環境変数
    /// - RELAY_MAX_MESSAGE_LENGTH: クライアントメッセージの最大バイト数
    /// - RELAY_MAX_LIMIT: フィルターlimitの最大値
    pub fn from_env() -> Self {
        let max_message_length =
            parse_env_u32(ENV_MAX_MESSAGE_LENGTH, DEFAULT_MAX_MESSAGE_LENGTH);
        let max_limit = parse_env_u32(ENV_MAX_LIMIT, DEFAULT_MAX_LIMIT);
        let max_subid_length = MAX_SUBSCRIPTION_ID_LENGTH as u32;

        info!(
            max_message_length,
            max_limit, max_subid_length, "LimitationConfig loaded"
        );

        Self {
            max_message_length,
            max_limit,
            max_subid_length,
        }
    }

    /// メッセージ長が上限以内か
    pub fn accepts_message_length(&self, length: usize) -> bool {
        u32::try_from(length).is_ok_and(|length| length <= self.max_message_length)
    }

    /// サブスクリプションIDが1文字以上max_subid_length文字以下か
    pub fn accepts_subscription_id(&self, subscription_id: &str) -> bool {
        let length = subscription_id.chars().count();
        length >= 1 && u32::try_from(length).is_ok_and(|length| length <= self.max_subid_length)
    }

    /// 要求されたlimitをmax_limitで丸める
    pub fn clamp_limit(&self, requested: u64) -> u64 {
        requested.min(u64::from(self.max_limit))
    }
}

/// 環境変数からu32値を読み込む
///
/// 未設定またはパースエラーの場合はデフォルト値を返す。
fn parse_env_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(value) => match value.parse::<u32>() {
            Ok(parsed) => {
                info!(key, value = parsed, "Environment variable loaded");
                parsed
            }
            Err(_) => {
                warn!(
                    key,
                    value = %value,
                    default,
                    "Environment variable parse error, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}
