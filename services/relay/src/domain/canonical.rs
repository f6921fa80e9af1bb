/// 正準シリアライズ（NIP-01）
///
/// イベントIDの計算にのみ使う決定的なJSON配列エンコーディング。
/// `[0, pubkey, created_at, kind, tags, content]` を空白なしのJSONで出力する。
use serde_json::json;
use sha2::{Digest, Sha256};

/// 正準バイト列を生成する
pub fn encode(
    pubkey_hex: &str,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> Vec<u8> {
    json!([0, pubkey_hex, created_at, kind, tags, content])
        .to_string()
        .into_bytes()
}

/// 正準バイト列のSHA-256ダイジェスト（= イベントID）
pub fn digest(
    pubkey_hex: &str,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> [u8; 32] {
    hash(&encode(pubkey_hex, created_at, kind, tags, content))
}

/// 正準バイト列のSHA-256
pub fn hash(canonical: &[u8]) -> [u8; 32] {
    Sha256::digest(canonical).into()
}
