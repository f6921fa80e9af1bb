/// 署名ゲート（BIP-340 Schnorr over secp256k1）
///
/// 鍵生成、公開鍵導出、32バイトダイジェストへの署名と検証を提供する。
use std::fmt;
use std::sync::LazyLock;

use secp256k1::{All, Keypair, Message, Secp256k1, XOnlyPublicKey, schnorr};

use crate::domain::validation::{PublicKey, Signature, ValidationError};

static SECP: LazyLock<Secp256k1<All>> = LazyLock::new(Secp256k1::new);

/// 秘密鍵
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SecretKey(secp256k1::SecretKey);

impl SecretKey {
    /// 乱数から新しい秘密鍵を生成する
    pub fn generate() -> Self {
        let (secret_key, _) = SECP.generate_keypair(&mut secp256k1::rand::thread_rng());
        Self(secret_key)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        secp256k1::SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| ValidationError::InvalidSecretKey)
    }

    pub fn from_hex(value: &str) -> Result<Self, ValidationError> {
        let bytes = hex::decode(value).map_err(|_| ValidationError::InvalidSecretKey)?;
        Self::from_bytes(&bytes)
    }

    /// x-only公開鍵を導出する
    pub fn public_key(&self) -> PublicKey {
        let (xonly, _parity) = self.0.x_only_public_key(&*SECP);
        PublicKey::from_bytes(xonly.serialize())
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.0.secret_bytes()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// 秘密鍵と公開鍵のペア
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keys {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Keys {
    pub fn new(secret_key: SecretKey) -> Self {
        Self {
            public_key: secret_key.public_key(),
            secret_key,
        }
    }

    pub fn generate() -> Self {
        Self::new(SecretKey::generate())
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

/// ダイジェストに署名する（補助乱数なし、決定的）
pub fn sign(secret_key: &SecretKey, digest: &[u8; 32]) -> Signature {
    let keypair = Keypair::from_secret_key(&*SECP, &secret_key.0);
    let message = Message::from_digest(*digest);
    let sig = SECP.sign_schnorr_no_aux_rand(&message, &keypair);
    Signature::from_bytes(sig.serialize())
}

/// 署名を検証する
///
/// 公開鍵が曲線上の点でない場合や署名が不正な場合は `false`。
pub fn verify(pubkey: &PublicKey, digest: &[u8; 32], signature: &Signature) -> bool {
    let Ok(xonly) = XOnlyPublicKey::from_slice(pubkey.as_bytes()) else {
        return false;
    };
    let Ok(sig) = schnorr::Signature::from_slice(signature.as_bytes()) else {
        return false;
    };
    let message = Message::from_digest(*digest);
    SECP.verify_schnorr(&sig, &message, &xonly).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // BIP-340 テストベクタ 0
    const BIP340_SECRET: &str = "0000000000000000000000000000000000000000000000000000000000000003";
    const BIP340_PUBKEY: &str = "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9";

    // ==================== 鍵 ====================

    #[test]
    fn test_public_key_derivation_matches_bip340_vector() {
        let secret_key = SecretKey::from_hex(BIP340_SECRET).unwrap();
        assert_eq!(secret_key.public_key().to_hex(), BIP340_PUBKEY);
    }

    #[test]
    fn test_invalid_secret_keys() {
        assert_eq!(
            SecretKey::from_hex(&"0".repeat(64)),
            Err(ValidationError::InvalidSecretKey)
        );
        assert_eq!(SecretKey::from_hex("zz"), Err(ValidationError::InvalidSecretKey));
        assert_eq!(
            SecretKey::from_bytes(&[1u8; 31]),
            Err(ValidationError::InvalidSecretKey)
        );
    }

    #[test]
    fn test_secret_key_debug_is_redacted() {
        let secret_key = SecretKey::from_hex(BIP340_SECRET).unwrap();
        assert_eq!(format!("{:?}", secret_key), "SecretKey(<redacted>)");
    }

    #[test]
    fn test_keys_generate_pairs_match() {
        let keys = Keys::generate();
        assert_eq!(keys.secret_key().public_key(), *keys.public_key());
    }

    // ==================== 署名・検証 ====================

    #[test]
    fn test_sign_is_deterministic() {
        let secret_key = SecretKey::from_hex(BIP340_SECRET).unwrap();
        let digest = [0u8; 32];
        assert_eq!(sign(&secret_key, &digest), sign(&secret_key, &digest));
    }

    #[test]
    fn test_verify_rejects_other_digest_and_key() {
        let keys = Keys::generate();
        let other = Keys::generate();
        let digest = [42u8; 32];
        let sig = sign(keys.secret_key(), &digest);

        assert!(verify(keys.public_key(), &digest, &sig));
        assert!(!verify(keys.public_key(), &[43u8; 32], &sig));
        assert!(!verify(other.public_key(), &digest, &sig));
    }

    #[test]
    fn test_verify_rejects_pubkey_not_on_curve() {
        let keys = Keys::generate();
        let digest = [1u8; 32];
        let sig = sign(keys.secret_key(), &digest);
        // x = 0xff..ff はフィールド素数を超えるため点にならない
        let invalid = PublicKey::from_bytes([0xff; 32]);
        assert!(!verify(&invalid, &digest, &sig));
    }

    #[test]
    fn test_verify_rejects_random_signature() {
        let keys = Keys::generate();
        let sig = Signature::from_bytes([7u8; 64]);
        assert!(!verify(keys.public_key(), &[0u8; 32], &sig));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_sign_verify_roundtrip(secret in any::<[u8; 32]>(), digest in any::<[u8; 32]>()) {
            // 曲線の位数以上・ゼロの値は秘密鍵にならないので除外
            if let Ok(secret_key) = SecretKey::from_bytes(&secret) {
                let sig = sign(&secret_key, &digest);
                prop_assert!(verify(&secret_key.public_key(), &digest, &sig));
            }
        }
    }
}
