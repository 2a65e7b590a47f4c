//! # Agent Kit Courier 暗号処理
//!
//! CDN署名付きURLのためのポリシー構築・署名・検証を提供する。
//! ネットワークI/Oは一切行わない純粋な変換のみで構成される。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | ポリシー署名 | RSASSA-PKCS1-v1_5 + SHA-1 |
//! | 署名・ポリシーのエンコード | CDN安全Base64（`+`→`-`, `=`→`_`, `/`→`~`） |
//! | 秘密鍵形式 | PKCS#1 PEM / PKCS#8 PEM |
//!
//! ## ポリシー種別
//! - 既定ポリシー（canned）: リソースと有効期限のみ。URLには `Expires` を付与する
//! - カスタムポリシー（custom）: 追加条件付き。URLには `Policy` を埋め込む

pub mod policy;
pub mod signer;

use base64::Engine;

pub use policy::{CdnPolicy, PolicyConditions};
pub use signer::{
    parse_private_key_pem, parse_public_key_pem, sign_url, sign_url_at, verify_signed_url,
    SignedUrl, VerifiedAccess,
};

pub use rsa::{RsaPrivateKey, RsaPublicKey};

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// 有効期限が発行時刻より後でない
    #[error("有効期限が不正です: {0}")]
    InvalidExpiry(String),
    /// ポリシーの構築に失敗
    #[error("ポリシーが不正です: {0}")]
    InvalidPolicy(String),
    /// 秘密鍵の読み込みまたは署名に失敗
    #[error("署名に失敗しました: {0}")]
    SigningError(String),
    /// 署名付きURLの形式が不正
    #[error("署名付きURLの形式が不正です: {0}")]
    MalformedSignedUrl(String),
    /// 署名またはポリシー条件の検証に失敗
    #[error("署名付きURLの検証に失敗しました: {0}")]
    VerificationFailed(String),
}

/// Base64エンジン（Standard）
fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// CDN安全Base64でエンコードする。
///
/// クエリ文字列で意味を持つ `+`, `=`, `/` をそれぞれ `-`, `_`, `~` に置換する。
pub fn cdn_b64_encode(data: &[u8]) -> String {
    b64()
        .encode(data)
        .chars()
        .map(|c| match c {
            '+' => '-',
            '=' => '_',
            '/' => '~',
            other => other,
        })
        .collect()
}

/// CDN安全Base64をデコードする。
pub fn cdn_b64_decode(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    let standard: String = encoded
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '=',
            '~' => '/',
            other => other,
        })
        .collect();
    b64()
        .decode(standard)
        .map_err(|e| CryptoError::MalformedSignedUrl(format!("Base64デコード失敗: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdn_b64_replaces_query_sensitive_chars() {
        // 0xfb 0xff → "+/8=" in standard Base64
        let encoded = cdn_b64_encode(&[0xfb, 0xff]);
        assert_eq!(encoded, "-~8_");
        assert!(!encoded.contains(|c: char| matches!(c, '+' | '=' | '/')));
        assert_eq!(cdn_b64_decode(&encoded).unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn test_cdn_b64_decode_rejects_garbage() {
        assert!(matches!(
            cdn_b64_decode("!!!"),
            Err(CryptoError::MalformedSignedUrl(_))
        ));
    }
}
