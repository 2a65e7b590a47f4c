//! # オブジェクトストア
//!
//! オブジェクトストアの抽象インターフェースと、有効期限付きの
//! 署名付きURL（presigned URL）の発行。
//! 署名計算そのものはストア側の署名方式に委ね、ここではバケットの選択、
//! キーの構築、有効期間の設定を担う。
//!
//! S3互換ストレージ実装は `s3` サブモジュールを参照。

pub mod s3;

pub use s3::S3ObjectStore;

use chrono::{DateTime, Utc};

use crate::error::GatewayError;

/// SigV4署名付きURLの有効期間の上限（7日）。
pub const MAX_PRESIGN_EXPIRY_SECS: i64 = 7 * 24 * 60 * 60;

/// オブジェクトストアが発行した署名付きURL。
///
/// ストアは署名時刻を署名に含めるため、同じ入力でも呼び出し時刻が
/// 異なれば異なるURLになる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    /// バケット名
    pub bucket: String,
    /// オブジェクトキー
    pub key: String,
    /// 有効期限（秒単位）
    pub expires_at: DateTime<Utc>,
    /// 署名付きURL
    pub url: String,
}

/// オブジェクトストアの抽象インターフェース。
///
/// AWS S3, MinIO, Cloudflare R2 等のS3互換ストレージや
/// テスト用のモックを実装として差し替えられる。
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// プレフィックスに一致するオブジェクトキーを列挙する。
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, GatewayError>;

    /// ダウンロード用（GET）の署名付きURLを生成する。
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: u32,
    ) -> Result<String, GatewayError>;
}

/// 指定した有効期限までダウンロード可能な署名付きURLを発行する。
pub async fn presign(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    expires_at: DateTime<Utc>,
) -> Result<PresignedUrl, GatewayError> {
    presign_at(store, bucket, key, expires_at, Utc::now()).await
}

/// `now` を発行時刻として署名付きURLを発行する。
///
/// 有効期間は `expires_at - now` を秒単位で求め、ストアに渡す。
pub async fn presign_at(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<PresignedUrl, GatewayError> {
    let bucket = bucket.trim();
    let key = key.trim().trim_start_matches('/');
    if bucket.is_empty() {
        return Err(GatewayError::ObjectNotAddressable(
            "バケット名が空です".to_string(),
        ));
    }
    if key.is_empty() {
        return Err(GatewayError::ObjectNotAddressable(
            "オブジェクトキーが空です".to_string(),
        ));
    }

    let expiry_secs = expires_at.timestamp() - now.timestamp();
    if expiry_secs <= 0 {
        return Err(GatewayError::InvalidExpiry(format!(
            "有効期限 {} が発行時刻 {} より後ではありません",
            expires_at.to_rfc3339(),
            now.to_rfc3339()
        )));
    }
    if expiry_secs > MAX_PRESIGN_EXPIRY_SECS {
        return Err(GatewayError::InvalidExpiry(format!(
            "有効期間 {expiry_secs} 秒が上限 {MAX_PRESIGN_EXPIRY_SECS} 秒を超えています"
        )));
    }

    let url = store.presign_get(bucket, key, expiry_secs as u32).await?;
    let expires_at = DateTime::from_timestamp(now.timestamp() + expiry_secs, 0)
        .ok_or_else(|| GatewayError::InvalidExpiry("有効期限が範囲外です".to_string()))?;

    Ok(PresignedUrl {
        bucket: bucket.to_string(),
        key: key.to_string(),
        expires_at,
        url,
    })
}
