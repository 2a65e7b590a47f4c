//! # S3互換 オブジェクトストア実装
//!
//! AWS S3, MinIO, Cloudflare R2 等のS3互換APIを使用する
//! オブジェクトストア実装。署名付きURLの生成はローカルで完結し、
//! 一覧取得のみネットワークI/Oを伴う。

use super::ObjectStore;
use crate::error::GatewayError;

/// S3互換ストレージによるオブジェクトストア実装。
///
/// バケットは呼び出しごとに選択できるよう、リージョンと認証情報のみ保持する。
pub struct S3ObjectStore {
    region: s3::Region,
    credentials: s3::creds::Credentials,
    /// パス形式のアドレッシング（MinIO等のカスタムエンドポイント向け）
    path_style: bool,
}

impl S3ObjectStore {
    pub fn new(region: s3::Region, credentials: s3::creds::Credentials, path_style: bool) -> Self {
        Self {
            region,
            credentials,
            path_style,
        }
    }

    /// カスタムエンドポイント（MinIO等）から構築する。パス形式のアドレッシングを使う。
    pub fn with_endpoint(
        endpoint: &str,
        region: &str,
        credentials: s3::creds::Credentials,
    ) -> Self {
        let region = s3::Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };
        Self::new(region, credentials, true)
    }

    /// 環境変数から構築する。
    ///
    /// `S3_ENDPOINT` が設定されていればカスタムエンドポイント、
    /// なければ `S3_REGION` のAWSリージョンを使う。
    /// `S3_ACCESS_KEY` が未設定の場合は既定の認証情報チェーンを使う。
    pub fn from_env() -> anyhow::Result<Self> {
        let region_name = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let access_key = std::env::var("S3_ACCESS_KEY").ok();
        let secret_key = std::env::var("S3_SECRET_KEY").ok();

        let credentials = match (access_key.as_deref(), secret_key.as_deref()) {
            (Some(access_key), Some(secret_key)) => s3::creds::Credentials::new(
                Some(access_key),
                Some(secret_key),
                None,
                None,
                None,
            )?,
            _ => s3::creds::Credentials::default()?,
        };

        match std::env::var("S3_ENDPOINT").ok() {
            Some(endpoint) => {
                tracing::info!(
                    s3_endpoint = %endpoint,
                    s3_region = %region_name,
                    "カスタムS3エンドポイントを設定"
                );
                Ok(Self::with_endpoint(&endpoint, &region_name, credentials))
            }
            None => {
                let region: s3::Region = region_name.parse()?;
                Ok(Self::new(region, credentials, false))
            }
        }
    }

    fn bucket(&self, name: &str) -> Result<Box<s3::Bucket>, GatewayError> {
        let bucket = s3::Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| GatewayError::StoreUnavailable(format!("バケット {name} の初期化に失敗: {e}")))?;
        Ok(if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, GatewayError> {
        let pages = self
            .bucket(bucket)?
            .list(prefix.to_string(), None)
            .await
            .map_err(|e| {
                GatewayError::StoreUnavailable(format!("{bucket}/{prefix} の一覧取得に失敗: {e}"))
            })?;

        Ok(pages
            .into_iter()
            .flat_map(|page| page.contents.into_iter().map(|object| object.key))
            .collect())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: u32,
    ) -> Result<String, GatewayError> {
        self.bucket(bucket)?
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(|e| {
                GatewayError::StoreUnavailable(format!("署名付きダウンロードURL生成失敗: {e}"))
            })
    }
}
