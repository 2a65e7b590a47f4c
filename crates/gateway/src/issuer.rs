//! # アクセストークン発行
//!
//! 要求の種類に応じて、オブジェクトストアの署名付きURL（直接配布）か
//! CDN署名付きURLのどちらかを発行する。
//!
//! ## 発行フロー
//! - `Object`: 既定バケットのキーに対する署名付きURL
//! - `Cdn`: ポリシー構築 → 署名鍵取得 → 署名
//! - `Kit`: レコード解決 → ファイル名または所在の導出 → 上記いずれか
//!
//! 発行は呼び出しごとに独立しており、可変な共有状態を持たない。
//! ストアへの呼び出しはすべてタイムアウト付きで、再試行はしない。
//! いずれかの段階が失敗した場合はURLを返さない。

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_crypto::{CdnPolicy, PolicyConditions, SignedUrl};
use courier_types::{Delivery, UpgradeRecord};
use url::Url;

use crate::error::GatewayError;
use crate::records::{self, ObjectLocator, RecordStore};
use crate::secrets::{self, SecretStore};
use crate::storage::{self, ObjectStore, PresignedUrl};

/// 発行の設定。起動時に確定し、以後変更しない。
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    /// 直接配布の既定バケット
    pub bucket: String,
    /// CDNのベースURL
    pub cdn_base_url: Url,
    /// CDNに登録された公開鍵の識別子
    pub key_pair_id: String,
    /// 署名鍵のシークレット名
    pub signing_secret_name: String,
    /// 署名鍵のバージョンステージ
    pub signing_secret_stage: String,
    /// 発行するURLの有効期間
    pub token_ttl: chrono::Duration,
    /// ストア呼び出し1回あたりのタイムアウト
    pub store_timeout: std::time::Duration,
}

/// 発行要求。
#[derive(Debug, Clone)]
pub enum AccessRequest {
    /// 既定バケットのオブジェクトを直接配布する
    Object { key: String },
    /// CDN配下のリソースを配布する。`conditions` があればカスタムポリシー
    Cdn {
        resource_path: String,
        conditions: Option<PolicyConditions>,
    },
    /// アップグレードキットを配布する。`version` を省略すると最新版
    Kit {
        platform: String,
        version: Option<String>,
        delivery: Delivery,
    },
}

/// 発行したURL。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuedUrl {
    Presigned(PresignedUrl),
    Signed(SignedUrl),
}

impl IssuedUrl {
    pub fn url(&self) -> &str {
        match self {
            IssuedUrl::Presigned(p) => &p.url,
            IssuedUrl::Signed(s) => &s.url,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            IssuedUrl::Presigned(p) => p.expires_at,
            IssuedUrl::Signed(s) => s.expires_at,
        }
    }
}

/// 発行結果。キットの場合は解決したレコードを伴う。
#[derive(Debug, Clone)]
pub struct Issuance {
    pub token: IssuedUrl,
    pub record: Option<UpgradeRecord>,
}

impl Issuance {
    pub fn url(&self) -> &str {
        self.token.url()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.token.expires_at()
    }
}

impl From<IssuedUrl> for Issuance {
    fn from(token: IssuedUrl) -> Self {
        Self {
            token,
            record: None,
        }
    }
}

/// アクセストークン発行器。
pub struct AccessTokenIssuer {
    objects: Arc<dyn ObjectStore>,
    secrets: Arc<dyn SecretStore>,
    records: Arc<dyn RecordStore>,
    settings: IssuerSettings,
}

impl AccessTokenIssuer {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        secrets: Arc<dyn SecretStore>,
        records: Arc<dyn RecordStore>,
        settings: IssuerSettings,
    ) -> Self {
        Self {
            objects,
            secrets,
            records,
            settings,
        }
    }

    /// 要求に応じたURLを発行する。
    pub async fn issue(&self, request: AccessRequest) -> Result<Issuance, GatewayError> {
        match request {
            AccessRequest::Object { key } => self
                .issue_direct(&self.settings.bucket, &key)
                .await
                .map(|p| IssuedUrl::Presigned(p).into()),
            AccessRequest::Cdn {
                resource_path,
                conditions,
            } => self
                .issue_cdn(&resource_path, conditions)
                .await
                .map(|s| IssuedUrl::Signed(s).into()),
            AccessRequest::Kit {
                platform,
                version,
                delivery,
            } => {
                let (record, token) = self
                    .issue_kit(&platform, version.as_deref(), delivery)
                    .await?;
                Ok(Issuance {
                    token,
                    record: Some(record),
                })
            }
        }
    }

    /// キットのレコードを解決し、配布方式に応じたURLを発行する。
    async fn issue_kit(
        &self,
        platform: &str,
        version: Option<&str>,
        delivery: Delivery,
    ) -> Result<(UpgradeRecord, IssuedUrl), GatewayError> {
        let record = match version {
            Some(version) => {
                self.bounded(
                    "レコードストア",
                    GatewayError::StoreUnavailable,
                    records::resolve(self.records.as_ref(), platform, version),
                )
                .await?
            }
            None => {
                self.bounded(
                    "レコードストア",
                    GatewayError::StoreUnavailable,
                    records::resolve_latest(self.records.as_ref(), platform),
                )
                .await?
            }
        };
        let locator = ObjectLocator::parse(&record.object_path)?;

        tracing::info!(
            platform = %record.platform,
            version = %record.version,
            file_name = %locator.file_name,
            ?delivery,
            "キットのレコードを解決"
        );

        let token = match delivery {
            Delivery::Cdn => IssuedUrl::Signed(self.issue_cdn(&locator.file_name, None).await?),
            Delivery::Direct => {
                let bucket = locator.bucket.as_deref().unwrap_or(&self.settings.bucket);
                IssuedUrl::Presigned(self.issue_direct(bucket, &locator.key).await?)
            }
        };
        Ok((record, token))
    }

    /// 既定バケットのプレフィックス配下の全オブジェクトに署名付きURLを発行する。
    ///
    /// 1件でも失敗した場合は全体を失敗とする。
    pub async fn issue_prefix(&self, prefix: &str) -> Result<Vec<PresignedUrl>, GatewayError> {
        let bucket = &self.settings.bucket;
        let keys = self
            .bounded(
                "オブジェクトストア",
                GatewayError::StoreUnavailable,
                self.objects.list_keys(bucket, prefix),
            )
            .await?;

        let mut issued = Vec::with_capacity(keys.len());
        for key in &keys {
            issued.push(self.issue_direct(bucket, key).await?);
        }
        tracing::info!(bucket = %bucket, prefix = %prefix, count = issued.len(), "署名付きURLを一括発行");
        Ok(issued)
    }

    /// オブジェクトストアの署名付きURLを発行する。
    pub async fn issue_direct(&self, bucket: &str, key: &str) -> Result<PresignedUrl, GatewayError> {
        let expires_at = Utc::now() + self.settings.token_ttl;
        let presigned = self
            .bounded(
                "オブジェクトストア",
                GatewayError::StoreUnavailable,
                storage::presign(self.objects.as_ref(), bucket, key, expires_at),
            )
            .await?;

        tracing::info!(
            bucket = %presigned.bucket,
            key = %presigned.key,
            expires_at = %presigned.expires_at.to_rfc3339(),
            "署名付きURLを発行"
        );
        Ok(presigned)
    }

    /// CDN署名付きURLを発行する。
    ///
    /// 署名鍵は発行ごとに取得し、署名後ただちに破棄する。
    pub async fn issue_cdn(
        &self,
        resource_path: &str,
        conditions: Option<PolicyConditions>,
    ) -> Result<SignedUrl, GatewayError> {
        let resource_url = self.resource_url(resource_path)?;
        let now = Utc::now();
        let policy = CdnPolicy::build_at(
            resource_url.as_str(),
            now + self.settings.token_ttl,
            conditions,
            now,
        )?;

        let private_key = self
            .bounded(
                "シークレットストア",
                GatewayError::SecretUnavailable,
                secrets::fetch_signing_key(
                    self.secrets.as_ref(),
                    &self.settings.signing_secret_name,
                    Some(&self.settings.signing_secret_stage),
                ),
            )
            .await?;
        let signed = courier_crypto::sign_url(&policy, &self.settings.key_pair_id, private_key.expose());
        drop(private_key);
        let signed = signed?;

        tracing::info!(
            resource = %signed.resource_url,
            key_pair_id = %signed.key_pair_id,
            canned = policy.is_canned(),
            expires_at = %signed.expires_at.to_rfc3339(),
            "CDN署名付きURLを発行"
        );
        Ok(signed)
    }

    /// リソースパスをCDNのベースURL配下の絶対URLにする。
    fn resource_url(&self, resource_path: &str) -> Result<Url, GatewayError> {
        let path = resource_path.trim().trim_start_matches('/');
        if path.is_empty() {
            return Err(GatewayError::BadRequest("リソースパスが空です".to_string()));
        }

        let mut base = self.settings.cdn_base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        let url = base
            .join(path)
            .map_err(|e| GatewayError::BadRequest(format!("リソースパス {path} が不正です: {e}")))?;
        if !url.as_str().starts_with(base.as_str()) {
            return Err(GatewayError::BadRequest(format!(
                "リソースパス {path} がCDNのベースURL外を指しています"
            )));
        }
        Ok(url)
    }

    /// ストア呼び出しをタイムアウト付きで実行する。
    async fn bounded<T>(
        &self,
        store: &str,
        on_timeout: fn(String) -> GatewayError,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        let timeout = self.settings.store_timeout;
        tokio::time::timeout(timeout, call).await.map_err(|_| {
            tracing::warn!(store = %store, timeout_ms = timeout.as_millis() as u64, "ストア呼び出しがタイムアウト");
            on_timeout(format!("{store} が {}ms 以内に応答しません", timeout.as_millis()))
        })?
    }
}
