//! # CDNアクセスポリシー
//!
//! 1つのリソースURLと1つの有効期限を束縛するポリシー文書を構築する。
//! 署名はこの文書のバイト列に対して行われるため、同一入力からは常に
//! バイト単位で同一の文書を生成する（フィールド順固定・空白なし）。
//!
//! ```text
//! {"Statement":[{"Resource":"<url>","Condition":{"DateLessThan":{"AWS:EpochTime":<秒>}}}]}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CryptoError;

/// カスタムポリシーの追加条件。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyConditions {
    /// この時刻以降にのみ有効（DateGreaterThan）
    pub not_before: Option<DateTime<Utc>>,
    /// 許可する送信元IPアドレス範囲（CIDR表記、例: "192.0.2.0/24"）
    pub source_ip: Option<String>,
}

/// 構築済みのCDNアクセスポリシー。
///
/// 構築後は変更されない。`document()` が署名対象のバイト列となる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnPolicy {
    resource_url: String,
    expires_at: DateTime<Utc>,
    conditions: Option<PolicyConditions>,
    document: String,
}

impl CdnPolicy {
    /// 現在時刻を基準にポリシーを構築する。
    ///
    /// `conditions` が `None` なら既定ポリシー、`Some` ならカスタムポリシーとなる。
    pub fn build(
        resource_url: &str,
        expires_at: DateTime<Utc>,
        conditions: Option<PolicyConditions>,
    ) -> Result<Self, CryptoError> {
        Self::build_at(resource_url, expires_at, conditions, Utc::now())
    }

    /// 指定した時刻を発行時刻としてポリシーを構築する。
    ///
    /// 有効期限は秒単位に切り捨てられる。切り捨て後の有効期限が `now` より
    /// 後でない場合は `InvalidExpiry` を返す。
    pub fn build_at(
        resource_url: &str,
        expires_at: DateTime<Utc>,
        conditions: Option<PolicyConditions>,
        now: DateTime<Utc>,
    ) -> Result<Self, CryptoError> {
        if resource_url.trim().is_empty() {
            return Err(CryptoError::InvalidPolicy(
                "リソースURLが空です".to_string(),
            ));
        }

        let expires_at = truncate_to_seconds(expires_at)?;
        if expires_at.timestamp() <= now.timestamp() {
            return Err(CryptoError::InvalidExpiry(format!(
                "有効期限 {} が発行時刻 {} より後ではありません",
                expires_at.to_rfc3339(),
                now.to_rfc3339()
            )));
        }

        if let Some(cond) = &conditions {
            if let Some(not_before) = cond.not_before {
                if not_before >= expires_at {
                    return Err(CryptoError::InvalidExpiry(format!(
                        "開始時刻 {} が有効期限 {} 以降です",
                        not_before.to_rfc3339(),
                        expires_at.to_rfc3339()
                    )));
                }
            }
            if cond.source_ip.as_deref().is_some_and(|ip| ip.trim().is_empty()) {
                return Err(CryptoError::InvalidPolicy(
                    "送信元IPアドレス範囲が空です".to_string(),
                ));
            }
        }

        let document = render_document(resource_url, expires_at.timestamp(), conditions.as_ref())?;

        Ok(Self {
            resource_url: resource_url.to_string(),
            expires_at,
            conditions,
            document,
        })
    }

    /// 署名が認可するリソースURL
    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    /// 有効期限（秒単位）
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// カスタムポリシーの追加条件
    pub fn conditions(&self) -> Option<&PolicyConditions> {
        self.conditions.as_ref()
    }

    /// 正規化されたポリシー文書（署名対象）
    pub fn document(&self) -> &str {
        &self.document
    }

    /// 既定ポリシーかどうか。既定ポリシーは署名付きURLに文書を埋め込まない。
    pub fn is_canned(&self) -> bool {
        self.conditions.is_none()
    }
}

fn truncate_to_seconds(at: DateTime<Utc>) -> Result<DateTime<Utc>, CryptoError> {
    DateTime::from_timestamp(at.timestamp(), 0)
        .ok_or_else(|| CryptoError::InvalidExpiry(format!("範囲外の時刻: {at}")))
}

// ---------------------------------------------------------------------------
// ポリシー文書のJSON表現
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PolicyDocument {
    #[serde(rename = "Statement")]
    pub(crate) statement: Vec<PolicyStatement>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PolicyStatement {
    #[serde(rename = "Resource")]
    pub(crate) resource: String,
    #[serde(rename = "Condition")]
    pub(crate) condition: PolicyCondition,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PolicyCondition {
    #[serde(rename = "DateLessThan")]
    pub(crate) date_less_than: EpochTime,
    #[serde(
        rename = "DateGreaterThan",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) date_greater_than: Option<EpochTime>,
    #[serde(rename = "IpAddress", default, skip_serializing_if = "Option::is_none")]
    pub(crate) ip_address: Option<SourceIp>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EpochTime {
    #[serde(rename = "AWS:EpochTime")]
    pub(crate) epoch_time: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SourceIp {
    #[serde(rename = "AWS:SourceIp")]
    pub(crate) source_ip: String,
}

/// ポリシー文書を正規形で直列化する。
///
/// 署名検証側でも既定ポリシーの再構築に使う。
pub(crate) fn render_document(
    resource_url: &str,
    expires_epoch: i64,
    conditions: Option<&PolicyConditions>,
) -> Result<String, CryptoError> {
    let condition = PolicyCondition {
        date_less_than: EpochTime {
            epoch_time: expires_epoch,
        },
        date_greater_than: conditions
            .and_then(|c| c.not_before)
            .map(|t| EpochTime {
                epoch_time: t.timestamp(),
            }),
        ip_address: conditions
            .and_then(|c| c.source_ip.clone())
            .map(|source_ip| SourceIp { source_ip }),
    };
    let document = PolicyDocument {
        statement: vec![PolicyStatement {
            resource: resource_url.to_string(),
            condition,
        }],
    };
    serde_json::to_string(&document)
        .map_err(|e| CryptoError::InvalidPolicy(format!("ポリシーのシリアライズに失敗: {e}")))
}
