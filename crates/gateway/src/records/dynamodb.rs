//! # DynamoDB レコードストア
//!
//! パーティションキー `KitPlatform`、ソートキー `KitVersion` のテーブルから
//! キットのレコードを読み取る。テーブルの作成・スキーマ管理は行わない。

use std::collections::HashMap;

use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use courier_types::UpgradeRecord;

use super::RecordStore;
use crate::error::GatewayError;

/// 既定のテーブル名。
pub const DEFAULT_TABLE: &str = "AgentUpgradeTable";

const ATTR_PLATFORM: &str = "KitPlatform";
const ATTR_VERSION: &str = "KitVersion";
const ATTR_ID: &str = "Id";
const ATTR_OBJECT_PATH: &str = "S3ObjectPath";
const ATTR_SHA256: &str = "Sha256Hash";
const ATTR_RELEASE_DATE: &str = "ReleaseDate";

/// DynamoDBによるレコードストア実装。
pub struct DynamoRecordStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoRecordStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// 共有のAWS設定からクライアントを構築する。
    pub fn from_conf(config: &aws_config::SdkConfig, table_name: impl Into<String>) -> Self {
        Self::new(aws_sdk_dynamodb::Client::new(config), table_name)
    }
}

#[async_trait::async_trait]
impl RecordStore for DynamoRecordStore {
    async fn load(
        &self,
        platform: &str,
        version: &str,
    ) -> Result<Option<UpgradeRecord>, GatewayError> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(ATTR_PLATFORM, AttributeValue::S(platform.to_string()))
            .key(ATTR_VERSION, AttributeValue::S(version.to_string()))
            .send()
            .await
            .map_err(|e| {
                GatewayError::StoreUnavailable(format!(
                    "{} から {platform} {version} の取得に失敗: {}",
                    self.table_name,
                    DisplayErrorContext(&e)
                ))
            })?;

        response.item().map(record_from_item).transpose()
    }

    async fn query_platform(&self, platform: &str) -> Result<Vec<UpgradeRecord>, GatewayError> {
        let mut records = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let response = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#platform = :platform")
                .expression_attribute_names("#platform", ATTR_PLATFORM)
                .expression_attribute_values(":platform", AttributeValue::S(platform.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    GatewayError::StoreUnavailable(format!(
                        "{} の {platform} のクエリに失敗: {}",
                        self.table_name,
                        DisplayErrorContext(&e)
                    ))
                })?;

            for item in response.items() {
                records.push(record_from_item(item)?);
            }

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        tracing::debug!(platform = %platform, count = records.len(), "キットのレコードを取得");
        Ok(records)
    }
}

/// DynamoDBの項目をレコードに変換する。
fn record_from_item(item: &HashMap<String, AttributeValue>) -> Result<UpgradeRecord, GatewayError> {
    let release_date = string_attr(item, ATTR_RELEASE_DATE)?;
    let release_date = DateTime::parse_from_rfc3339(&release_date)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            GatewayError::Internal(format!("{ATTR_RELEASE_DATE} の形式が不正です ({release_date}): {e}"))
        })?;

    Ok(UpgradeRecord {
        platform: string_attr(item, ATTR_PLATFORM)?,
        version: string_attr(item, ATTR_VERSION)?,
        id: string_attr(item, ATTR_ID)?,
        object_path: string_attr(item, ATTR_OBJECT_PATH)?,
        sha256: string_attr(item, ATTR_SHA256)?,
        release_date,
    })
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Result<String, GatewayError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| GatewayError::Internal(format!("レコードに文字列属性 {name} がありません")))
}
