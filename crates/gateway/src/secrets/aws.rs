//! # AWS Secrets Manager シークレットストア
//!
//! `GetSecretValue` を `SecretId` と `VersionStage` を指定して呼び出す。
//! 再試行はSDKクライアントの設定に委ねる。

use aws_sdk_secretsmanager::error::DisplayErrorContext;

use super::{SecretStore, SecretValue};
use crate::error::GatewayError;

/// AWS Secrets Managerによるシークレットストア実装。
pub struct AwsSecretStore {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretStore {
    pub fn new(client: aws_sdk_secretsmanager::Client) -> Self {
        Self { client }
    }

    /// 共有のAWS設定からクライアントを構築する。
    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_secretsmanager::Client::new(config))
    }
}

#[async_trait::async_trait]
impl SecretStore for AwsSecretStore {
    async fn get_secret(&self, name: &str, stage: &str) -> Result<SecretValue, GatewayError> {
        let response = self
            .client
            .get_secret_value()
            .secret_id(name)
            .version_stage(stage)
            .send()
            .await
            .map_err(|e| {
                GatewayError::SecretUnavailable(format!(
                    "{name} ({stage}) の取得に失敗: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let value = response.secret_string().ok_or_else(|| {
            GatewayError::SecretUnavailable(format!("{name} ({stage}) に文字列値がありません"))
        })?;

        Ok(SecretValue::new(value))
    }
}
