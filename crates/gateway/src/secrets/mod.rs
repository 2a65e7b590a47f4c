//! # 署名鍵の取得
//!
//! CDN署名用の秘密鍵をシークレットストアから取得する。
//!
//! - 取得した値はURL発行1回分のスコープでのみ保持し、キャッシュしない
//!   （鍵ローテーション後に古い鍵を使い続けないため）
//! - 値をログに出力しない。`SecretValue` の `Debug` 表示は伏せ字になる
//! - この層では再試行しない
//!
//! AWS Secrets Manager実装は `aws` サブモジュールを参照。

pub mod aws;

pub use aws::AwsSecretStore;

use std::collections::HashMap;
use std::fmt;

use crate::error::GatewayError;

/// 現行バージョンを指すステージ名。
pub const CURRENT_STAGE: &str = "AWSCURRENT";

/// シークレットの値。
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 値を参照する。戻り値をログや永続化に渡さないこと。
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue([REDACTED])")
    }
}

/// シークレットストアの抽象インターフェース。
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    /// 名前とバージョンステージを指定してシークレットを取得する。
    ///
    /// 名前やステージが存在しない場合、ストアに到達できない場合は
    /// `SecretUnavailable` を返す。
    async fn get_secret(&self, name: &str, stage: &str) -> Result<SecretValue, GatewayError>;
}

/// CDN署名用の秘密鍵（PEM）を取得する。
///
/// `stage` を省略すると現行ステージを使う。シークレットはPEMそのもの、
/// または `private_key` フィールドを持つJSONオブジェクトのどちらでもよい。
pub async fn fetch_signing_key(
    store: &dyn SecretStore,
    name: &str,
    stage: Option<&str>,
) -> Result<SecretValue, GatewayError> {
    if name.trim().is_empty() {
        return Err(GatewayError::SecretUnavailable(
            "シークレット名が空です".to_string(),
        ));
    }
    let stage = stage.unwrap_or(CURRENT_STAGE);
    let value = store.get_secret(name, stage).await?;
    extract_private_key(name, value)
}

fn extract_private_key(name: &str, value: SecretValue) -> Result<SecretValue, GatewayError> {
    let raw = value.expose().trim();
    if raw.is_empty() {
        return Err(GatewayError::SecretUnavailable(format!(
            "{name}: 値が空です"
        )));
    }
    if !raw.starts_with('{') {
        return Ok(value);
    }

    // JSON形式の場合、内容はエラーメッセージに含めない
    let json: serde_json::Value = serde_json::from_str(raw).map_err(|_| {
        GatewayError::SecretUnavailable(format!("{name}: JSONとして読み込めません"))
    })?;
    json.get("private_key")
        .and_then(|v| v.as_str())
        .filter(|pem| !pem.trim().is_empty())
        .map(SecretValue::new)
        .ok_or_else(|| {
            GatewayError::SecretUnavailable(format!("{name}: private_keyフィールドがありません"))
        })
}

/// メモリ上のシークレットストア。
/// 開発環境（MOCK_MODE）とテスト用。
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: HashMap<(String, String), String>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// シークレットを登録する。
    pub fn with_secret(mut self, name: &str, stage: &str, value: impl Into<String>) -> Self {
        self.secrets
            .insert((name.to_string(), stage.to_string()), value.into());
        self
    }
}

#[async_trait::async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secret(&self, name: &str, stage: &str) -> Result<SecretValue, GatewayError> {
        self.secrets
            .get(&(name.to_string(), stage.to_string()))
            .map(|v| SecretValue::new(v.clone()))
            .ok_or_else(|| {
                GatewayError::SecretUnavailable(format!("{name} ({stage}) が存在しません"))
            })
    }
}
