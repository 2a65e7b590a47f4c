//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。

use anyhow::Context;

use crate::issuer::{AccessTokenIssuer, IssuerSettings};
use crate::records::dynamodb::DEFAULT_TABLE;
use crate::secrets::CURRENT_STAGE;
use crate::storage::MAX_PRESIGN_EXPIRY_SECS;

/// プラットフォーム未指定時の既定値。
pub const DEFAULT_PLATFORM: &str = "Windows";

const MOCK_CDN_BASE_URL: &str = "http://localhost:8080";
const MOCK_KEY_PAIR_ID: &str = "MOCKKEYPAIRID";
const MOCK_SECRET_NAME: &str = "courier/mock-signing-key";

/// Gatewayの共有状態。
pub struct GatewayState {
    /// URL発行器
    pub issuer: AccessTokenIssuer,
    /// プラットフォーム未指定時に使うプラットフォーム
    pub default_platform: String,
}

/// 環境変数から読み込んだGateway設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// 待ち受けアドレス
    pub listen_addr: String,
    /// 直接配布の既定バケット
    pub bucket: String,
    /// CDNのベースURL
    pub cdn_base_url: String,
    /// CDNの鍵ペアID
    pub key_pair_id: String,
    /// 署名鍵のシークレット名
    pub signing_secret_name: String,
    /// 署名鍵のバージョンステージ
    pub signing_secret_stage: String,
    /// キットのレコードテーブル名
    pub record_table: String,
    /// 発行するURLの有効期間（秒）
    pub token_ttl_secs: i64,
    /// ストア呼び出しのタイムアウト（秒）
    pub store_timeout_secs: u64,
    /// 開発用のメモリ上ストアを使う
    pub mock_mode: bool,
    /// MOCK_MODEで読み込むレコードのJSONファイル
    pub records_file: Option<String>,
}

impl GatewayConfig {
    /// 環境変数から読み込む。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の変数参照関数から読み込む。
    ///
    /// `MOCK_MODE=true` でない場合、CDN関連の3変数は必須。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mock_mode = var("MOCK_MODE").is_some_and(|v| v == "true");

        let required = |name: &str, mock_default: &str| -> anyhow::Result<String> {
            match var(name) {
                Some(v) => Ok(v),
                None if mock_mode => Ok(mock_default.to_string()),
                None => anyhow::bail!("{name} が設定されていません"),
            }
        };

        let token_ttl_secs: i64 = var("TOKEN_TTL_SECS")
            .unwrap_or_else(|| "7200".to_string())
            .parse()
            .context("TOKEN_TTL_SECS は整数である必要があります")?;
        if !(1..=MAX_PRESIGN_EXPIRY_SECS).contains(&token_ttl_secs) {
            anyhow::bail!(
                "TOKEN_TTL_SECS は1以上{MAX_PRESIGN_EXPIRY_SECS}以下である必要があります: {token_ttl_secs}"
            );
        }

        let store_timeout_secs: u64 = var("STORE_TIMEOUT_SECS")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .context("STORE_TIMEOUT_SECS は整数である必要があります")?;
        if store_timeout_secs == 0 {
            anyhow::bail!("STORE_TIMEOUT_SECS は1以上である必要があります");
        }

        Ok(Self {
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            bucket: var("KIT_BUCKET").unwrap_or_else(|| "agent-kits".to_string()),
            cdn_base_url: required("CDN_BASE_URL", MOCK_CDN_BASE_URL)?,
            key_pair_id: required("CDN_KEY_PAIR_ID", MOCK_KEY_PAIR_ID)?,
            signing_secret_name: required("CDN_SIGNING_SECRET_NAME", MOCK_SECRET_NAME)?,
            signing_secret_stage: var("CDN_SIGNING_SECRET_STAGE")
                .unwrap_or_else(|| CURRENT_STAGE.to_string()),
            record_table: var("KIT_RECORD_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            token_ttl_secs,
            store_timeout_secs,
            mock_mode,
            records_file: var("KIT_RECORDS_FILE"),
        })
    }

    /// 発行器の設定に変換する。
    pub fn issuer_settings(&self) -> anyhow::Result<IssuerSettings> {
        let cdn_base_url = url::Url::parse(&self.cdn_base_url)
            .with_context(|| format!("CDN_BASE_URL が不正です: {}", self.cdn_base_url))?;
        if cdn_base_url.cannot_be_a_base() {
            anyhow::bail!("CDN_BASE_URL はベースURLとして使えません: {}", self.cdn_base_url);
        }

        Ok(IssuerSettings {
            bucket: self.bucket.clone(),
            cdn_base_url,
            key_pair_id: self.key_pair_id.clone(),
            signing_secret_name: self.signing_secret_name.clone(),
            signing_secret_stage: self.signing_secret_stage.clone(),
            token_ttl: chrono::Duration::seconds(self.token_ttl_secs),
            store_timeout: std::time::Duration::from_secs(self.store_timeout_secs),
        })
    }
}
