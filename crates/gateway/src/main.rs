//! # Agent Kit Courier Gateway
//!
//! 配布物（エージェントのアップグレードキット等）への時間制限付き
//! アクセスURLを発行するGateway。
//!
//! ## 役割
//! - オブジェクトストアの署名付きURL（直接配布）の発行
//! - CDN署名付きURLの発行（署名鍵はシークレットストアから発行ごとに取得）
//! - レコードストアからの最新アップグレードキットの解決
//!
//! エンドポイント一覧は `endpoints` を参照。

mod config;
mod endpoints;
mod error;
mod issuer;
mod records;
mod secrets;
mod storage;
#[cfg(test)]
mod test_helpers;

use std::sync::Arc;

use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

use crate::config::{GatewayConfig, GatewayState, DEFAULT_PLATFORM};
use crate::issuer::AccessTokenIssuer;
use crate::records::{DynamoRecordStore, MemoryRecordStore, RecordStore};
use crate::secrets::{AwsSecretStore, MemorySecretStore, SecretStore};
use crate::storage::S3ObjectStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env()?;
    let settings = config.issuer_settings()?;

    // オブジェクトストア（S3互換）
    let objects = Arc::new(S3ObjectStore::from_env()?);

    let (secrets, records): (Arc<dyn SecretStore>, Arc<dyn RecordStore>) = if config.mock_mode {
        tracing::warn!("MOCK_MODE: メモリ上のシークレット・レコードストアを使用します（開発環境用）");
        (
            Arc::new(mock_secret_store(&config)?),
            Arc::new(mock_record_store(&config)?),
        )
    } else {
        let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        (
            Arc::new(AwsSecretStore::from_conf(&aws)),
            Arc::new(DynamoRecordStore::from_conf(&aws, config.record_table.clone())),
        )
    };

    tracing::info!(
        bucket = %settings.bucket,
        cdn_base_url = %settings.cdn_base_url,
        key_pair_id = %settings.key_pair_id,
        signing_secret = %settings.signing_secret_name,
        token_ttl_secs = settings.token_ttl.num_seconds(),
        "URL発行の設定"
    );

    let state = Arc::new(GatewayState {
        issuer: AccessTokenIssuer::new(objects, secrets, records, settings),
        default_platform: DEFAULT_PLATFORM.to_string(),
    });

    let app = endpoints::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Gateway listening on {}", config.listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// 開発環境用: ランダムな署名鍵を生成してメモリ上のシークレットストアに登録する。
///
/// 公開鍵のみをログに出力する。CDN側にはこの公開鍵を登録して検証に使う。
fn mock_secret_store(config: &GatewayConfig) -> anyhow::Result<MemorySecretStore> {
    tracing::warn!("署名鍵をランダムに生成します（開発環境用）");
    let private_key = rsa::RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)?;
    let public_pem = private_key.to_public_key().to_public_key_pem(LineEnding::LF)?;
    tracing::info!(
        key_pair_id = %config.key_pair_id,
        public_key = %public_pem,
        "CDN署名用公開鍵"
    );

    let private_pem = private_key.to_pkcs8_pem(LineEnding::LF)?;
    Ok(MemorySecretStore::new().with_secret(
        &config.signing_secret_name,
        &config.signing_secret_stage,
        private_pem.as_str(),
    ))
}

/// 開発環境用: `KIT_RECORDS_FILE` からレコードを読み込む。未設定なら空。
fn mock_record_store(config: &GatewayConfig) -> anyhow::Result<MemoryRecordStore> {
    let store = match &config.records_file {
        Some(path) => MemoryRecordStore::from_json_file(path)?,
        None => MemoryRecordStore::new(vec![]),
    };
    tracing::info!(records = store.len(), "キットのレコードを読み込みました");
    Ok(store)
}
