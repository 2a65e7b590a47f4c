//! テスト用のモックストアと共通ヘルパー。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{TimeZone, Utc};
use courier_crypto::{RsaPrivateKey, RsaPublicKey};
use courier_types::UpgradeRecord;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};

use crate::config::{GatewayState, DEFAULT_PLATFORM};
use crate::error::GatewayError;
use crate::issuer::{AccessTokenIssuer, IssuerSettings};
use crate::records::MemoryRecordStore;
use crate::secrets::{MemorySecretStore, SecretStore, SecretValue, CURRENT_STAGE};
use crate::storage::ObjectStore;

pub const TEST_BUCKET: &str = "agent-kits";
pub const TEST_CDN_BASE: &str = "https://cdn.example.com/";
pub const TEST_KEY_PAIR_ID: &str = "KTESTKEYPAIR";
pub const TEST_SECRET_NAME: &str = "courier/cdn-signing-key";

/// テスト用のモックObjectStore。
/// S3への接続なしで署名付きURLのダミーを返す。
pub struct MockObjectStore {
    keys: Vec<String>,
    presign_calls: AtomicUsize,
    unavailable: bool,
}

impl MockObjectStore {
    pub fn new(keys: Vec<&str>) -> Self {
        Self {
            keys: keys.into_iter().map(str::to_string).collect(),
            presign_calls: AtomicUsize::new(0),
            unavailable: false,
        }
    }

    /// すべての操作が失敗するストア。
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(vec![])
        }
    }

    pub fn presign_calls(&self) -> usize {
        self.presign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockObjectStore {
    async fn list_keys(&self, _bucket: &str, prefix: &str) -> Result<Vec<String>, GatewayError> {
        if self.unavailable {
            return Err(GatewayError::StoreUnavailable("mock".to_string()));
        }
        Ok(self
            .keys
            .iter()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: u32,
    ) -> Result<String, GatewayError> {
        if self.unavailable {
            return Err(GatewayError::StoreUnavailable("mock".to_string()));
        }
        self.presign_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://{bucket}.s3.mock/{key}?X-Amz-Expires={expiry_secs}&X-Amz-Signature=mock"
        ))
    }
}

/// 呼び出し回数を数え、任意で応答を遅延させるシークレットストア。
pub struct CountingSecretStore {
    inner: MemorySecretStore,
    calls: AtomicUsize,
    delay: Option<std::time::Duration>,
}

impl CountingSecretStore {
    pub fn new(inner: MemorySecretStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SecretStore for CountingSecretStore {
    async fn get_secret(&self, name: &str, stage: &str) -> Result<SecretValue, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.get_secret(name, stage).await
    }
}

/// テスト用RSA鍵ペア（PKCS#8 PEMと公開鍵）。プロセス内で1回だけ生成する。
pub fn test_key_pair() -> &'static (String, RsaPublicKey) {
    static KEY: OnceLock<(String, RsaPublicKey)> = OnceLock::new();
    KEY.get_or_init(|| {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        (pem, private_key.to_public_key())
    })
}

pub fn test_settings() -> IssuerSettings {
    IssuerSettings {
        bucket: TEST_BUCKET.to_string(),
        cdn_base_url: url::Url::parse(TEST_CDN_BASE).unwrap(),
        key_pair_id: TEST_KEY_PAIR_ID.to_string(),
        signing_secret_name: TEST_SECRET_NAME.to_string(),
        signing_secret_stage: CURRENT_STAGE.to_string(),
        token_ttl: chrono::Duration::hours(2),
        store_timeout: std::time::Duration::from_secs(1),
    }
}

pub fn test_record(platform: &str, version: &str, object_path: &str) -> UpgradeRecord {
    UpgradeRecord {
        platform: platform.to_string(),
        version: version.to_string(),
        id: format!("{platform}-{version}"),
        object_path: object_path.to_string(),
        sha256: "ab".repeat(32),
        release_date: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
    }
}

/// テスト用のIssuerと、その背後のモック一式。
pub struct TestIssuer {
    pub issuer: AccessTokenIssuer,
    pub public_key: RsaPublicKey,
    pub objects: Arc<MockObjectStore>,
    pub secrets: Arc<CountingSecretStore>,
}

pub fn test_issuer(records: Vec<UpgradeRecord>) -> TestIssuer {
    test_issuer_with(
        records,
        MockObjectStore::new(vec![]),
        CountingSecretStore::new(signing_secrets()),
        test_settings(),
    )
}

pub fn test_issuer_with(
    records: Vec<UpgradeRecord>,
    objects: MockObjectStore,
    secrets: CountingSecretStore,
    settings: IssuerSettings,
) -> TestIssuer {
    let objects = Arc::new(objects);
    let secrets = Arc::new(secrets);
    let issuer = AccessTokenIssuer::new(
        objects.clone(),
        secrets.clone(),
        Arc::new(MemoryRecordStore::new(records)),
        settings,
    );
    TestIssuer {
        issuer,
        public_key: test_key_pair().1.clone(),
        objects,
        secrets,
    }
}

/// テスト用の署名鍵を現行ステージに登録したシークレットストア。
pub fn signing_secrets() -> MemorySecretStore {
    MemorySecretStore::new().with_secret(TEST_SECRET_NAME, CURRENT_STAGE, test_key_pair().0.clone())
}

/// ハンドラ用のGatewayStateを構築する。
pub fn test_state(records: Vec<UpgradeRecord>, object_keys: Vec<&str>) -> Arc<GatewayState> {
    let t = test_issuer_with(
        records,
        MockObjectStore::new(object_keys),
        CountingSecretStore::new(signing_secrets()),
        test_settings(),
    );
    Arc::new(GatewayState {
        issuer: t.issuer,
        default_platform: DEFAULT_PLATFORM.to_string(),
    })
}
