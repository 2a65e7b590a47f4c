//! # メモリ上のレコードストア
//!
//! 開発環境（MOCK_MODE）とテスト用。構築後は変更しない。

use std::collections::BTreeMap;

use courier_types::UpgradeRecord;

use super::RecordStore;
use crate::error::GatewayError;

/// メモリ上のレコードストア。
///
/// `(platform, version)` が重複する場合は後から渡したレコードが残る。
pub struct MemoryRecordStore {
    records: BTreeMap<(String, String), UpgradeRecord>,
}

impl MemoryRecordStore {
    pub fn new(records: Vec<UpgradeRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| ((r.platform.clone(), r.version.clone()), r))
            .collect();
        Self { records }
    }

    /// JSON配列ファイルから読み込む。
    pub fn from_json_file(path: &str) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("レコードファイルの読み込みに失敗 ({path}): {e}"))?;
        let records: Vec<UpgradeRecord> = serde_json::from_str(&json)
            .map_err(|e| anyhow::anyhow!("レコードファイルのパースに失敗 ({path}): {e}"))?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load(
        &self,
        platform: &str,
        version: &str,
    ) -> Result<Option<UpgradeRecord>, GatewayError> {
        Ok(self
            .records
            .get(&(platform.to_string(), version.to_string()))
            .cloned())
    }

    async fn query_platform(&self, platform: &str) -> Result<Vec<UpgradeRecord>, GatewayError> {
        Ok(self
            .records
            .values()
            .filter(|r| r.platform == platform)
            .cloned()
            .collect())
    }
}
