//! # アップグレードキットのレコード解決
//!
//! レコードストアからプラットフォームごとのキットのレコードを引き、
//! 実体オブジェクトの所在（バケット・キー・ファイル名）を導出する。
//!
//! ## 実装
//! - `DynamoRecordStore`: DynamoDBテーブル（本番用）
//! - `MemoryRecordStore`: メモリ上のレコード（開発・テスト用）

pub mod dynamodb;
pub mod memory;

pub use dynamodb::DynamoRecordStore;
pub use memory::MemoryRecordStore;

use courier_types::UpgradeRecord;
use percent_encoding::percent_decode_str;

use crate::error::GatewayError;

/// レコードストアの抽象インターフェース。読み取り専用。
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// `(platform, version)` でレコードを1件取得する。
    async fn load(
        &self,
        platform: &str,
        version: &str,
    ) -> Result<Option<UpgradeRecord>, GatewayError>;

    /// プラットフォームの全レコードを取得する（順不同）。
    async fn query_platform(&self, platform: &str) -> Result<Vec<UpgradeRecord>, GatewayError>;
}

/// プラットフォームの最新レコードを解決する。
///
/// バージョンが最大のレコードを選び、同順位ならリリース日時が新しい方を選ぶ。
pub async fn resolve_latest(
    store: &dyn RecordStore,
    platform: &str,
) -> Result<UpgradeRecord, GatewayError> {
    let records = store.query_platform(platform).await?;
    records
        .into_iter()
        .filter(|r| r.platform == platform)
        .reduce(|latest, r| if r.is_newer_than(&latest) { r } else { latest })
        .ok_or_else(|| {
            GatewayError::RecordNotFound(format!("プラットフォーム {platform} のキットがありません"))
        })
}

/// バージョンを指定してレコードを解決する。
pub async fn resolve(
    store: &dyn RecordStore,
    platform: &str,
    version: &str,
) -> Result<UpgradeRecord, GatewayError> {
    store.load(platform, version).await?.ok_or_else(|| {
        GatewayError::RecordNotFound(format!("{platform} {version} のキットがありません"))
    })
}

/// オブジェクトパスから導出した実体オブジェクトの所在。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocator {
    /// `s3://` URIのホスト部。それ以外のURIでは `None`（既定バケットを使う）
    pub bucket: Option<String>,
    /// バケット内のキー
    pub key: String,
    /// 配布用のファイル名
    pub file_name: String,
}

impl ObjectLocator {
    /// `objectPath` を解析する。
    ///
    /// 最終パスセグメントがファイル名となる。アップロード時に付与される
    /// `<数字>-` 形式のタイムスタンプ接頭辞は取り除く。
    /// キーとファイル名はパーセントデコード済みの値で、URL化する側で改めてエンコードする。
    pub fn parse(object_path: &str) -> Result<Self, GatewayError> {
        let url = url::Url::parse(object_path.trim()).map_err(|e| {
            GatewayError::MalformedObjectPath(format!("{object_path}: URIではありません ({e})"))
        })?;

        let segments = url
            .path_segments()
            .map(|segments| {
                segments
                    .map(|segment| {
                        percent_decode_str(segment).decode_utf8().map_err(|e| {
                            GatewayError::MalformedObjectPath(format!(
                                "{object_path}: パスセグメントがUTF-8ではありません ({e})"
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();
        let last = segments.last().map(|s| &**s).unwrap_or_default();
        if last.is_empty() {
            return Err(GatewayError::MalformedObjectPath(format!(
                "{object_path}: パスセグメントがありません"
            )));
        }

        let bucket = match url.scheme() {
            "s3" => url.host_str().filter(|h| !h.is_empty()).map(str::to_string),
            _ => None,
        };

        Ok(Self {
            bucket,
            key: segments.join("/"),
            file_name: strip_upload_prefix(last).to_string(),
        })
    }
}

/// `hhmmss-kit.exe` → `kit.exe`
fn strip_upload_prefix(segment: &str) -> &str {
    match segment.split_once('-') {
        Some((stamp, rest))
            if !stamp.is_empty() && !rest.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit()) =>
        {
            rest
        }
        _ => segment,
    }
}
