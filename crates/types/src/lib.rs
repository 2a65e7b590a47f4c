//! # Agent Kit Courier 共有型定義
//!
//! アップグレードキットのレコード、配布方式、HTTP APIのリクエスト/レスポンスを
//! Rust構造体として提供する。
//!
//! ## エンコーディング規則
//! - JSONのフィールド名はcamelCase
//! - 時刻はRFC 3339文字列（レコード）またはUNIXタイムスタンプ秒（URL有効期限）

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// アップグレードキットのレコード
// ---------------------------------------------------------------------------

/// アップグレードキットのバージョン付きメタデータ。
///
/// `(platform, version)` がレコードを一意に識別する。
/// ライフサイクルは外部のレコードストアが管理し、ここでは読み取りのみ行う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRecord {
    /// 対象プラットフォーム（パーティションキー、例: "Windows"）
    pub platform: String,
    /// キットのバージョン（ソートキー、例: "1.0.0"）
    pub version: String,
    /// レコード識別子（不透明）
    pub id: String,
    /// オブジェクトストア上の実体のURI（例: "s3://bucket/2024/05/01-kit.exe"）
    pub object_path: String,
    /// オブジェクト内容のSHA-256ダイジェスト（hex）
    pub sha256: String,
    /// リリース日時
    pub release_date: DateTime<Utc>,
}

impl UpgradeRecord {
    /// `other` より新しいレコードかどうか。
    ///
    /// バージョンを比較し、同順位の場合はリリース日時で決める。
    pub fn is_newer_than(&self, other: &UpgradeRecord) -> bool {
        match compare_versions(&self.version, &other.version) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.release_date > other.release_date,
        }
    }
}

/// ドット区切りのバージョン文字列を比較する。
///
/// 両方が数値のコンポーネントは数値として比較する（`1.10.0 > 1.9.0`）。
/// それ以外は文字列として比較する。欠けたコンポーネントは `0` とみなす。
/// 先頭の `v` と `+` 以降のビルドメタデータは無視する。
///
/// `-` 以降はプレリリース識別子とし、SemVerの優先順位に従う。
/// 本体が同じ場合、プレリリース付きのバージョンはリリース版より小さい
/// （`2.0.0-rc1 < 2.0.0`）。
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a_core, a_pre) = split_version(a);
    let (b_core, b_pre) = split_version(b);

    compare_core(a_core, b_core).then_with(|| match (a_pre, b_pre) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare_prerelease(x, y),
    })
}

/// `v1.2.3-rc.1+build` → (`1.2.3`, `Some("rc.1")`)
fn split_version(version: &str) -> (&str, Option<&str>) {
    let version = version
        .trim()
        .trim_start_matches(|c: char| c == 'v' || c == 'V');
    let version = version.split_once('+').map_or(version, |(core, _)| core);
    match version.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (version, None),
    }
}

fn compare_core(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let ord = compare_component(l.unwrap_or("0"), r.unwrap_or("0"));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_component(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// 数値識別子は英数字識別子より小さく、識別子が多い方が大きい。
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        let ord = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(l), Some(r)) => match (l.parse::<u64>(), r.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => l.cmp(r),
            },
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

// ---------------------------------------------------------------------------
// 配布方式
// ---------------------------------------------------------------------------

/// キットの配布方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// CDN経由の署名付きURL
    #[default]
    Cdn,
    /// オブジェクトストアへの直接の署名付きURL
    Direct,
}

// ---------------------------------------------------------------------------
// HTTP API リクエスト（クエリパラメータ）
// ---------------------------------------------------------------------------

/// GET /objects/presigned-url のクエリ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectUrlQuery {
    /// バケット内のオブジェクトキー
    pub key: String,
}

/// GET /objects/presigned-urls のクエリ。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectPrefixQuery {
    /// 列挙するキーのプレフィックス（省略時はバケット全体）
    #[serde(default)]
    pub prefix: String,
}

/// GET /cdn/signed-url のクエリ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnUrlQuery {
    /// CDN配下のファイル名（リソースパス）
    pub filename: String,
}

/// GET /api/v1/agent-upgrade/upgrades/latest のクエリ。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatestKitQuery {
    /// 対象プラットフォーム（省略時は "Windows"）
    #[serde(default)]
    pub platform: Option<String>,
    /// 配布方式（省略時はCDN）
    #[serde(default)]
    pub delivery: Option<Delivery>,
}

/// バージョン指定のキット取得クエリ。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KitDeliveryQuery {
    /// 配布方式（省略時はCDN）
    #[serde(default)]
    pub delivery: Option<Delivery>,
}

// ---------------------------------------------------------------------------
// HTTP API レスポンス
// ---------------------------------------------------------------------------

/// 発行したURLと有効期限。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedUrlResponse {
    /// 発行したURL
    pub url: String,
    /// URL有効期限（UNIXタイムスタンプ秒）
    pub expires_at: i64,
}

/// プレフィックス配下のオブジェクトに対する署名付きURL一覧。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlListResponse {
    /// オブジェクトごとのURL
    pub objects: Vec<PresignedObjectUrl>,
}

/// オブジェクト1件分の署名付きURL。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedObjectUrl {
    /// オブジェクトキー
    pub key: String,
    /// 署名付きURL
    pub url: String,
    /// URL有効期限（UNIXタイムスタンプ秒）
    pub expires_at: i64,
}

/// キットのダウンロードURLとレコード。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KitUrlResponse {
    /// ダウンロードURL
    pub url: String,
    /// URL有効期限（UNIXタイムスタンプ秒）
    pub expires_at: i64,
    /// 配布方式
    pub delivery: Delivery,
    /// 解決されたレコード
    pub record: UpgradeRecord,
}
