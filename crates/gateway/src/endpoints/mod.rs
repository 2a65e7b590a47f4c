//! # Gatewayエンドポイント
//!
//! | メソッド・パス | 内容 |
//! |--------------|------|
//! | `GET /objects/presigned-url` | オブジェクト1件の署名付きURL |
//! | `GET /objects/presigned-urls` | プレフィックス配下の署名付きURL一覧 |
//! | `GET /cdn/signed-url` | CDN署名付きURL |
//! | `GET /api/v1/agent-upgrade/upgrades/latest` | 最新キットのURL |
//! | `GET /api/v1/agent-upgrade/upgrades/{platform}/{version}` | 指定バージョンのキットのURL |

pub mod cdn;
pub mod objects;
pub mod upgrades;

pub use cdn::handle_cdn_signed_url;
pub use objects::{handle_presigned_url, handle_presigned_urls};
pub use upgrades::{handle_latest_upgrade, handle_upgrade_version};

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::config::GatewayState;

/// 全エンドポイントのルーターを構築する。
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/objects/presigned-url", get(handle_presigned_url))
        .route("/objects/presigned-urls", get(handle_presigned_urls))
        .route("/cdn/signed-url", get(handle_cdn_signed_url))
        .route(
            "/api/v1/agent-upgrade/upgrades/latest",
            get(handle_latest_upgrade),
        )
        .route(
            "/api/v1/agent-upgrade/upgrades/{platform}/{version}",
            get(handle_upgrade_version),
        )
        .with_state(state)
}
