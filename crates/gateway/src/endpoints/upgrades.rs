//! # GET /api/v1/agent-upgrade/upgrades/...
//!
//! アップグレードキットのダウンロードURL発行。
//! 配布方式の既定はCDN。

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use courier_types::*;

use crate::config::GatewayState;
use crate::error::GatewayError;
use crate::issuer::{AccessRequest, Issuance};

/// GET /api/v1/agent-upgrade/upgrades/latest: 最新キットのURL。
pub async fn handle_latest_upgrade(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<LatestKitQuery>,
) -> Result<Json<KitUrlResponse>, GatewayError> {
    let platform = query
        .platform
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| state.default_platform.clone());
    let delivery = query.delivery.unwrap_or_default();
    let issued = state
        .issuer
        .issue(AccessRequest::Kit {
            platform,
            version: None,
            delivery,
        })
        .await?;
    kit_response(issued, delivery).map(Json)
}

/// GET /api/v1/agent-upgrade/upgrades/{platform}/{version}: 指定バージョンのキットのURL。
pub async fn handle_upgrade_version(
    State(state): State<Arc<GatewayState>>,
    Path((platform, version)): Path<(String, String)>,
    Query(query): Query<KitDeliveryQuery>,
) -> Result<Json<KitUrlResponse>, GatewayError> {
    let delivery = query.delivery.unwrap_or_default();
    let issued = state
        .issuer
        .issue(AccessRequest::Kit {
            platform,
            version: Some(version),
            delivery,
        })
        .await?;
    kit_response(issued, delivery).map(Json)
}

fn kit_response(issued: Issuance, delivery: Delivery) -> Result<KitUrlResponse, GatewayError> {
    let url = issued.url().to_string();
    let expires_at = issued.expires_at().timestamp();
    let record = issued
        .record
        .ok_or_else(|| GatewayError::Internal("キットのレコードが解決されていません".to_string()))?;

    Ok(KitUrlResponse {
        url,
        expires_at,
        delivery,
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn records() -> Vec<UpgradeRecord> {
        vec![
            test_record("Windows", "1.0.0", "s3://agent-kits/2024/04/01-kit.exe"),
            test_record("Windows", "2.0.0", "s3://agent-kits/2024/05/01-kit.exe"),
            test_record("Linux", "3.0.0", "s3://agent-kits/2024/05/02-kit.tar.gz"),
        ]
    }

    /// 既定（Windows・CDN）で最新キットが返ることを確認
    #[tokio::test]
    async fn test_latest_defaults() {
        let state = test_state(records(), vec![]);
        let Json(response) = handle_latest_upgrade(State(state), Query(LatestKitQuery::default()))
            .await
            .unwrap();

        assert_eq!(response.record.platform, "Windows");
        assert_eq!(response.record.version, "2.0.0");
        assert_eq!(response.delivery, Delivery::Cdn);
        assert!(response
            .url
            .starts_with("https://cdn.example.com/kit.exe?Expires="));
    }

    #[tokio::test]
    async fn test_latest_direct_for_platform() {
        let state = test_state(records(), vec![]);
        let Json(response) = handle_latest_upgrade(
            State(state),
            Query(LatestKitQuery {
                platform: Some("Linux".to_string()),
                delivery: Some(Delivery::Direct),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.record.version, "3.0.0");
        assert!(response
            .url
            .starts_with("https://agent-kits.s3.mock/2024/05/02-kit.tar.gz?"));
    }

    #[tokio::test]
    async fn test_pinned_version() {
        let state = test_state(records(), vec![]);
        let Json(response) = handle_upgrade_version(
            State(state.clone()),
            Path(("Windows".to_string(), "1.0.0".to_string())),
            Query(KitDeliveryQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(response.record.version, "1.0.0");

        let err = handle_upgrade_version(
            State(state),
            Path(("Windows".to_string(), "9.9.9".to_string())),
            Query(KitDeliveryQuery::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_platform_is_not_found() {
        let state = test_state(records(), vec![]);
        let err = handle_latest_upgrade(
            State(state),
            Query(LatestKitQuery {
                platform: Some("Solaris".to_string()),
                delivery: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GatewayError::RecordNotFound(_)));
    }
}
