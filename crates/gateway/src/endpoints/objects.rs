//! # GET /objects/presigned-url, GET /objects/presigned-urls
//!
//! 既定バケットのオブジェクトに対する署名付きURL発行。

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use courier_types::*;

use crate::config::GatewayState;
use crate::error::GatewayError;
use crate::issuer::AccessRequest;

/// GET /objects/presigned-url: オブジェクト1件の署名付きURL。
pub async fn handle_presigned_url(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ObjectUrlQuery>,
) -> Result<Json<IssuedUrlResponse>, GatewayError> {
    let issued = state
        .issuer
        .issue(AccessRequest::Object { key: query.key })
        .await?;

    Ok(Json(IssuedUrlResponse {
        url: issued.url().to_string(),
        expires_at: issued.expires_at().timestamp(),
    }))
}

/// GET /objects/presigned-urls: プレフィックス配下の全オブジェクトの署名付きURL。
pub async fn handle_presigned_urls(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ObjectPrefixQuery>,
) -> Result<Json<PresignedUrlListResponse>, GatewayError> {
    let issued = state.issuer.issue_prefix(&query.prefix).await?;

    Ok(Json(PresignedUrlListResponse {
        objects: issued
            .into_iter()
            .map(|p| PresignedObjectUrl {
                key: p.key,
                url: p.url,
                expires_at: p.expires_at.timestamp(),
            })
            .collect(),
    }))
}
