//! # GET /cdn/signed-url
//!
//! CDN配下のファイルに対する署名付きURL発行（既定ポリシー）。

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use courier_types::*;

use crate::config::GatewayState;
use crate::error::GatewayError;
use crate::issuer::AccessRequest;

/// GET /cdn/signed-url: CDN署名付きURL。
pub async fn handle_cdn_signed_url(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<CdnUrlQuery>,
) -> Result<Json<IssuedUrlResponse>, GatewayError> {
    let issued = state
        .issuer
        .issue(AccessRequest::Cdn {
            resource_path: query.filename,
            conditions: None,
        })
        .await?;

    Ok(Json(IssuedUrlResponse {
        url: issued.url().to_string(),
        expires_at: issued.expires_at().timestamp(),
    }))
}
