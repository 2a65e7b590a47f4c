//! # Gateway エラー型
//!
//! URL発行の各段階が返すエラー種別。呼び出し側が再試行の可否を
//! 判断できるよう、失敗の種類ごとに区別する。

use axum::http::StatusCode;
use courier_crypto::CryptoError;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// シークレットストアから署名鍵を取得できない（存在しない・到達不能・タイムアウト）
    #[error("シークレットを取得できません: {0}")]
    SecretUnavailable(String),
    /// 有効期限が発行時刻より後でない、または上限を超えている
    #[error("有効期限が不正です: {0}")]
    InvalidExpiry(String),
    /// 秘密鍵の読み込みまたは署名に失敗
    #[error("署名に失敗しました: {0}")]
    SigningError(String),
    /// バケットまたはキーが空
    #[error("オブジェクトを特定できません: {0}")]
    ObjectNotAddressable(String),
    /// 該当するレコードが存在しない
    #[error("レコードが見つかりません: {0}")]
    RecordNotFound(String),
    /// レコードのオブジェクトパスからファイル名を導出できない
    #[error("オブジェクトパスが不正です: {0}")]
    MalformedObjectPath(String),
    /// オブジェクトストアまたはレコードストアの操作に失敗
    #[error("ストア操作に失敗: {0}")]
    StoreUnavailable(String),
    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl GatewayError {
    /// 同じ要求を再試行すれば成功しうる失敗かどうか。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::SecretUnavailable(_) | GatewayError::StoreUnavailable(_)
        )
    }
}

impl From<CryptoError> for GatewayError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidExpiry(msg) => GatewayError::InvalidExpiry(msg),
            CryptoError::InvalidPolicy(msg) => GatewayError::BadRequest(msg),
            CryptoError::SigningError(msg) => GatewayError::SigningError(msg),
            e @ (CryptoError::MalformedSignedUrl(_) | CryptoError::VerificationFailed(_)) => {
                GatewayError::Internal(e.to_string())
            }
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            GatewayError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BadRequest(_)
            | GatewayError::InvalidExpiry(_)
            | GatewayError::ObjectNotAddressable(_) => StatusCode::BAD_REQUEST,
            GatewayError::SecretUnavailable(_) | GatewayError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::SigningError(_)
            | GatewayError::MalformedObjectPath(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(
            error = %self,
            retryable = self.is_retryable(),
            "URL発行に失敗しました"
        );
        (status, self.to_string()).into_response()
    }
}
