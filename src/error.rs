//! Secret Vault Error Types
//!
//! 서비스 전역 에러 타입과 JSON 에러 응답 정의

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::secrets::codec::CodecError;

/// Secret Vault 에러
#[derive(Error, Debug)]
pub enum VaultError {
    #[error(transparent)]
    Unauthenticated(#[from] AuthError),

    #[error("{0}")]
    Validation(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request body is too large")]
    PayloadTooLarge,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CodecError),

    #[error("Corrupt secret record: {0}")]
    CorruptRecord(String),

    #[error("Failed to acquire database lock")]
    LockPoisoned,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// HTTP 응답용 직렬화 가능한 에러
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub success: bool,
    pub code: &'static str,
}

impl VaultError {
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::Unauthenticated(AuthError::ProviderUnavailable(_)) => "AUTH_PROVIDER_ERROR",
            VaultError::Unauthenticated(_) => "UNAUTHORIZED",
            VaultError::Validation(_) => "INVALID_REQUEST",
            VaultError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            VaultError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            VaultError::Database(_) => "DB_ERROR",
            VaultError::Io(_) => "IO_ERROR",
            VaultError::Crypto(_) => "CRYPTO_ERROR",
            VaultError::CorruptRecord(_) => "CORRUPT_RECORD",
            VaultError::LockPoisoned => "LOCK_ERROR",
            VaultError::Task(_) => "INTERNAL_ERROR",
            VaultError::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            VaultError::Unauthenticated(AuthError::ProviderUnavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            VaultError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            VaultError::Validation(_) => StatusCode::BAD_REQUEST,
            VaultError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            VaultError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 호출자에게 보여줄 메시지
    ///
    /// 암호/내부 오류는 일반 메시지로 대체합니다. 상세 내용은 서버 로그에만 남습니다.
    pub fn public_message(&self) -> String {
        match self {
            VaultError::Unauthenticated(AuthError::ProviderUnavailable(_)) => {
                "Identity provider unavailable".to_string()
            }
            VaultError::Unauthenticated(_) => "Unauthorized".to_string(),
            VaultError::Crypto(_) | VaultError::CorruptRecord(_) => {
                "Failed to decrypt secret".to_string()
            }
            VaultError::Task(_) | VaultError::LockPoisoned | VaultError::Io(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<&VaultError> for ErrorResponse {
    fn from(error: &VaultError) -> Self {
        ErrorResponse {
            error: error.public_message(),
            success: false,
            code: error.code(),
        }
    }
}

impl IntoResponse for VaultError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

/// 핸들러 결과 타입
pub type VaultResult<T> = Result<T, VaultError>;
