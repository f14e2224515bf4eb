//! Secret Vault Data Models
//!
//! 저장소 레코드와 API 응답에 쓰이는 데이터 모델

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::secrets::codec::EncryptedSecret;

/// `secret_type` 최대 길이
pub const MAX_SECRET_TYPE_LEN: usize = 128;

/// 인증된 사용자 식별자 (identity provider가 발급한 opaque id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 시크릿 종류 (예: `openai_key`)
///
/// `(user_id, secret_type)` 쌍이 레코드의 유일 키입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretType(String);

impl SecretType {
    pub fn parse(raw: &str) -> Result<Self, VaultError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(VaultError::Validation(
                "secret_type must not be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_SECRET_TYPE_LEN {
            return Err(VaultError::Validation(format!(
                "secret_type must be at most {} characters",
                MAX_SECRET_TYPE_LEN
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SecretType {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SecretType> for String {
    fn from(value: SecretType) -> Self {
        value.0
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 레코드 포맷 버전 (`format_version` 컬럼)
///
/// nonce 유무로 레거시 여부를 추측하지 않고 이 값으로만 판별합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// 암호화 도입 이전의 평문 레코드
    LegacyPlaintext,
    /// XChaCha20-Poly1305 + 24-byte nonce
    XChaCha20Poly1305,
}

impl FormatVersion {
    pub fn as_i64(self) -> i64 {
        match self {
            FormatVersion::LegacyPlaintext => 0,
            FormatVersion::XChaCha20Poly1305 => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(FormatVersion::LegacyPlaintext),
            1 => Some(FormatVersion::XChaCha20Poly1305),
            _ => None,
        }
    }
}

/// 저장된 시크릿 값
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredSecret {
    Encrypted(EncryptedSecret),
    /// 조회 시 즉시 재암호화되어 `Encrypted`로 바뀜
    LegacyPlaintext { value: String },
}

/// 시크릿 레코드 전체
#[derive(Debug, Clone)]
pub struct SecretRecord {
    pub user_id: UserId,
    pub secret_type: SecretType,
    pub value: StoredSecret,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// list 응답 항목
///
/// 암호문/nonce 필드가 아예 없으므로 목록 조회로 시크릿 material이 노출될 수 없습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    pub secret_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
