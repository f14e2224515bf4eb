//! Database Module
//!
//! SQLite 기반 시크릿 저장소. 모든 쿼리는 `user_id`로 필터링됩니다.

mod schema;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::VaultError;
use crate::models::{
    FormatVersion, SecretMetadata, SecretRecord, SecretType, StoredSecret, UserId,
};
use crate::secrets::codec::EncryptedSecret;

/// 데이터베이스 래퍼
pub struct Database {
    conn: Connection,
}

impl Database {
    /// 새 데이터베이스 연결 생성
    pub fn new(path: &Path) -> Result<Self, VaultError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// 메모리 DB (테스트/임시 실행용)
    pub fn open_in_memory() -> Result<Self, VaultError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// 데이터베이스 스키마 초기화
    pub fn initialize(&self) -> Result<(), VaultError> {
        self.conn.execute_batch(schema::CREATE_SCHEMA)?;
        Ok(())
    }

    /// 사용자의 시크릿 메타데이터 목록
    pub fn list_secrets(&self, user_id: &UserId) -> Result<Vec<SecretMetadata>, VaultError> {
        let mut stmt = self.conn.prepare(
            "SELECT secret_type, created_at, updated_at
             FROM user_secrets WHERE user_id = ?1 ORDER BY secret_type",
        )?;

        let iter = stmt.query_map([user_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in iter {
            let (secret_type, created_at, updated_at) = row?;
            out.push(SecretMetadata {
                secret_type,
                created_at: millis_to_datetime(created_at)?,
                updated_at: millis_to_datetime(updated_at)?,
            });
        }
        Ok(out)
    }

    /// 시크릿 레코드 조회 (없으면 None)
    pub fn get_secret(
        &self,
        user_id: &UserId,
        secret_type: &SecretType,
    ) -> Result<Option<SecretRecord>, VaultError> {
        let row: Option<(String, Option<String>, i64, i64, i64)> = self
            .conn
            .query_row(
                "SELECT encrypted_value, nonce, format_version, created_at, updated_at
                 FROM user_secrets WHERE user_id = ?1 AND secret_type = ?2",
                params![user_id.as_str(), secret_type.as_str()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((encrypted_value, nonce, format_version, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let value = match FormatVersion::from_i64(format_version) {
            Some(FormatVersion::LegacyPlaintext) => StoredSecret::LegacyPlaintext {
                value: encrypted_value,
            },
            Some(FormatVersion::XChaCha20Poly1305) => {
                let nonce = nonce.ok_or_else(|| {
                    VaultError::CorruptRecord(format!(
                        "encrypted secret '{}' has no nonce",
                        secret_type
                    ))
                })?;
                StoredSecret::Encrypted(EncryptedSecret {
                    ciphertext: encrypted_value,
                    nonce,
                })
            }
            None => {
                return Err(VaultError::CorruptRecord(format!(
                    "secret '{}' has unknown format_version {}",
                    secret_type, format_version
                )))
            }
        };

        Ok(Some(SecretRecord {
            user_id: user_id.clone(),
            secret_type: secret_type.clone(),
            value,
            created_at: millis_to_datetime(created_at)?,
            updated_at: millis_to_datetime(updated_at)?,
        }))
    }

    /// 시크릿 저장 (upsert)
    ///
    /// `(user_id, secret_type)` 충돌 시 암호문과 nonce를 한 번에 교체합니다.
    pub fn upsert_secret(
        &self,
        user_id: &UserId,
        secret_type: &SecretType,
        encrypted: &EncryptedSecret,
    ) -> Result<(), VaultError> {
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO user_secrets
                (id, user_id, secret_type, encrypted_value, nonce, format_version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (user_id, secret_type) DO UPDATE SET
                encrypted_value = excluded.encrypted_value,
                nonce = excluded.nonce,
                format_version = excluded.format_version,
                updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                user_id.as_str(),
                secret_type.as_str(),
                &encrypted.ciphertext,
                &encrypted.nonce,
                FormatVersion::XChaCha20Poly1305.as_i64(),
                now,
            ],
        )?;
        Ok(())
    }

    /// 레거시 평문 레코드를 암호화된 레코드로 교체
    ///
    /// 아직 레거시 상태일 때만 갱신합니다. 그 사이 새로 store된 값은 덮어쓰지 않습니다.
    pub fn migrate_legacy_secret(
        &self,
        user_id: &UserId,
        secret_type: &SecretType,
        encrypted: &EncryptedSecret,
    ) -> Result<bool, VaultError> {
        let updated = self.conn.execute(
            "UPDATE user_secrets
             SET encrypted_value = ?1, nonce = ?2, format_version = ?3, updated_at = ?4
             WHERE user_id = ?5 AND secret_type = ?6 AND format_version = ?7",
            params![
                &encrypted.ciphertext,
                &encrypted.nonce,
                FormatVersion::XChaCha20Poly1305.as_i64(),
                Utc::now().timestamp_millis(),
                user_id.as_str(),
                secret_type.as_str(),
                FormatVersion::LegacyPlaintext.as_i64(),
            ],
        )?;
        Ok(updated > 0)
    }

    /// 시크릿 삭제, 삭제된 행 수 반환 (0 또는 1)
    pub fn delete_secret(
        &self,
        user_id: &UserId,
        secret_type: &SecretType,
    ) -> Result<usize, VaultError> {
        let deleted = self.conn.execute(
            "DELETE FROM user_secrets WHERE user_id = ?1 AND secret_type = ?2",
            params![user_id.as_str(), secret_type.as_str()],
        )?;
        Ok(deleted)
    }

    /// 전체 레코드 수 (모든 사용자)
    #[cfg(test)]
    pub(crate) fn count_all(&self) -> Result<i64, VaultError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM user_secrets", [], |row| row.get(0))?;
        Ok(count)
    }

    /// 암호화 도입 이전 포맷의 레코드 삽입
    #[cfg(test)]
    pub(crate) fn insert_legacy_plaintext(
        &self,
        user_id: &UserId,
        secret_type: &SecretType,
        value: &str,
    ) -> Result<(), VaultError> {
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO user_secrets
                (id, user_id, secret_type, encrypted_value, nonce, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)",
            params![
                uuid::Uuid::new_v4().to_string(),
                user_id.as_str(),
                secret_type.as_str(),
                value,
                now,
            ],
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<(), VaultError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn raw_row(
        &self,
        user_id: &UserId,
        secret_type: &SecretType,
    ) -> Result<(String, Option<String>, i64), VaultError> {
        let row = self.conn.query_row(
            "SELECT encrypted_value, nonce, format_version
             FROM user_secrets WHERE user_id = ?1 AND secret_type = ?2",
            params![user_id.as_str(), secret_type.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(row)
    }
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, VaultError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| VaultError::CorruptRecord(format!("invalid timestamp {}", millis)))
}
