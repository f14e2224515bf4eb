//! Secret Vault - 사용자별 시크릿 저장/조회/삭제
//!
//! - 쓰기: 평문 → `SecretCipher::encrypt` → upsert
//! - 읽기: 레코드 → `SecretCipher::decrypt` (레거시 평문이면 즉시 재암호화)
//! - 모든 연산은 인증된 `UserId`로 범위가 제한됨

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::db::Database;
use crate::error::VaultError;
use crate::models::{SecretMetadata, SecretType, StoredSecret, UserId};
use crate::secrets::codec::SecretCipher;

/// 지원하는 연산 (닫힌 집합)
pub enum VaultCommand {
    List,
    Store {
        secret_type: SecretType,
        secret_value: Zeroizing<String>,
    },
    Retrieve {
        secret_type: SecretType,
    },
    Delete {
        secret_type: SecretType,
    },
}

/// 연산 결과 (HTTP 응답 본문으로 그대로 직렬화됨)
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VaultResponse {
    List(Vec<SecretMetadata>),
    Success { success: bool },
    Secret { secret: Option<String> },
}

/// Secret Vault
///
/// DB 연결은 `Mutex`로 보호되고, 블로킹 작업은 `spawn_blocking`에서 수행됩니다.
#[derive(Clone)]
pub struct SecretVault {
    db: Arc<Mutex<Database>>,
    cipher: Arc<SecretCipher>,
}

impl SecretVault {
    pub fn new(db: Database, cipher: SecretCipher) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            cipher: Arc::new(cipher),
        }
    }

    /// 명령 실행
    pub async fn execute(
        &self,
        user_id: &UserId,
        command: VaultCommand,
    ) -> Result<VaultResponse, VaultError> {
        match command {
            VaultCommand::List => Ok(VaultResponse::List(self.list(user_id).await?)),
            VaultCommand::Store {
                secret_type,
                secret_value,
            } => {
                self.store(user_id, &secret_type, secret_value).await?;
                Ok(VaultResponse::Success { success: true })
            }
            VaultCommand::Retrieve { secret_type } => {
                let secret = self.retrieve(user_id, &secret_type).await?;
                Ok(VaultResponse::Secret {
                    secret: secret.map(|s| s.as_str().to_owned()),
                })
            }
            VaultCommand::Delete { secret_type } => {
                self.delete(user_id, &secret_type).await?;
                Ok(VaultResponse::Success { success: true })
            }
        }
    }

    /// 시크릿 메타데이터 목록 (값은 절대 포함하지 않음)
    pub async fn list(&self, user_id: &UserId) -> Result<Vec<SecretMetadata>, VaultError> {
        let user_id = user_id.clone();
        self.with_db(move |db, _| db.list_secrets(&user_id)).await
    }

    /// 시크릿 저장 (같은 종류가 있으면 덮어씀)
    pub async fn store(
        &self,
        user_id: &UserId,
        secret_type: &SecretType,
        secret_value: Zeroizing<String>,
    ) -> Result<(), VaultError> {
        let user = user_id.clone();
        let kind = secret_type.clone();
        self.with_db(move |db, cipher| {
            let encrypted = cipher.encrypt(&secret_value)?;
            db.upsert_secret(&user, &kind, &encrypted)
        })
        .await?;

        info!(user_id = %user_id, secret_type = %secret_type, "secret stored");
        Ok(())
    }

    /// 시크릿 조회 (없으면 None)
    ///
    /// 레거시 평문 레코드는 값을 그대로 반환하면서 암호화된 포맷으로 다시 씁니다.
    pub async fn retrieve(
        &self,
        user_id: &UserId,
        secret_type: &SecretType,
    ) -> Result<Option<Zeroizing<String>>, VaultError> {
        let user = user_id.clone();
        let kind = secret_type.clone();
        let (secret, migrated) = self
            .with_db(move |db, cipher| {
                let Some(record) = db.get_secret(&user, &kind)? else {
                    return Ok((None, false));
                };

                match record.value {
                    StoredSecret::Encrypted(encrypted) => {
                        let plaintext = cipher.decrypt(&encrypted)?;
                        Ok((Some(Zeroizing::new(plaintext)), false))
                    }
                    StoredSecret::LegacyPlaintext { value } => {
                        let value = Zeroizing::new(value);
                        let encrypted = cipher.encrypt(&value)?;
                        let migrated = db.migrate_legacy_secret(&user, &kind, &encrypted)?;
                        Ok((Some(value), migrated))
                    }
                }
            })
            .await?;

        if migrated {
            info!(user_id = %user_id, secret_type = %secret_type, "legacy plaintext secret re-encrypted");
        }
        debug!(user_id = %user_id, secret_type = %secret_type, found = secret.is_some(), "secret retrieved");
        Ok(secret)
    }

    /// 시크릿 삭제 (없는 시크릿 삭제도 성공)
    pub async fn delete(&self, user_id: &UserId, secret_type: &SecretType) -> Result<(), VaultError> {
        let user = user_id.clone();
        let kind = secret_type.clone();
        let deleted = self
            .with_db(move |db, _| db.delete_secret(&user, &kind))
            .await?;

        info!(user_id = %user_id, secret_type = %secret_type, deleted, "secret deleted");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn total_records(&self) -> Result<i64, VaultError> {
        self.with_db(|db, _| db.count_all()).await
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T, VaultError>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &SecretCipher) -> Result<T, VaultError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let cipher = Arc::clone(&self.cipher);
        tokio::task::spawn_blocking(move || {
            let db = db.lock().map_err(|_| VaultError::LockPoisoned)?;
            f(&*db, &*cipher)
        })
        .await?
    }
}
