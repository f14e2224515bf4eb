//! 시크릿 값 암호화/복호화 (Crypto Codec)
//!
//! 레코드 포맷 (format_version = 1):
//! - nonce: 24 bytes (XChaCha20-Poly1305), base64
//! - encrypted_value: AEAD 결과 (= 암호문 + 16 bytes 태그), base64
//!
//! 마스터키는 프로세스 시작 시 1회 로드되며 이후 읽기 전용입니다.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// 마스터키 길이 (256-bit)
pub const MASTER_KEY_LEN: usize = 32;

/// Nonce 길이 (XChaCha20-Poly1305용 24 bytes)
pub const NONCE_LEN: usize = 24;

/// Codec 오류
///
/// 메시지에 키 material이나 평문이 절대 포함되지 않아야 합니다.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Master key is not valid base64")]
    InvalidKeyEncoding,

    #[error("Master key must be {expected} bytes, got {found}")]
    InvalidKeyLength { expected: usize, found: usize },

    #[error("Invalid {0} encoding")]
    InvalidEncoding(&'static str),

    #[error("Nonce must be {expected} bytes, got {found}")]
    InvalidNonce { expected: usize, found: usize },

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Decrypted secret is not valid UTF-8")]
    InvalidUtf8,
}

/// Zeroize가 적용된 마스터키 래퍼
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; MASTER_KEY_LEN],
}

impl MasterKey {
    /// base64 문자열에서 마스터키 로드
    ///
    /// 길이가 정확히 32 bytes가 아니면 거부합니다 (잘린 키로 동작하지 않음).
    pub fn from_base64(encoded: &str) -> Result<Self, CodecError> {
        let mut decoded = BASE64
            .decode(encoded.trim())
            .map_err(|_| CodecError::InvalidKeyEncoding)?;

        if decoded.len() != MASTER_KEY_LEN {
            let found = decoded.len();
            decoded.zeroize();
            return Err(CodecError::InvalidKeyLength {
                expected: MASTER_KEY_LEN,
                found,
            });
        }

        let mut bytes = [0u8; MASTER_KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();

        Ok(Self { bytes })
    }

    /// 마스터키 생성 (CSPRNG)
    pub fn generate() -> Self {
        let mut bytes = [0u8; MASTER_KEY_LEN];
        rand::thread_rng().fill(&mut bytes);
        Self { bytes }
    }

    /// `SECRETS_ENCRYPTION_KEY`에 넣을 수 있는 base64 표현
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.bytes)
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// 암호화된 시크릿 (ciphertext + nonce, 둘 다 base64)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub ciphertext: String,
    pub nonce: String,
}

/// 시크릿 값 암호화기
///
/// 모든 요청이 같은 인스턴스를 `Arc`로 공유합니다. 내부 상태는 변경되지 않습니다.
#[derive(Debug)]
pub struct SecretCipher {
    key: MasterKey,
}

impl SecretCipher {
    pub fn new(key: MasterKey) -> Self {
        Self { key }
    }

    /// 평문을 암호화
    ///
    /// 호출마다 새 랜덤 nonce를 생성합니다. 같은 키로 nonce를 재사용하면 안 됩니다.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, CodecError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce);

        let cipher = XChaCha20Poly1305::new((&self.key.bytes).into());

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| CodecError::EncryptionFailed)?;

        Ok(EncryptedSecret {
            ciphertext: BASE64.encode(ciphertext),
            nonce: BASE64.encode(nonce),
        })
    }

    /// 암호문을 복호화
    ///
    /// 변조된 데이터, 잘못된 nonce, 다른 키는 모두 `DecryptionFailed`로 실패합니다.
    pub fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, CodecError> {
        let nonce = BASE64
            .decode(&secret.nonce)
            .map_err(|_| CodecError::InvalidEncoding("nonce"))?;
        if nonce.len() != NONCE_LEN {
            return Err(CodecError::InvalidNonce {
                expected: NONCE_LEN,
                found: nonce.len(),
            });
        }

        let ciphertext = BASE64
            .decode(&secret.ciphertext)
            .map_err(|_| CodecError::InvalidEncoding("ciphertext"))?;

        let cipher = XChaCha20Poly1305::new((&self.key.bytes).into());

        let plaintext = cipher
            .decrypt(XNonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|_| CodecError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|e| {
            // 평문 메모리 지우기
            e.into_bytes().zeroize();
            CodecError::InvalidUtf8
        })
    }
}
