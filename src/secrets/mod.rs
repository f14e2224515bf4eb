//! Secret 모듈
//!
//! - `codec`: 마스터키 + XChaCha20-Poly1305 암복호화
//! - `manager`: 사용자 범위로 제한된 store/retrieve/list/delete, 레거시 평문 마이그레이션

pub mod codec;
pub mod manager;

pub use codec::{EncryptedSecret, MasterKey, SecretCipher};
pub use manager::{SecretVault, VaultCommand, VaultResponse};
