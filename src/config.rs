//! Service Configuration
//!
//! 환경 변수에서 설정을 1회 로드합니다. 필수 값이 없거나 잘못되면 서버를 띄우지 않습니다.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::secrets::codec::{CodecError, MasterKey};

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ENV_ENCRYPTION_KEY: &str = "SECRETS_ENCRYPTION_KEY";
pub const ENV_DB_PATH: &str = "VAULT_DB_PATH";
pub const ENV_BIND_ADDR: &str = "VAULT_BIND_ADDR";
pub const ENV_MAX_BODY_BYTES: &str = "VAULT_MAX_BODY_BYTES";

pub const DEFAULT_DB_PATH: &str = "vault.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// 설정 오류 (모두 치명적)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("Invalid {var}: {source}")]
    Key {
        var: &'static str,
        #[source]
        source: CodecError,
    },
}

/// 서비스 설정
#[derive(Clone)]
pub struct VaultConfig {
    /// identity provider base URL (끝의 `/` 제거됨)
    pub supabase_url: String,
    /// identity provider 호출 시 `apikey` 헤더 값
    pub supabase_service_key: String,
    pub master_key: MasterKey,
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub max_body_bytes: usize,
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_service_key", &"[REDACTED]")
            .field("master_key", &self.master_key)
            .field("db_path", &self.db_path)
            .field("bind_addr", &self.bind_addr)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl VaultConfig {
    /// 프로세스 환경 변수에서 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 lookup 함수로 로드 (테스트에서 환경 변수를 건드리지 않기 위함)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let supabase_url = get(ENV_SUPABASE_URL).ok_or(ConfigError::Missing(ENV_SUPABASE_URL))?;
        let parsed = reqwest::Url::parse(&supabase_url).map_err(|e| ConfigError::Invalid {
            var: ENV_SUPABASE_URL,
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                var: ENV_SUPABASE_URL,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let supabase_url = supabase_url.trim_end_matches('/').to_string();

        let supabase_service_key = get(ENV_SUPABASE_SERVICE_ROLE_KEY)
            .ok_or(ConfigError::Missing(ENV_SUPABASE_SERVICE_ROLE_KEY))?;

        let encoded_key = get(ENV_ENCRYPTION_KEY).ok_or(ConfigError::Missing(ENV_ENCRYPTION_KEY))?;
        let master_key = MasterKey::from_base64(&encoded_key).map_err(|source| ConfigError::Key {
            var: ENV_ENCRYPTION_KEY,
            source,
        })?;

        let db_path = get(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let bind_addr: SocketAddr = get(ENV_BIND_ADDR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: ENV_BIND_ADDR,
                reason: e.to_string(),
            })?;

        let max_body_bytes: usize = match get(ENV_MAX_BODY_BYTES) {
            Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                var: ENV_MAX_BODY_BYTES,
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Self {
            supabase_url,
            supabase_service_key,
            master_key,
            db_path,
            bind_addr,
            max_body_bytes,
        })
    }
}

fn find_upwards(start: PathBuf, filename: &str, max_hops: usize) -> Option<PathBuf> {
    let mut cur = start;
    for _ in 0..=max_hops {
        let candidate = cur.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        if !cur.pop() {
            break;
        }
    }
    None
}

/// `.env.local` → `.env` 순으로 로드
///
/// 이미 설정된 환경 변수는 덮어쓰지 않습니다. 파일이 없으면 조용히 넘어갑니다.
pub fn load_dotenv_files() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    for filename in [".env.local", ".env"] {
        if let Some(path) = find_upwards(cwd.clone(), filename, 4) {
            if dotenvy::from_path(&path).is_ok() {
                return Some(path);
            }
        }
    }
    None
}
