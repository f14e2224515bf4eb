//! Secret Vault - 사용자 시크릿 암호화 저장 서비스
//!
//! Bearer 토큰으로 사용자를 인증하고, 시크릿 값을 XChaCha20-Poly1305로 암호화해
//! SQLite에 `(user_id, secret_type)` 단위로 보관합니다.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod secrets;

use std::sync::Arc;

use tracing::info;

use crate::api::AppState;
use crate::auth::SupabaseIdentityProvider;
use crate::config::VaultConfig;
use crate::db::Database;
use crate::error::VaultError;
use crate::secrets::{SecretCipher, SecretVault};

/// 트레이싱 초기화 (`RUST_LOG`로 조정 가능)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "secret_vault=info,tower_http=info".into()),
        )
        .try_init();
}

/// 설정으로부터 앱 상태 구성
///
/// DB 스키마 초기화까지 끝나야 요청을 받을 수 있습니다.
pub fn build_state(config: &VaultConfig) -> Result<AppState, VaultError> {
    let db = Database::new(&config.db_path)?;
    db.initialize()?;

    let cipher = SecretCipher::new(config.master_key.clone());
    let vault = SecretVault::new(db, cipher);

    let identity = SupabaseIdentityProvider::new(
        config.supabase_url.clone(),
        config.supabase_service_key.clone(),
    )?;

    Ok(AppState::new(vault, Arc::new(identity)))
}

/// 서버 실행 (Ctrl-C로 종료)
pub async fn serve(config: VaultConfig) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    let app = api::router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %listener.local_addr()?,
        db = %config.db_path.display(),
        "secret vault listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("secret vault shutting down");
        })
        .await?;

    Ok(())
}
