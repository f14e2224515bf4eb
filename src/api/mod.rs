//! HTTP API Module
//!
//! axum 라우터, CORS, 공유 상태 정의

pub mod secrets;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::IdentityProvider;
use crate::secrets::SecretVault;

/// 모든 핸들러가 공유하는 상태
#[derive(Clone)]
pub struct AppState {
    pub vault: SecretVault,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(vault: SecretVault, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { vault, identity }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// 브라우저 클라이언트가 보내는 헤더를 허용
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

/// 라우터 구성
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let secrets = secrets::routes();

    Router::new()
        .route("/health", get(health_handler))
        .route("/", secrets.clone())
        .route("/secrets", secrets)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
