//! Auth Gate
//!
//! `Authorization: Bearer <token>`을 identity provider에 검증해 사용자 id를 얻습니다.
//! 인증 실패는 요청 단위로 종결되며 재시도하지 않습니다.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
};
use serde::Deserialize;

use crate::api::AppState;
use crate::error::VaultError;
use crate::models::UserId;

const USER_ENDPOINT: &str = "/auth/v1/user";
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// 인증 오류
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Malformed Authorization header")]
    MalformedHeader,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Identity provider request failed: {0}")]
    ProviderUnavailable(String),
}

/// 헤더에서 bearer 토큰 추출
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

/// 토큰을 사용자 id로 해석하는 identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<UserId, AuthError>;
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
}

/// Supabase Auth (GoTrue) 클라이언트
#[derive(Debug, Clone)]
pub struct SupabaseIdentityProvider {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl SupabaseIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        })
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<UserId, AuthError> {
        let url = format!("{}{}", self.base_url, USER_ENDPOINT);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("apikey", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.without_url().to_string()))?;

        let status = resp.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AuthError::ProviderUnavailable(format!(
                "unexpected status {}",
                status
            )));
        }

        let user: ProviderUser = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.without_url().to_string()))?;

        if user.id.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(UserId::new(user.id))
    }
}

/// 인증된 호출자 (axum extractor)
///
/// 핸들러 인자 중 가장 먼저 실행되므로 인증 실패 시 본문 파싱이나 저장소 접근이 일어나지 않습니다.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserId);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = VaultError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(&parts.headers)?;
        let user_id = state.identity.resolve(token).await?;
        Ok(AuthenticatedUser(user_id))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderValue, routing::get, Json, Router};

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(extract_bearer(&headers("bearer  abc ")).unwrap(), "abc");

        assert!(matches!(
            extract_bearer(&HeaderMap::new()),
            Err(AuthError::MissingHeader)
        ));
        assert!(matches!(
            extract_bearer(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            extract_bearer(&headers("Bearer")),
            Err(AuthError::MalformedHeader)
        ));
    }

    /// 로컬 mock GoTrue 서버 기동
    async fn spawn_mock_provider() -> String {
        async fn user_handler(headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
            let apikey_ok = headers
                .get("apikey")
                .and_then(|v| v.to_str().ok())
                == Some("service-key");
            match extract_bearer(&headers) {
                Ok("good-token") if apikey_ok => (
                    StatusCode::OK,
                    Json(serde_json::json!({ "id": "user-123", "email": "a@example.com" })),
                ),
                Ok("broken-provider") => (
                    StatusCode::BAD_GATEWAY,
                    Json(serde_json::json!({ "msg": "upstream" })),
                ),
                _ => (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "msg": "invalid JWT" })),
                ),
            }
        }

        let app = Router::new().route(USER_ENDPOINT, get(user_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_supabase_provider_resolves_user() {
        let base = spawn_mock_provider().await;
        let provider = SupabaseIdentityProvider::new(base, "service-key").unwrap();

        let user = provider.resolve("good-token").await.unwrap();
        assert_eq!(user.as_str(), "user-123");
    }

    #[tokio::test]
    async fn test_supabase_provider_rejects_invalid_token() {
        let base = spawn_mock_provider().await;
        let provider = SupabaseIdentityProvider::new(base, "service-key").unwrap();

        assert!(matches!(
            provider.resolve("expired-token").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_supabase_provider_upstream_failure() {
        let base = spawn_mock_provider().await;
        let provider = SupabaseIdentityProvider::new(base, "service-key").unwrap();

        assert!(matches!(
            provider.resolve("broken-provider").await,
            Err(AuthError::ProviderUnavailable(_))
        ));
    }
}
