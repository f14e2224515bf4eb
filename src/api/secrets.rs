//! Secret API 핸들러
//!
//! | Method | Body | 응답 |
//! |---|---|---|
//! | GET | - | `[{secret_type, created_at, updated_at}]` |
//! | POST | `{action:"store", secret_type, secret_value}` | `{success:true}` |
//! | POST | `{action:"retrieve", secret_type}` | `{secret: string \| null}` |
//! | DELETE | `{secret_type}` | `{success:true}` |
//!
//! OPTIONS(preflight)는 CORS 레이어가 처리합니다.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    routing::{get, MethodRouter},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use zeroize::Zeroizing;

use crate::api::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::{VaultError, VaultResult};
use crate::models::SecretType;
use crate::secrets::{VaultCommand, VaultResponse};

/// 요청 본문 (필드 검증은 `into_*`에서 수행)
#[derive(Debug, Deserialize)]
struct SecretRequestBody {
    action: Option<Value>,
    secret_type: Option<Value>,
    secret_value: Option<Value>,
}

/// POST로 받을 수 있는 action
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PostAction {
    Store,
    Retrieve,
}

impl SecretRequestBody {
    fn parse(body: Result<Bytes, BytesRejection>) -> VaultResult<Self> {
        let body = body.map_err(body_rejection)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(VaultError::Validation("Request body is required".to_string()));
        }
        serde_json::from_slice(&body)
            .map_err(|e| VaultError::Validation(format!("Invalid JSON body: {}", e)))
    }

    fn secret_type(&mut self) -> VaultResult<SecretType> {
        match self.secret_type.take() {
            None | Some(Value::Null) => Err(VaultError::Validation(
                "secret_type is required".to_string(),
            )),
            Some(Value::String(raw)) => SecretType::parse(&raw),
            Some(_) => Err(VaultError::Validation(
                "secret_type must be a string".to_string(),
            )),
        }
    }

    fn secret_value(&mut self) -> VaultResult<Zeroizing<String>> {
        match self.secret_value.take() {
            None | Some(Value::Null) => Err(VaultError::Validation(
                "secret_value is required".to_string(),
            )),
            Some(Value::String(raw)) => {
                let raw = Zeroizing::new(raw);
                if raw.is_empty() {
                    return Err(VaultError::Validation(
                        "secret_value must not be empty".to_string(),
                    ));
                }
                Ok(raw)
            }
            Some(_) => Err(VaultError::Validation(
                "secret_value must be a string".to_string(),
            )),
        }
    }

    fn into_post_command(mut self) -> VaultResult<VaultCommand> {
        let action = match self.action.take() {
            None | Some(Value::Null) => {
                return Err(VaultError::Validation("action is required".to_string()))
            }
            Some(raw) => serde_json::from_value::<PostAction>(raw.clone()).map_err(|_| {
                VaultError::Validation(format!(
                    "Invalid action {}: expected \"store\" or \"retrieve\"",
                    raw
                ))
            })?,
        };

        match action {
            PostAction::Store => Ok(VaultCommand::Store {
                secret_type: self.secret_type()?,
                secret_value: self.secret_value()?,
            }),
            PostAction::Retrieve => Ok(VaultCommand::Retrieve {
                secret_type: self.secret_type()?,
            }),
        }
    }

    fn into_delete_command(mut self) -> VaultResult<VaultCommand> {
        Ok(VaultCommand::Delete {
            secret_type: self.secret_type()?,
        })
    }
}

/// 본문 수신 실패도 JSON 에러 응답으로 보냄
fn body_rejection(rejection: BytesRejection) -> VaultError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        VaultError::PayloadTooLarge
    } else {
        VaultError::Validation(rejection.body_text())
    }
}

/// GET: 시크릿 메타데이터 목록
async fn list_handler(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(state): State<AppState>,
) -> VaultResult<Json<VaultResponse>> {
    let response = state.vault.execute(&user_id, VaultCommand::List).await?;
    Ok(Json(response))
}

/// POST: store / retrieve
async fn post_handler(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> VaultResult<Json<VaultResponse>> {
    let command = SecretRequestBody::parse(body)?.into_post_command()?;
    let response = state.vault.execute(&user_id, command).await?;
    Ok(Json(response))
}

/// DELETE: 시크릿 삭제
async fn delete_handler(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> VaultResult<Json<VaultResponse>> {
    let command = SecretRequestBody::parse(body)?.into_delete_command()?;
    let response = state.vault.execute(&user_id, command).await?;
    Ok(Json(response))
}

async fn method_not_allowed() -> VaultError {
    VaultError::MethodNotAllowed
}

/// 시크릿 엔드포인트의 메서드 라우팅
pub fn routes() -> MethodRouter<AppState> {
    get(list_handler)
        .post(post_handler)
        .delete(delete_handler)
        .fallback(method_not_allowed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::{router, AppState};
    use crate::auth::testing::StaticIdentityProvider;
    use crate::db::Database;
    use crate::secrets::codec::{MasterKey, SecretCipher};
    use crate::secrets::SecretVault;

    const U1_TOKEN: &str = "token-u1";
    const U2_TOKEN: &str = "token-u2";

    fn test_app() -> (Router, SecretVault) {
        test_app_with_limit(64 * 1024)
    }

    fn test_app_with_limit(max_body_bytes: usize) -> (Router, SecretVault) {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let vault = SecretVault::new(db, SecretCipher::new(MasterKey::generate()));
        let identity = StaticIdentityProvider::default()
            .with_user(U1_TOKEN, "u1")
            .with_user(U2_TOKEN, "u2");
        let state = AppState::new(vault.clone(), Arc::new(identity));
        (router(state, max_body_bytes), vault)
    }

    async fn send(
        app: &Router,
        method: Method,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri("/secrets");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn store(app: &Router, token: &str, secret_type: &str, value: &str) {
        let (status, body) = send(
            app,
            Method::POST,
            Some(token),
            Some(json!({ "action": "store", "secret_type": secret_type, "secret_value": value })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
    }

    async fn retrieve(app: &Router, token: &str, secret_type: &str) -> serde_json::Value {
        let (status, body) = send(
            app,
            Method::POST,
            Some(token),
            Some(json!({ "action": "retrieve", "secret_type": secret_type })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    #[tokio::test]
    async fn test_store_and_retrieve_scoped_to_caller() {
        let (app, _) = test_app();

        store(&app, U1_TOKEN, "openai_key", "sk-ABC123").await;

        assert_eq!(
            retrieve(&app, U1_TOKEN, "openai_key").await,
            json!({ "secret": "sk-ABC123" })
        );
        assert_eq!(
            retrieve(&app, U2_TOKEN, "openai_key").await,
            json!({ "secret": null })
        );
    }

    #[tokio::test]
    async fn test_list_returns_metadata_only() {
        let (app, _) = test_app();
        store(&app, U1_TOKEN, "openai_key", "sk-list").await;
        store(&app, U1_TOKEN, "brave_key", "bsa-list").await;

        let (status, body) = send(&app, Method::GET, Some(U1_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);

        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["secret_type"], "brave_key");
        for item in items {
            let obj = item.as_object().unwrap();
            let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
            keys.sort_unstable();
            assert_eq!(keys, ["created_at", "secret_type", "updated_at"]);
        }
        assert!(!body.to_string().contains("sk-list"));

        let (_, other) = send(&app, Method::GET, Some(U2_TOKEN), None).await;
        assert_eq!(other, json!([]));
    }

    #[tokio::test]
    async fn test_second_store_replaces_value() {
        let (app, _) = test_app();
        store(&app, U1_TOKEN, "openai_key", "sk-old").await;
        store(&app, U1_TOKEN, "openai_key", "sk-new").await;

        let (_, list) = send(&app, Method::GET, Some(U1_TOKEN), None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(
            retrieve(&app, U1_TOKEN, "openai_key").await,
            json!({ "secret": "sk-new" })
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_scoped() {
        let (app, _) = test_app();
        store(&app, U1_TOKEN, "openai_key", "sk-keep").await;

        // 다른 사용자의 삭제는 성공으로 응답하지만 아무것도 지우지 않음
        let (status, body) = send(
            &app,
            Method::DELETE,
            Some(U2_TOKEN),
            Some(json!({ "secret_type": "openai_key" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
        assert_eq!(
            retrieve(&app, U1_TOKEN, "openai_key").await,
            json!({ "secret": "sk-keep" })
        );

        for _ in 0..2 {
            let (status, body) = send(
                &app,
                Method::DELETE,
                Some(U1_TOKEN),
                Some(json!({ "secret_type": "openai_key" })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "success": true }));
        }
        assert_eq!(
            retrieve(&app, U1_TOKEN, "openai_key").await,
            json!({ "secret": null })
        );
    }

    #[tokio::test]
    async fn test_unauthenticated_requests_never_touch_store() {
        let (app, vault) = test_app();
        let store_body = json!({ "action": "store", "secret_type": "openai_key", "secret_value": "sk-x" });

        for token in [None, Some("forged-but-well-formed.jwt.token")] {
            let (status, body) = send(&app, Method::POST, token, Some(store_body.clone())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "Unauthorized");
            assert_eq!(body["success"], false);
        }

        // 인증이 본문 검증보다 먼저 실행됨
        let (status, _) = send(&app, Method::DELETE, None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, Method::GET, Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert_eq!(vault.total_records().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (app, vault) = test_app();

        let cases = [
            (json!({ "secret_type": "openai_key" }), "action is required"),
            (json!({ "action": "explode", "secret_type": "k" }), "Invalid action"),
            (json!({ "action": "store", "secret_value": "v" }), "secret_type is required"),
            (json!({ "action": "store", "secret_type": "  ", "secret_value": "v" }), "secret_type must not be empty"),
            (json!({ "action": "store", "secret_type": "k" }), "secret_value is required"),
            (json!({ "action": "store", "secret_type": "k", "secret_value": 42 }), "secret_value must be a string"),
            (json!({ "action": "retrieve", "secret_type": 7 }), "secret_type must be a string"),
        ];

        for (body, expected) in cases {
            let (status, resp) = send(&app, Method::POST, Some(U1_TOKEN), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(
                resp["error"].as_str().unwrap().contains(expected),
                "expected '{}' in {}",
                expected,
                resp
            );
            assert_eq!(resp["success"], false);
        }

        let (status, resp) = send(&app, Method::DELETE, Some(U1_TOKEN), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "Request body is required");

        assert_eq!(vault.total_records().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (app, _) = test_app();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/secrets")
            .header(header::AUTHORIZATION, format!("Bearer {}", U1_TOKEN))
            .body(Body::from("{not json"))
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_body_gets_json_error() {
        let (app, vault) = test_app_with_limit(1024);
        let body = json!({
            "action": "store",
            "secret_type": "openai_key",
            "secret_value": "x".repeat(4096),
        });

        let (status, resp) = send(&app, Method::POST, Some(U1_TOKEN), Some(body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(resp["success"], false);
        assert_eq!(resp["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(resp["error"], "Request body is too large");

        assert_eq!(vault.total_records().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let (app, _) = test_app();
        let (status, body) = send(&app, Method::PUT, Some(U1_TOKEN), None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_preflight_returns_cors_headers() {
        let (app, _) = test_app();
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/secrets")
            .header(header::ORIGIN, "https://studio.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let allowed = resp.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .to_string();
        assert!(allowed.contains("authorization"));
        assert!(allowed.contains("apikey"));

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_root_alias_and_health() {
        let (app, _) = test_app();

        let req = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::AUTHORIZATION, format!("Bearer {}", U1_TOKEN))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
