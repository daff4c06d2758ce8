//! Test helper factories and state builders
//!
//! Provides convenience functions for building test config and server state,
//! seeding users, minting tokens, and driving the router.
#![allow(dead_code)]

use crate::api::handlers::{ApiState, ServerState};
use crate::api::routes::create_router;
use crate::auth::password::hash_password;
use crate::mailer::{LogMailer, MailError, ResetMailer};
use crate::store::{MemoryStore, Role, User, UserPatch};
use crate::{AuthConfig, Config, OidcConfig};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use jsonwebtoken::Algorithm;
use std::sync::{Arc, Mutex};
use tower::ServiceExt; // oneshot

pub const TEST_SECRET: &str = "test-secret-key-minimum-32-chars!!";
pub const TEST_RESET_SECRET: &str = "test-reset-key-minimum-32-chars!!!";

// ============================================================================
// Config
// ============================================================================

/// Auth config with distinct test secrets and the cheapest bcrypt cost
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_SECRET.to_string(),
        reset_secret: TEST_RESET_SECRET.to_string(),
        jwt_algorithm: Algorithm::HS256,
        session_expiry_mins: 60,
        reset_expiry_mins: 15,
        bcrypt_cost: 4,
        frontend_url: "http://localhost:5173".to_string(),
    }
}

/// OIDC config pointing at a mock provider rooted at `base_url`
pub fn test_oidc_config(base_url: &str) -> OidcConfig {
    OidcConfig {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        token_endpoint: format!("{}/oauth2/token", base_url),
        userinfo_endpoint: format!("{}/oauth2/userinfo", base_url),
        redirect_uri: "http://localhost:5173/callback".to_string(),
        allow_insecure_transport: false,
        timeout_secs: 5,
    }
}

pub fn test_config() -> Config {
    Config {
        server_port: 0,
        allowed_origins: vec!["http://localhost:5173".to_string()],
        auth: test_auth_config(),
        oidc: None,
    }
}

// ============================================================================
// State builders
// ============================================================================

/// Server state over an empty in-memory store, no OIDC, logging mailer
pub fn test_state() -> ApiState {
    test_state_with(test_config(), Arc::new(LogMailer))
}

pub fn test_state_with(config: Config, mailer: Arc<dyn ResetMailer>) -> ApiState {
    let store = Arc::new(MemoryStore::new());
    Arc::new(ServerState::new(&config, store.clone(), store, mailer).expect("test state"))
}

/// Full application router over `state`
pub fn test_app(state: &ApiState) -> Router {
    create_router(state.clone(), &[])
}

/// Insert a user with a real bcrypt hash and the given role
pub async fn seed_user(state: &ApiState, name: &str, email: &str, password: &str, role: Role) -> User {
    let hash = hash_password(password, 4).await.unwrap();
    let user = state
        .users
        .create(User::new(name, email, hash, "FC-0001"))
        .await
        .unwrap();
    if role == Role::Employee {
        return user;
    }
    state
        .users
        .update_fields(
            email,
            &UserPatch {
                role: Some(role),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap()
}

pub fn session_token(state: &ApiState, email: &str, role: Role) -> String {
    state.tokens.session.issue(email, role).unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

// ============================================================================
// Router driver
// ============================================================================

/// Send one request through `app` and return the status and JSON body
/// (`Null` for an empty body).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header("authorization", bearer(token));
    }
    let req = match body {
        Some(json) => req
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

// ============================================================================
// Mailers
// ============================================================================

/// Records every reset link instead of sending it
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    /// `(recipient, link)` pairs in send order
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Token carried by the last link sent
    pub fn last_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let (_, link) = sent.last()?;
        let encoded = link.split("token=").nth(1)?;
        urlencoding::decode(encoded).ok().map(|t| t.into_owned())
    }
}

#[async_trait]
impl ResetMailer for RecordingMailer {
    async fn send_reset(&self, email: &str, reset_link: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), reset_link.to_string()));
        Ok(())
    }
}

/// Fails every delivery
pub struct FailingMailer;

#[async_trait]
impl ResetMailer for FailingMailer {
    async fn send_reset(&self, _email: &str, _reset_link: &str) -> Result<(), MailError> {
        Err(MailError::DeliveryFailed("SMTP connection refused".to_string()))
    }
}
