//! OIDC federation client (authorization code flow, server side).
//!
//! The browser is redirected back to us with a one-time `code`. We exchange it
//! at the provider's token endpoint (client credentials via HTTP Basic), then
//! fetch the user's profile from the userinfo endpoint.
//!
//! Every code goes through the [`CodeReplayGuard`] first: a code the provider
//! already accepted is refused locally, and a code it rejected stays eligible
//! for another attempt.

use crate::auth::replay::CodeReplayGuard;
use crate::OidcConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Failures of the code exchange.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("Authorization code already used")]
    CodeAlreadyUsed,
    #[error("Token exchange failed ({status}): {body}")]
    ExchangeRejected { status: StatusCode, body: String },
    #[error("Identity provider unreachable: {0}")]
    ProviderUnreachable(#[source] reqwest::Error),
    #[error("Invalid token response from identity provider: {0}")]
    InvalidTokenResponse(String),
    #[error("Userinfo request failed ({status}): {body}")]
    ProfileFetchFailed { status: StatusCode, body: String },
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    id_token: Option<String>,
}

/// Profile returned by the userinfo endpoint.
///
/// Only `sub` is required; every other claim the provider sends is kept
/// in `extra` and relayed as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedProfile {
    /// Provider's unique user identifier
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Result of a successful exchange.
#[derive(Debug, Clone)]
pub struct FederatedLogin {
    pub access_token: String,
    pub id_token: Option<String>,
    pub profile: FederatedProfile,
}

pub struct OidcClient {
    token_endpoint: String,
    userinfo_endpoint: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http_client: reqwest::Client,
    replay_guard: Arc<CodeReplayGuard>,
}

impl OidcClient {
    /// Build a client from config.
    ///
    /// Certificate verification is only turned off for this client, and only
    /// when `allow_insecure_transport` is set.
    pub fn from_config(config: &OidcConfig, replay_guard: Arc<CodeReplayGuard>) -> Result<Self> {
        if config.allow_insecure_transport {
            tracing::warn!(
                "TLS certificate verification is DISABLED for the OIDC provider ({}); \
                 use only against a local development identity server",
                config.token_endpoint
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.allow_insecure_transport)
            .build()
            .context("Failed to build OIDC HTTP client")?;

        Ok(Self {
            token_endpoint: config.token_endpoint.clone(),
            userinfo_endpoint: config.userinfo_endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            http_client,
            replay_guard,
        })
    }

    pub fn replay_guard(&self) -> &CodeReplayGuard {
        &self.replay_guard
    }

    /// Exchange an authorization code for tokens and the user's profile.
    ///
    /// 1. Reserve the code (refused if used or in flight)
    /// 2. POST the code to the token endpoint
    /// 3. On a 200, mark the code used
    /// 4. GET the userinfo endpoint with the access token
    pub async fn exchange_code(&self, code: &str) -> Result<FederatedLogin, OidcError> {
        let reservation = self
            .replay_guard
            .try_reserve(code)
            .ok_or(OidcError::CodeAlreadyUsed)?;

        // Step 1: Exchange code for tokens
        let response = self
            .http_client
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(OidcError::ProviderUnreachable)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(OidcError::ProviderUnreachable)?;
        tracing::debug!(%status, "OIDC token endpoint responded");

        if status != StatusCode::OK {
            tracing::warn!(%status, "OIDC token exchange rejected");
            return Err(OidcError::ExchangeRejected { status, body });
        }

        // The provider has consumed the code from here on
        reservation.commit();

        let tokens: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| OidcError::InvalidTokenResponse(e.to_string()))?;
        let access_token = tokens
            .access_token
            .ok_or_else(|| OidcError::InvalidTokenResponse("missing access_token".to_string()))?;

        // Step 2: Fetch user info
        let profile = self.fetch_profile(&access_token).await?;
        tracing::info!(sub = %profile.sub, "OIDC token exchange successful");

        Ok(FederatedLogin {
            access_token,
            id_token: tokens.id_token,
            profile,
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<FederatedProfile, OidcError> {
        let response = self
            .http_client
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(OidcError::ProviderUnreachable)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(OidcError::ProviderUnreachable)?;

        if status != StatusCode::OK {
            tracing::warn!(%status, "OIDC userinfo fetch failed");
            return Err(OidcError::ProfileFetchFailed { status, body });
        }

        serde_json::from_str(&body).map_err(|e| OidcError::ProfileFetchFailed {
            status,
            body: format!("unreadable profile ({}): {}", e, body),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_oidc_config;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, bearer_token, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OidcClient {
        OidcClient::from_config(
            &test_oidc_config(&server.uri()),
            Arc::new(CodeReplayGuard::new()),
        )
        .unwrap()
    }

    async fn mount_userinfo(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/oauth2/userinfo"))
            .and(bearer_token("provider-access-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "alice",
                "email": "alice@example.com",
                "given_name": "Alice"
            })))
            .mount(server)
            .await;
    }

    fn token_ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "provider-access-token",
            "id_token": "provider-id-token",
            "token_type": "Bearer",
            "expires_in": 3600
        }))
    }

    #[tokio::test]
    async fn test_exchange_sends_credentials_and_redirect_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(basic_auth("test-client-id", "test-client-secret"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc123"))
            .and(body_string_contains(
                "redirect_uri=http%3A%2F%2Flocalhost%3A5173%2Fcallback",
            ))
            .respond_with(token_ok())
            .expect(1)
            .mount(&server)
            .await;
        mount_userinfo(&server).await;

        let client = client_for(&server);
        let login = client.exchange_code("abc123").await.unwrap();

        assert_eq!(login.access_token, "provider-access-token");
        assert_eq!(login.id_token.as_deref(), Some("provider-id-token"));
        assert_eq!(login.profile.sub, "alice");
        assert_eq!(login.profile.email.as_deref(), Some("alice@example.com"));
        assert_eq!(login.profile.extra["given_name"], "Alice");
        assert!(client.replay_guard().is_used("abc123"));
    }

    #[tokio::test]
    async fn test_replayed_code_is_refused_without_calling_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(token_ok())
            .expect(1)
            .mount(&server)
            .await;
        mount_userinfo(&server).await;

        let client = client_for(&server);
        client.exchange_code("abc123").await.unwrap();

        let err = client.exchange_code("abc123").await.unwrap_err();
        assert!(matches!(err, OidcError::CodeAlreadyUsed));
    }

    #[tokio::test]
    async fn test_rejected_code_can_be_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(token_ok())
            .mount(&server)
            .await;
        mount_userinfo(&server).await;

        let client = client_for(&server);
        match client.exchange_code("abc123").await.unwrap_err() {
            OidcError::ExchangeRejected { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("expected ExchangeRejected, got {other:?}"),
        }
        assert!(!client.replay_guard().is_used("abc123"));

        let login = client.exchange_code("abc123").await.unwrap();
        assert_eq!(login.profile.sub, "alice");
    }

    #[tokio::test]
    async fn test_unreachable_provider_leaves_code_eligible() {
        let mut config = test_oidc_config("http://127.0.0.1:1");
        config.timeout_secs = 2;
        let client = OidcClient::from_config(&config, Arc::new(CodeReplayGuard::new())).unwrap();

        let err = client.exchange_code("abc123").await.unwrap_err();
        assert!(matches!(err, OidcError::ProviderUnreachable(_)));
        assert!(client.replay_guard().is_empty());
    }

    #[tokio::test]
    async fn test_userinfo_failure_surfaces_provider_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(token_ok())
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oauth2/userinfo"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_token"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        match client.exchange_code("abc123").await.unwrap_err() {
            OidcError::ProfileFetchFailed { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "invalid_token");
            }
            other => panic!("expected ProfileFetchFailed, got {other:?}"),
        }
        // The provider accepted the code, so it stays burned
        assert!(client.replay_guard().is_used("abc123"));
    }

    #[tokio::test]
    async fn test_token_response_without_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id_token": "x"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.exchange_code("abc123").await.unwrap_err();
        assert!(matches!(err, OidcError::InvalidTokenResponse(_)));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_callbacks_hit_provider_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(token_ok().set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;
        mount_userinfo(&server).await;

        let client = client_for(&server);
        let (a, b) = tokio::join!(client.exchange_code("abc123"), client.exchange_code("abc123"));

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(OidcError::CodeAlreadyUsed))));
    }

    #[test]
    fn test_profile_deserialization_keeps_extra_claims() {
        let json = r#"{"sub": "123", "email": "bob@example.com", "groups": ["drivers"]}"#;
        let profile: FederatedProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.sub, "123");
        assert!(profile.name.is_none());
        assert_eq!(profile.extra["groups"][0], "drivers");

        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back["groups"][0], "drivers");
        assert!(back.get("name").is_none());
    }
}
