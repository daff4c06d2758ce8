//! FuelTrackr
//!
//! Backend for tracking employee vehicle mileage:
//! - Password login issuing short-lived session tokens
//! - Password reset through a separately signed, mailed token
//! - Role-gated routes (employee / admin)
//! - OIDC authorization code federation with replay protection
//! - Travel log recording and listing

pub mod api;
pub mod auth;
pub mod mailer;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{bail, ensure, Context, Result};
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub auth: AuthConfig,
    /// OIDC section: if absent, the federation callback is disabled
    pub oidc: Option<OidcConfig>,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
    /// Origins allowed by CORS. `*` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            allowed_origins: vec![
                "http://localhost:5173".into(),
                "https://localhost:5173".into(),
                "http://127.0.0.1:5173".into(),
            ],
        }
    }
}

/// Token and password settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session token signing secret
    pub jwt_secret: String,
    /// Reset token signing secret, must differ from `jwt_secret`
    pub reset_secret: String,
    /// HS256 (default), HS384 or HS512
    pub jwt_algorithm: Algorithm,
    pub session_expiry_mins: i64,
    pub reset_expiry_mins: i64,
    pub bcrypt_cost: u32,
    /// Base URL of the frontend, used to build reset links
    pub frontend_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            reset_secret: String::new(),
            jwt_algorithm: Algorithm::HS256,
            session_expiry_mins: auth::jwt::SESSION_TOKEN_MINUTES,
            reset_expiry_mins: auth::jwt::RESET_TOKEN_MINUTES,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            frontend_url: "http://localhost:5173".into(),
        }
    }
}

/// OIDC identity provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    /// Sent verbatim in the code exchange; must match the provider's registration
    pub redirect_uri: String,
    /// Accept invalid TLS certificates from the provider (development only)
    pub allow_insecure_transport: bool,
    pub timeout_secs: u64,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_endpoint: String::new(),
            userinfo_endpoint: String::new(),
            redirect_uri: "http://localhost:5173/callback".into(),
            allow_insecure_transport: false,
            timeout_secs: 15,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub allowed_origins: Vec<String>,
    pub auth: AuthConfig,
    pub oidc: Option<OidcConfig>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => match raw.parse() {
            Ok(v) => Ok(Some(v)),
            Err(e) => bail!("Invalid value for {}: {} ({})", name, raw, e),
        },
        None => Ok(None),
    }
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let mut auth = yaml.auth;
        if let Some(secret) = env_var("JWT_SECRET") {
            auth.jwt_secret = secret;
        }
        if let Some(secret) = env_var("RESET_SECRET") {
            auth.reset_secret = secret;
        }
        if let Some(alg) = env_parse::<Algorithm>("JWT_ALGORITHM")? {
            auth.jwt_algorithm = alg;
        }
        if let Some(url) = env_var("FRONTEND_URL") {
            auth.frontend_url = url;
        }

        // The env alone can configure OIDC when the YAML has no section
        let mut oidc = yaml.oidc;
        if oidc.is_none() && env_var("OIDC_CLIENT_ID").is_some() {
            oidc = Some(OidcConfig::default());
        }
        if let Some(o) = oidc.as_mut() {
            if let Some(v) = env_var("OIDC_CLIENT_ID") {
                o.client_id = v;
            }
            if let Some(v) = env_var("OIDC_CLIENT_SECRET") {
                o.client_secret = v;
            }
            if let Some(v) = env_var("OIDC_TOKEN_URL") {
                o.token_endpoint = v;
            }
            if let Some(v) = env_var("OIDC_USERINFO_URL") {
                o.userinfo_endpoint = v;
            }
            if let Some(v) = env_var("OIDC_REDIRECT_URI") {
                o.redirect_uri = v;
            }
            if let Some(v) = env_parse::<bool>("OIDC_ALLOW_INSECURE_TRANSPORT")? {
                o.allow_insecure_transport = v;
            }
            if let Some(v) = env_parse::<u64>("OIDC_TIMEOUT_SECS")? {
                o.timeout_secs = v;
            }
        }

        let allowed_origins = match env_var("CORS_ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => yaml.server.allowed_origins,
        };

        Ok(Self {
            server_port: env_parse("SERVER_PORT")?.unwrap_or(yaml.server.port),
            allowed_origins,
            auth,
            oidc,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        auth::jwt::TokenService::from_config(&self.auth)?;
        ensure!(
            self.auth.session_expiry_mins > 0 && self.auth.reset_expiry_mins > 0,
            "token lifetimes must be positive"
        );
        ensure!(
            (4..=31).contains(&self.auth.bcrypt_cost),
            "auth.bcrypt_cost must be between 4 and 31"
        );

        if let Some(oidc) = &self.oidc {
            ensure!(!oidc.client_id.is_empty(), "oidc.client_id is required");
            ensure!(!oidc.token_endpoint.is_empty(), "oidc.token_endpoint is required");
            ensure!(
                !oidc.userinfo_endpoint.is_empty(),
                "oidc.userinfo_endpoint is required"
            );
            ensure!(!oidc.redirect_uri.is_empty(), "oidc.redirect_uri is required");
            ensure!(oidc.timeout_secs > 0, "oidc.timeout_secs must be positive");
        }
        Ok(())
    }
}

// ============================================================================
// Server
// ============================================================================

/// Build the state, bind the port and serve until Ctrl+C / SIGTERM.
pub async fn start_server(config: Config) -> Result<()> {
    config.validate()?;

    let store = Arc::new(store::MemoryStore::new());
    let state = Arc::new(api::handlers::ServerState::new(
        &config,
        store.clone(),
        store,
        Arc::new(mailer::LogMailer),
    )?);
    if state.oidc.is_none() {
        tracing::info!("No OIDC provider configured, federation callback disabled");
    }

    let app = api::routes::create_router(state, &config.allowed_origins);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("FuelTrackr API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

// ============================================================================
// Tests
// ============================================================================
