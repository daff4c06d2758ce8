//! Signed, time-limited tokens (HMAC JWTs).
//!
//! Two signing contexts exist, each with its own secret and lifetime:
//! - **session** tokens, issued at login and sent as `Authorization: Bearer`
//!   on every protected request. They carry the role the user had at login
//!   time; role changes only take effect once the token expires.
//! - **reset** tokens, mailed out by the forgot-password flow.
//!
//! The contexts are distinct types ([`SessionTokens`], [`ResetTokens`]), so
//! one can never be used where the other is expected. Verification is a pure
//! function of the token, the key and the clock: nothing is looked up.
//!
//! Reset tokens are not single-use. Once verified they stay valid until they
//! expire, since there is no denylist.

use crate::store::Role;
use crate::AuthConfig;
use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Default session token lifetime
pub const SESSION_TOKEN_MINUTES: i64 = 60;
/// Default reset token lifetime
pub const RESET_TOKEN_MINUTES: i64 = 15;

/// Claims payload of a token kind.
pub trait TokenClaims: Serialize + DeserializeOwned {
    /// Expiration (Unix timestamp)
    fn expires_at(&self) -> i64;
}

/// Session token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: user email
    pub sub: String,
    /// Role at issuance time
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl TokenClaims for SessionClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Reset token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    /// Subject: user email
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims for ResetClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Why a token was rejected.
///
/// `Malformed` and `Invalid` lead to the same outcome for the caller, but are
/// kept apart for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    Invalid,
}

/// Secret, algorithm and lifetime for one kind of token.
pub struct SigningContext<C> {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    lifetime: Duration,
    _claims: PhantomData<fn() -> C>,
}

pub type SessionTokens = SigningContext<SessionClaims>;
pub type ResetTokens = SigningContext<ResetClaims>;

/// Returns true for the HMAC family, the only algorithms a shared secret can drive.
pub fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

impl<C: TokenClaims> SigningContext<C> {
    pub fn new(secret: &str, algorithm: Algorithm, lifetime: Duration) -> Result<Self> {
        ensure!(!secret.is_empty(), "signing secret must not be empty");
        ensure!(
            is_hmac(algorithm),
            "unsupported signing algorithm {:?} (expected HS256, HS384 or HS512)",
            algorithm
        );
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            lifetime,
            _claims: PhantomData,
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    fn sign(&self, claims: &C) -> Result<String> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .context("Failed to encode JWT")
    }

    /// Decode and validate a token against the current time.
    pub fn verify(&self, token: &str) -> Result<C, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Decode and validate a token as of `now`.
    ///
    /// The signature is checked first, so a forged token is reported as
    /// `Invalid` even when its `exp` is in the past.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<C, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // exp is compared below against `now`, without leeway
        validation.validate_exp = false;

        let data = decode::<C>(token, &self.decoding_key, &validation)
            .map_err(|e| classify(e.kind()))?;

        if now.timestamp() > data.claims.expires_at() {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

impl SigningContext<SessionClaims> {
    /// Issue a session token for `email` carrying `role`.
    pub fn issue(&self, email: &str, role: Role) -> Result<String> {
        self.issue_at(email, role, Utc::now())
    }

    pub fn issue_at(&self, email: &str, role: Role, now: DateTime<Utc>) -> Result<String> {
        let claims = SessionClaims {
            sub: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        self.sign(&claims)
    }
}

impl SigningContext<ResetClaims> {
    /// Issue a password-reset token for `email`.
    pub fn issue(&self, email: &str) -> Result<String> {
        self.issue_at(email, Utc::now())
    }

    pub fn issue_at(&self, email: &str, now: DateTime<Utc>) -> Result<String> {
        let claims = ResetClaims {
            sub: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        self.sign(&claims)
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
        _ => TokenError::Invalid,
    }
}

/// Both signing contexts, built from the auth config.
pub struct TokenService {
    pub session: SessionTokens,
    pub reset: ResetTokens,
}

impl TokenService {
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        ensure!(!config.jwt_secret.is_empty(), "auth.jwt_secret is required");
        ensure!(!config.reset_secret.is_empty(), "auth.reset_secret is required");
        ensure!(
            config.jwt_secret != config.reset_secret,
            "auth.reset_secret must differ from auth.jwt_secret"
        );

        Ok(Self {
            session: SigningContext::new(
                &config.jwt_secret,
                config.jwt_algorithm,
                Duration::minutes(config.session_expiry_mins),
            )?,
            reset: SigningContext::new(
                &config.reset_secret,
                config.jwt_algorithm,
                Duration::minutes(config.reset_expiry_mins),
            )?,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
