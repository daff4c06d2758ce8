//! Storage interfaces for users and travel logs
//!
//! Handlers only see these traits, so the in-memory backend can be swapped
//! for a document database without touching the API layer.

use crate::store::models::*;
use async_trait::async_trait;

/// Failures reported by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    AlreadyExists,
    #[error("record not found")]
    NotFound,
    #[error("no changes applied")]
    NoChange,
    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Credential store: users keyed by email.
///
/// Every mutation is a single atomic update of one record.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Insert a new user. Fails with `AlreadyExists` if the email is taken.
    async fn create(&self, user: User) -> StoreResult<User>;

    /// Apply a sparse patch and return the updated record.
    ///
    /// Fails with `NoChange` if the patch is empty or leaves every field as it
    /// was, and with `NotFound` if no user has this email.
    async fn update_fields(&self, email: &str, patch: &UserPatch) -> StoreResult<User>;

    /// Replace the stored password hash
    async fn set_password_hash(&self, email: &str, password_hash: &str) -> StoreResult<()>;

    /// Delete a user. Fails with `NotFound` if absent.
    async fn delete(&self, email: &str) -> StoreResult<()>;

    /// List users, oldest first, up to `limit`
    async fn list(&self, limit: usize) -> StoreResult<Vec<User>>;
}

/// Travel-log store.
#[async_trait]
pub trait TravelStore: Send + Sync {
    /// Record a new log entry
    async fn insert_travel(&self, log: NewTravelLog) -> StoreResult<TravelLog>;

    /// Logs owned by one user, oldest first, up to `limit`
    async fn list_travels_for(&self, email: &str, limit: usize) -> StoreResult<Vec<TravelLog>>;

    /// Every log, oldest first, up to `limit`
    async fn list_all_travels(&self, limit: usize) -> StoreResult<Vec<TravelLog>>;
}
