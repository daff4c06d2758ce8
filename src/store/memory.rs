//! In-memory implementation of [`UserStore`] and [`TravelStore`].
//!
//! Backed by `tokio::sync::RwLock` collections. Data lives for the lifetime
//! of the process.

use crate::store::models::*;
use crate::store::traits::{StoreError, StoreResult, TravelStore, UserStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    travels: RwLock<Vec<TravelLog>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn create(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(StoreError::AlreadyExists);
        }
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn update_fields(&self, email: &str, patch: &UserPatch) -> StoreResult<User> {
        if patch.is_empty() {
            return Err(StoreError::NoChange);
        }
        let mut users = self.users.write().await;
        let user = users.get_mut(email).ok_or(StoreError::NotFound)?;
        if !user.apply(patch) {
            return Err(StoreError::NoChange);
        }
        Ok(user.clone())
    }

    async fn set_password_hash(&self, email: &str, password_hash: &str) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let user = users.get_mut(email).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn delete(&self, email: &str) -> StoreResult<()> {
        self.users
            .write()
            .await
            .remove(email)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, limit: usize) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by_key(|u| u.created_at);
        all.truncate(limit);
        Ok(all)
    }
}

#[async_trait]
impl TravelStore for MemoryStore {
    async fn insert_travel(&self, log: NewTravelLog) -> StoreResult<TravelLog> {
        let log = log.into_log();
        self.travels.write().await.push(log.clone());
        Ok(log)
    }

    async fn list_travels_for(&self, email: &str, limit: usize) -> StoreResult<Vec<TravelLog>> {
        Ok(self
            .travels
            .read()
            .await
            .iter()
            .filter(|t| t.user_email == email)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_all_travels(&self, limit: usize) -> StoreResult<Vec<TravelLog>> {
        Ok(self.travels.read().await.iter().take(limit).cloned().collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
