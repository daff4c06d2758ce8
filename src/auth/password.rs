//! Password hashing with bcrypt.
//!
//! bcrypt is deliberately slow, so both operations run on the blocking pool.

use anyhow::{Context, Result};

/// Hash a plaintext password with the given bcrypt cost.
pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("password hashing task panicked")?
        .context("Failed to hash password")
}

/// Check a plaintext password against a stored hash.
///
/// A corrupt hash counts as a mismatch.
pub async fn verify_password(password: &str, password_hash: &str) -> bool {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &password_hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("pw1", 4).await.unwrap();
        assert_ne!(hash, "pw1");
        assert!(hash.starts_with("$2"));
        assert!(verify_password("pw1", &hash).await);
        assert!(!verify_password("pw2", &hash).await);
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let a = hash_password("same", 4).await.unwrap();
        let b = hash_password("same", 4).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_corrupt_hash_never_matches() {
        assert!(!verify_password("pw1", "not-a-bcrypt-hash").await);
    }
}
