use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tokio::task;

use crate::errors::ServiceError;

/// Hashes a password into a PHC string with a fresh random salt.
///
/// Argon2 is deliberately slow, so the work runs on the blocking pool
/// instead of stalling the async workers.
pub async fn hash_password(password: &str) -> Result<String, ServiceError> {
    let password = password.to_owned();
    task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {}", e)))?
}

/// Returns false for a wrong password or an unparsable stored hash.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    task::spawn_blocking(move || verify_blocking(&password, &hash))
        .await
        .map_err(|e| ServiceError::Internal(format!("password verification task failed: {}", e)))
}

fn hash_blocking(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {}", e)))
}

fn verify_blocking(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("correct horse").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("wrong horse", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string").await.unwrap());
    }

    // A hash computed inline would complete on its first poll and block
    // the only worker thread until then.
    #[tokio::test(flavor = "current_thread")]
    async fn hashing_runs_off_the_async_worker() {
        let hashing = hash_password("long enough password");
        tokio::pin!(hashing);

        tokio::select! {
            biased;
            _ = &mut hashing => panic!("hash completed on the async worker"),
            _ = tokio::task::yield_now() => {}
        }
        assert!(hashing.await.is_ok());
    }
}
