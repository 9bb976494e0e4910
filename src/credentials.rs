/// Password salting, hashing and verification
///
/// Hashes are raw Argon2id output over the password and a per-password
/// 16-byte salt. The salt is stored next to the hash, so the same
/// `(password, salt)` always reproduces the stored value.
use crate::error::{YggError, YggResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use std::time::Duration;
use subtle::ConstantTimeEq;

/// Length of a password salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of a password hash in bytes
pub const HASH_LEN: usize = 32;

/// How long a caller waits for a hash before giving up
const DEFAULT_HASH_TIMEOUT: Duration = Duration::from_secs(10);

/// Credential service
#[derive(Clone)]
pub struct CredentialService {
    params: Params,
    min_password_length: usize,
    hash_timeout: Duration,
}

impl CredentialService {
    /// Create a credential service with the default Argon2id cost
    pub fn new(min_password_length: usize) -> Self {
        Self::with_params(min_password_length, Params::default())
    }

    /// Create a credential service with explicit Argon2 parameters
    pub fn with_params(min_password_length: usize, params: Params) -> Self {
        Self {
            params,
            min_password_length,
            hash_timeout: DEFAULT_HASH_TIMEOUT,
        }
    }

    /// Generate a fresh random salt
    pub fn generate_salt() -> Vec<u8> {
        let mut salt = vec![0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        salt
    }

    /// Deterministically hash `password` with `salt`
    pub fn hash_password(&self, password: &str, salt: &[u8]) -> YggResult<Vec<u8>> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let mut hash = vec![0u8; HASH_LEN];
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut hash)
            .map_err(|e| YggError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(hash)
    }

    /// Recompute the hash and compare it in constant time
    pub fn verify(&self, password: &str, salt: &[u8], expected_hash: &[u8]) -> YggResult<bool> {
        let hash = self.hash_password(password, salt)?;
        Ok(hash.ct_eq(expected_hash).into())
    }

    /// Hash on the blocking pool, bounded by the hash timeout
    pub async fn hash_password_async(&self, password: &str, salt: &[u8]) -> YggResult<Vec<u8>> {
        let service = self.clone();
        let password = password.to_string();
        let salt = salt.to_vec();

        let task = tokio::task::spawn_blocking(move || service.hash_password(&password, &salt));
        tokio::time::timeout(self.hash_timeout, task)
            .await
            .map_err(|_| YggError::Internal("Password hashing timed out".to_string()))?
            .map_err(|e| YggError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    /// Verify on the blocking pool, bounded by the hash timeout
    pub async fn verify_async(
        &self,
        password: &str,
        salt: &[u8],
        expected_hash: &[u8],
    ) -> YggResult<bool> {
        let hash = self.hash_password_async(password, salt).await?;
        Ok(hash.ct_eq(expected_hash).into())
    }

    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }

    /// Whether `password` satisfies the configured minimum length
    ///
    /// The empty password is never valid.
    pub fn is_valid_password(&self, password: &str) -> bool {
        !password.is_empty() && password.chars().count() >= self.min_password_length
    }

    /// Generate a salt and hash for a newly set password
    pub async fn new_credentials(&self, password: &str) -> YggResult<(Vec<u8>, Vec<u8>)> {
        let salt = Self::generate_salt();
        let hash = self.hash_password_async(password, &salt).await?;
        Ok((salt, hash))
    }
}

/// Cheap Argon2 parameters for tests
#[cfg(test)]
pub fn test_params() -> Params {
    Params::new(1024, 1, 1, Some(HASH_LEN)).unwrap()
}
