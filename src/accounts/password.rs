use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::HashConfig;

/// Longest plaintext accepted for hashing, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 1024;

const DECOY_PASSWORD: &str = "beeshop-decoy-password";

#[derive(Debug, Error)]
pub enum HashError {
    #[error("password exceeds {MAX_PASSWORD_BYTES} bytes")]
    TooLong,
    #[error("invalid hash parameters: {0}")]
    Params(argon2::Error),
    #[error("hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
}

/// Argon2id hasher producing self-describing PHC strings (salt and cost
/// parameters are embedded in the digest).
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    decoy: String,
}

impl CredentialHasher {
    pub fn new(cfg: &HashConfig) -> Result<Self, HashError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(HashError::Params)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let decoy = hash_with(&argon2, DECOY_PASSWORD)?;
        Ok(Self { argon2, decoy })
    }

    pub fn hash(&self, plain: &str) -> Result<String, HashError> {
        if plain.len() > MAX_PASSWORD_BYTES {
            return Err(HashError::TooLong);
        }
        hash_with(&self.argon2, plain)
    }

    /// Returns false on mismatch and on digests that cannot be parsed.
    pub fn verify(&self, digest: &str, plain: &str) -> bool {
        if plain.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        let parsed = match PasswordHash::new(digest) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "stored password digest is malformed");
                return false;
            }
        };
        self.argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    /// Spends the same work as a real verification. Used when there is no
    /// account to check against.
    pub fn verify_decoy(&self, plain: &str) {
        let _ = self.verify(&self.decoy, plain);
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        let cfg = HashConfig {
            memory_kib: Params::MIN_M_COST,
            iterations: 1,
            parallelism: 1,
        };
        Self::new(&cfg).expect("minimal argon2 params are valid")
    }
}

fn hash_with(argon2: &Argon2<'_>, plain: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            HashError::Hash(e)
        })?
        .to_string();
    Ok(hash)
}
