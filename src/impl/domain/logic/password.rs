use fractic_server_error::ServerError;
use pbkdf2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Params, Pbkdf2,
};

use crate::errors::PasswordHashError;

const ROUNDS: u32 = 600_000;
const OUTPUT_LEN: usize = 32;
const SALT_LEN: usize = 16;
const MIN_PASSWORD_LEN: usize = 4;

/// Hashes a password with PBKDF2-HMAC-SHA256 into a PHC string
/// (`$pbkdf2-sha256$i=<rounds>,l=32$<salt>$<hash>`).
pub(crate) fn hash_password(password: &str) -> Result<String, ServerError> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; SALT_LEN]>())
        .map_err(|e| PasswordHashError::new(&e.to_string()))?;
    let params = Params {
        rounds: ROUNDS,
        output_length: OUTPUT_LEN,
    };
    Pbkdf2
        .hash_password_customized(
            password.as_bytes(),
            Some(Algorithm::Pbkdf2Sha256.ident()),
            None,
            params,
            &salt,
        )
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordHashError::new(&e.to_string()))
}

/// Checks a password against a stored PHC hash. The rounds recorded in the
/// hash are used, so older hashes keep verifying. Malformed hashes never
/// match.
pub(crate) fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(hash) = PasswordHash::new(stored) else {
        return false;
    };
    Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok()
}

pub(crate) fn is_acceptable_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}
