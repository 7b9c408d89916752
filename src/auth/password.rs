use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password must not be empty")]
    Empty,

    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// New hashes are always argon2.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    if plain.is_empty() {
        return Err(PasswordError::Empty);
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check `plain` against an argon2 PHC string or a legacy bcrypt hash.
///
/// False for a wrong password and for anything that is not a known hash.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    if is_bcrypt(stored) {
        return bcrypt::verify(plain, stored).unwrap_or(false);
    }
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Whether a stored value already looks like a hash rather than plaintext.
pub fn is_hashed(stored: &str) -> bool {
    is_bcrypt(stored) || PasswordHash::new(stored).is_ok()
}

/// Legacy hashes that should be replaced with argon2 once the plaintext is known.
pub fn needs_upgrade(stored: &str) -> bool {
    is_bcrypt(stored)
}

/// Modular-crypt bcrypt: `$2a$`, `$2b$` or `$2y$`, a two-digit cost, then salt and digest.
fn is_bcrypt(stored: &str) -> bool {
    let Some(rest) = ["$2a$", "$2b$", "$2y$"].iter().find_map(|prefix| stored.strip_prefix(prefix)) else {
        return false;
    };
    let bytes = rest.as_bytes();
    bytes.len() > 3
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_digit()
        && bytes[2] == b'$'
        && bytes[3..].iter().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'/'))
}
