//! Nonce generation for request signatures.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Length of generated nonces.
pub const NONCE_LENGTH: usize = 32;

/// Generate a 32-character alphanumeric nonce from the operating system CSPRNG.
pub fn generate_nonce() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}
