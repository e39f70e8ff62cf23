//! Cryptographic building blocks: AEAD, PEM, RSA signatures and nonces.

pub mod aead;
pub mod nonce;
pub mod pem;
pub mod sign;

pub use aead::{decrypt_aes_256_gcm, AeadCipher, AeadError, EncryptedResource};
pub use nonce::generate_nonce;
pub use pem::{format_private_key, load_private_key, PlatformCertificate};
pub use sign::{sign_sha256_with_rsa, verify_sha256_with_rsa, SignatureError};
