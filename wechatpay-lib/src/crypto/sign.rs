//! RSA-SHA256 (PKCS#1 v1.5) signing primitives.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// Signature verification error.
///
/// Deliberately coarse: a malformed signature and a mismatching one are
/// reported the same way apart from the message.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signature is not valid base64")]
    Encoding,
    #[error("signature has invalid length or structure")]
    Malformed,
    #[error("signature does not match message")]
    Mismatch,
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Sign the UTF-8 bytes of `message` and return the base64 signature.
///
/// PKCS#1 v1.5 is deterministic: the same key and message always give the
/// same signature.
pub fn sign_sha256_with_rsa(
    message: &str,
    private_key: &RsaPrivateKey,
) -> Result<String, SignatureError> {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key
        .try_sign(message.as_bytes())
        .map_err(|e| SignatureError::Signing(e.to_string()))?;
    Ok(STANDARD.encode(signature.to_bytes()))
}

/// Verify a base64 signature over the UTF-8 bytes of `message`.
pub fn verify_sha256_with_rsa(
    message: &str,
    signature_b64: &str,
    public_key: &RsaPublicKey,
) -> Result<(), SignatureError> {
    let raw = STANDARD
        .decode(signature_b64)
        .map_err(|_| SignatureError::Encoding)?;
    let signature = Signature::try_from(raw.as_slice()).map_err(|_| SignatureError::Malformed)?;

    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(message.as_bytes(), &signature)
        .map_err(|_| SignatureError::Mismatch)
}
