//! AES-256-GCM codec for sensitive gateway payloads.
//!
//! Platform certificates and notification resources arrive as an
//! [`EncryptedResource`]: a 12-byte nonce, base64 ciphertext (with the 16-byte
//! GCM tag appended) and an associated-data string. The key is the merchant's
//! 32-byte API v3 key, used verbatim.
//!
//! # Wire Format
//!
//! ```text
//! {"algorithm": "AEAD_AES_256_GCM", "nonce": "...", "ciphertext": "<base64>", "associated_data": "..."}
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Size of the API v3 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits for GCM).
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes.
const TAG_SIZE: usize = 16;

/// Algorithm label the gateway attaches to encrypted resources.
pub const AEAD_AES_256_GCM: &str = "AEAD_AES_256_GCM";

/// AEAD error types.
#[derive(Debug, thiserror::Error)]
pub enum AeadError {
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonceLength(usize),
    #[error("malformed ciphertext: {0}")]
    InvalidCiphertext(String),
    #[error("decryption failed: wrong key or tampered payload")]
    DecryptFailed,
    #[error("encryption failed")]
    EncryptFailed,
    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,
}

/// Result type for AEAD operations.
pub type AeadResult<T> = Result<T, AeadError>;

/// Encrypted payload as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResource {
    /// Cipher label, normally [`AEAD_AES_256_GCM`].
    #[serde(default)]
    pub algorithm: String,
    /// 12-character nonce.
    pub nonce: String,
    /// Base64 ciphertext including the GCM tag.
    pub ciphertext: String,
    /// Associated data bound into the tag.
    #[serde(default)]
    pub associated_data: String,
    /// Original resource type, present on notification resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
}

/// AES-256-GCM cipher keyed by a merchant API v3 key.
///
/// # Example
///
/// ```
/// use wechatpay_lib::crypto::aead::AeadCipher;
///
/// let cipher = AeadCipher::new("0123456789abcdefghijklmnopqrstuv").unwrap();
/// let resource = cipher.encrypt("a1b2c3d4e5f6", "{\"ok\":true}", "transaction").unwrap();
/// let plaintext = cipher.decrypt_resource(&resource).unwrap();
/// assert_eq!(plaintext, "{\"ok\":true}");
/// ```
#[derive(Clone)]
pub struct AeadCipher {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl AeadCipher {
    /// Create a cipher from the API v3 key text.
    ///
    /// The key is used as raw bytes and must be exactly 32 bytes long.
    pub fn new(api_v3_key: &str) -> AeadResult<Self> {
        let bytes = api_v3_key.as_bytes();
        if bytes.len() != KEY_SIZE {
            return Err(AeadError::InvalidKeyLength(bytes.len()));
        }
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    fn cipher(&self) -> AeadResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key.as_slice())
            .map_err(|_| AeadError::InvalidKeyLength(self.key.len()))
    }

    /// Decrypt a base64 ciphertext bound to `nonce` and `associated_data`.
    ///
    /// # Errors
    ///
    /// Fails on a nonce of the wrong length, undecodable base64, a ciphertext
    /// shorter than the tag, any authentication failure, or a non-UTF-8
    /// plaintext. No partial output is ever returned.
    pub fn decrypt(
        &self,
        nonce: &str,
        ciphertext_b64: &str,
        associated_data: &str,
    ) -> AeadResult<String> {
        let nonce_bytes = nonce.as_bytes();
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(AeadError::InvalidNonceLength(nonce_bytes.len()));
        }

        let data = STANDARD
            .decode(ciphertext_b64)
            .map_err(|e| AeadError::InvalidCiphertext(e.to_string()))?;
        if data.len() < TAG_SIZE {
            return Err(AeadError::InvalidCiphertext(format!(
                "{} bytes is shorter than the authentication tag",
                data.len()
            )));
        }

        let plaintext = self
            .cipher()?
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: &data,
                    aad: associated_data.as_bytes(),
                },
            )
            .map_err(|_| AeadError::DecryptFailed)?;

        String::from_utf8(plaintext).map_err(|_| AeadError::InvalidUtf8)
    }

    /// Decrypt an [`EncryptedResource`].
    pub fn decrypt_resource(&self, resource: &EncryptedResource) -> AeadResult<String> {
        self.decrypt(
            &resource.nonce,
            &resource.ciphertext,
            &resource.associated_data,
        )
    }

    /// Encrypt `plaintext` into an [`EncryptedResource`].
    ///
    /// The caller supplies the nonce and must never reuse it under the same key.
    pub fn encrypt(
        &self,
        nonce: &str,
        plaintext: &str,
        associated_data: &str,
    ) -> AeadResult<EncryptedResource> {
        let nonce_bytes = nonce.as_bytes();
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(AeadError::InvalidNonceLength(nonce_bytes.len()));
        }

        let ciphertext = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: associated_data.as_bytes(),
                },
            )
            .map_err(|_| AeadError::EncryptFailed)?;

        Ok(EncryptedResource {
            algorithm: AEAD_AES_256_GCM.to_string(),
            nonce: nonce.to_string(),
            ciphertext: STANDARD.encode(ciphertext),
            associated_data: associated_data.to_string(),
            original_type: None,
        })
    }
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadCipher").finish_non_exhaustive()
    }
}

/// One-shot decryption with an API v3 key.
pub fn decrypt_aes_256_gcm(
    api_v3_key: &str,
    nonce: &str,
    ciphertext_b64: &str,
    associated_data: &str,
) -> AeadResult<String> {
    AeadCipher::new(api_v3_key)?.decrypt(nonce, ciphertext_b64, associated_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdefghijklmnopqrstuv";
    const NONCE: &str = "a1b2c3d4e5f6";

    // Produced outside this crate with a reference AES-GCM implementation.
    const REFERENCE_CIPHERTEXT: &str =
        "lvRhbeTGWQUmTzHKEWjtbFrk8+mTHnHS1e/1CMN+j/8JA1yVWTD7Y0TxOMgPwst93rT4EdHkxgn3Vc+pFwoOeUGJuA==";
    const REFERENCE_PLAINTEXT: &str = r#"{"out_trade_no":"ORDER123","trade_state":"SUCCESS"}"#;

    #[test]
    fn test_decrypt_reference_vector() {
        let plaintext =
            decrypt_aes_256_gcm(KEY, NONCE, REFERENCE_CIPHERTEXT, "transaction").unwrap();
        assert_eq!(plaintext, REFERENCE_PLAINTEXT);
    }

    #[test]
    fn test_wrong_associated_data_fails() {
        let cipher = AeadCipher::new(KEY).unwrap();
        let result = cipher.decrypt(NONCE, REFERENCE_CIPHERTEXT, "transactioN");
        assert!(matches!(result, Err(AeadError::DecryptFailed)));
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let cipher = AeadCipher::new(KEY).unwrap();
        let result = cipher.decrypt("a1b2c3d4e5f7", REFERENCE_CIPHERTEXT, "transaction");
        assert!(matches!(result, Err(AeadError::DecryptFailed)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = AeadCipher::new(KEY).unwrap();
        let mut raw = STANDARD.decode(REFERENCE_CIPHERTEXT).unwrap();
        raw[3] ^= 0x01;
        let tampered = STANDARD.encode(raw);

        let result = cipher.decrypt(NONCE, &tampered, "transaction");
        assert!(matches!(result, Err(AeadError::DecryptFailed)));
    }

    #[test]
    fn test_invalid_key_and_nonce_lengths() {
        assert!(matches!(
            AeadCipher::new("too-short"),
            Err(AeadError::InvalidKeyLength(9))
        ));

        let cipher = AeadCipher::new(KEY).unwrap();
        assert!(matches!(
            cipher.decrypt("short", REFERENCE_CIPHERTEXT, ""),
            Err(AeadError::InvalidNonceLength(5))
        ));
    }

    #[test]
    fn test_malformed_ciphertext_rejected() {
        let cipher = AeadCipher::new(KEY).unwrap();
        assert!(matches!(
            cipher.decrypt(NONCE, "not base64!!", ""),
            Err(AeadError::InvalidCiphertext(_))
        ));
        assert!(matches!(
            cipher.decrypt(NONCE, &STANDARD.encode([0u8; 8]), ""),
            Err(AeadError::InvalidCiphertext(_))
        ));
    }

    #[test]
    fn test_encrypt_matches_reference() {
        let cipher = AeadCipher::new(KEY).unwrap();
        let resource = cipher
            .encrypt(NONCE, REFERENCE_PLAINTEXT, "transaction")
            .unwrap();
        assert_eq!(resource.ciphertext, REFERENCE_CIPHERTEXT);
        assert_eq!(resource.algorithm, AEAD_AES_256_GCM);
    }

    #[test]
    fn test_resource_deserializes_from_gateway_shape() {
        let json = serde_json::json!({
            "algorithm": "AEAD_AES_256_GCM",
            "nonce": NONCE,
            "ciphertext": REFERENCE_CIPHERTEXT,
            "associated_data": "transaction",
            "original_type": "transaction"
        });
        let resource: EncryptedResource = serde_json::from_value(json).unwrap();
        let cipher = AeadCipher::new(KEY).unwrap();
        assert_eq!(cipher.decrypt_resource(&resource).unwrap(), REFERENCE_PLAINTEXT);
    }
}
