//! Platform signature verification.

use std::collections::HashMap;
use std::sync::Arc;

use crate::crypto::pem::{normalize_serial, PlatformCertificate};
use crate::crypto::sign::verify_sha256_with_rsa;
use crate::{Result, WechatPayError};

/// Read access to platform certificates by serial number.
///
/// Implementors must answer from a consistent view: a lookup never observes
/// a half-applied refresh.
pub trait CertificateVisitor: Send + Sync {
    /// Look up a certificate by serial number.
    fn get(&self, serial_no: &str) -> Option<Arc<PlatformCertificate>>;
}

/// Keys are expected in normalized form, as produced by
/// [`PlatformCertificate::serial_no`]; lookups ignore case and leading zeros.
impl CertificateVisitor for HashMap<String, Arc<PlatformCertificate>> {
    fn get(&self, serial_no: &str) -> Option<Arc<PlatformCertificate>> {
        HashMap::get(self, serial_no)
            .or_else(|| HashMap::get(self, &normalize_serial(serial_no)))
            .cloned()
    }
}

/// Checks a signature over a message against a platform certificate.
pub trait Verifier: Send + Sync {
    /// Verify `signature` (base64) over `message` using certificate `serial_no`.
    fn verify(&self, serial_no: &str, message: &str, signature: &str) -> Result<()>;
}

/// RSA-SHA256 verifier backed by a certificate source.
#[derive(Clone)]
pub struct Sha256WithRsaVerifier {
    certificates: Arc<dyn CertificateVisitor>,
}

impl Sha256WithRsaVerifier {
    /// Create a verifier reading certificates from `certificates`.
    pub fn new(certificates: Arc<dyn CertificateVisitor>) -> Self {
        Self { certificates }
    }
}

impl Verifier for Sha256WithRsaVerifier {
    fn verify(&self, serial_no: &str, message: &str, signature: &str) -> Result<()> {
        let certificate = self
            .certificates
            .get(serial_no)
            .ok_or_else(|| WechatPayError::CertificateNotFound {
                serial_no: serial_no.to_string(),
            })?;

        verify_sha256_with_rsa(message, signature, certificate.public_key())
            .map_err(|e| WechatPayError::verification(serial_no, e.to_string()))
    }
}

impl std::fmt::Debug for Sha256WithRsaVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sha256WithRsaVerifier").finish_non_exhaustive()
    }
}
