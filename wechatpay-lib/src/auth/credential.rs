//! Authorization header construction.
//!
//! The request signature covers exactly five newline-terminated fields:
//!
//! ```text
//! METHOD\nPATH[?QUERY]\nTIMESTAMP\nNONCE\nBODY\n
//! ```

use std::sync::Arc;

use crate::auth::signer::{Sha256WithRsaSigner, Signer};
use crate::config::MerchantConfig;
use crate::crypto::nonce::generate_nonce;
use crate::Result;

/// Prefix of the `Authorization` scheme; the signer's algorithm completes it.
pub const AUTHORIZATION_SCHEME_PREFIX: &str = "WECHATPAY2-";

/// Build the canonical request message.
///
/// Fields are joined verbatim: no trimming, no reordering.
pub fn build_request_message(
    method: &str,
    url_path: &str,
    timestamp: i64,
    nonce: &str,
    body: &str,
) -> String {
    format!("{method}\n{url_path}\n{timestamp}\n{nonce}\n{body}\n")
}

/// Builds signed `Authorization` headers for outgoing requests.
#[derive(Clone)]
pub struct Credential {
    signer: Arc<dyn Signer>,
}

impl Credential {
    /// Create a credential around a signer.
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    /// Build an RSA credential from merchant configuration.
    pub fn from_merchant(merchant: &MerchantConfig) -> Result<Self> {
        let signer = Sha256WithRsaSigner::from_pem(
            merchant.mch_id.clone(),
            merchant.mch_cert_serial_no.clone(),
            &merchant.mch_private_key,
        )?;
        Ok(Self::new(Arc::new(signer)))
    }

    /// The underlying signer.
    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    /// Authorization scheme, e.g. `WECHATPAY2-SHA256-RSA2048`.
    pub fn auth_type(&self) -> String {
        format!("{AUTHORIZATION_SCHEME_PREFIX}{}", self.signer.algorithm())
    }

    /// Build an `Authorization` header value for one request attempt.
    ///
    /// Every call draws a fresh timestamp and nonce, so a retried request is
    /// signed independently.
    pub fn authorization_header(&self, method: &str, url_path: &str, body: &str) -> Result<String> {
        let timestamp = chrono::Utc::now().timestamp();
        let nonce = generate_nonce();
        self.authorization_header_at(method, url_path, body, timestamp, &nonce)
    }

    pub(crate) fn authorization_header_at(
        &self,
        method: &str,
        url_path: &str,
        body: &str,
        timestamp: i64,
        nonce: &str,
    ) -> Result<String> {
        let message =
            build_request_message(&method.to_ascii_uppercase(), url_path, timestamp, nonce, body);
        let result = self.signer.sign(&message)?;

        Ok(format!(
            "{} mchid=\"{}\",nonce_str=\"{}\",signature=\"{}\",timestamp=\"{}\",serial_no=\"{}\"",
            self.auth_type(),
            result.mch_id,
            nonce,
            result.signature,
            timestamp,
            result.cert_serial_no,
        ))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("auth_type", &self.auth_type())
            .finish()
    }
}
