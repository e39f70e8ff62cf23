//! Asynchronous notification (callback) handling.
//!
//! The gateway posts signed JSON envelopes whose `resource` is AEAD-encrypted
//! with the merchant's API v3 key. A notification is only decrypted after its
//! signature has been validated.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::validator::{Validator, WechatPayValidator};
use crate::auth::verifier::Verifier;
use crate::crypto::aead::{AeadCipher, EncryptedResource};
use crate::{Result, WechatPayError};

/// Notification envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyRequest {
    /// Notification id.
    pub id: String,
    /// Creation time (RFC 3339).
    pub create_time: String,
    /// Event type, e.g. `TRANSACTION.SUCCESS`.
    pub event_type: String,
    /// Resource type, normally `encrypt-resource`.
    pub resource_type: String,
    /// Human-readable summary.
    #[serde(default)]
    pub summary: String,
    /// Encrypted payload.
    pub resource: EncryptedResource,
}

/// A validated and decrypted notification.
#[derive(Clone, Debug)]
pub struct ParsedNotification {
    /// The envelope as received.
    pub request: NotifyRequest,
    /// Decrypted resource JSON.
    pub plaintext: String,
}

impl ParsedNotification {
    /// Deserialize the decrypted resource.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.plaintext)?)
    }
}

/// Validates and decrypts notifications for one merchant.
#[derive(Clone, Debug)]
pub struct NotifyHandler {
    cipher: AeadCipher,
    validator: WechatPayValidator,
}

impl NotifyHandler {
    /// Create a handler.
    ///
    /// Fails if `api_v3_key` is not 32 bytes.
    pub fn new(api_v3_key: &str, verifier: Arc<dyn Verifier>) -> Result<Self> {
        let cipher = AeadCipher::new(api_v3_key)
            .map_err(|e| WechatPayError::configuration("mch_api_v3_key", e.to_string()))?;
        Ok(Self {
            cipher,
            validator: WechatPayValidator::new(verifier),
        })
    }

    /// Set or disable the timestamp freshness window.
    pub fn with_max_clock_skew(mut self, secs: Option<u64>) -> Self {
        self.validator = self.validator.with_max_clock_skew(secs);
        self
    }

    /// Validate `body` against `headers`, then decrypt its resource.
    #[tracing::instrument(skip_all)]
    pub fn parse_notify_request(&self, headers: &HeaderMap, body: &str) -> Result<ParsedNotification> {
        self.validator.validate(headers, body)?;

        let request: NotifyRequest = serde_json::from_str(body)?;
        let plaintext = self.cipher.decrypt_resource(&request.resource)?;
        tracing::debug!(id = %request.id, event_type = %request.event_type, "notification accepted");

        Ok(ParsedNotification { request, plaintext })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verifier::Sha256WithRsaVerifier;
    use crate::test_utils::{
        certificate_map, notification_body, signed_headers, API_V3_KEY, PLATFORM_A_KEY_PEM,
        PLATFORM_A_SERIAL, PLATFORM_B_KEY_PEM,
    };
    use crate::WechatPayErrorCode;

    const RESOURCE: &str = r#"{"out_trade_no":"ORDER123","trade_state":"SUCCESS"}"#;

    #[derive(Deserialize)]
    struct Transaction {
        out_trade_no: String,
        trade_state: String,
    }

    fn handler() -> NotifyHandler {
        let verifier = Sha256WithRsaVerifier::new(Arc::new(certificate_map(&[PLATFORM_A_SERIAL])));
        NotifyHandler::new(API_V3_KEY, Arc::new(verifier)).unwrap()
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn test_parse_valid_notification() {
        let body = notification_body(API_V3_KEY, RESOURCE);
        let headers = signed_headers(PLATFORM_A_KEY_PEM, PLATFORM_A_SERIAL, now(), &body);

        let parsed = handler().parse_notify_request(&headers, &body).unwrap();
        assert_eq!(parsed.request.event_type, "TRANSACTION.SUCCESS");
        assert_eq!(parsed.plaintext, RESOURCE);

        let tx: Transaction = parsed.decode().unwrap();
        assert_eq!(tx.out_trade_no, "ORDER123");
        assert_eq!(tx.trade_state, "SUCCESS");
    }

    #[test]
    fn test_forged_notification_is_not_decrypted() {
        let body = notification_body(API_V3_KEY, RESOURCE);
        let headers = signed_headers(PLATFORM_B_KEY_PEM, PLATFORM_A_SERIAL, now(), &body);

        let err = handler().parse_notify_request(&headers, &body).unwrap_err();
        assert_eq!(err.code(), WechatPayErrorCode::ValidationFailed);
    }

    #[test]
    fn test_wrong_api_v3_key_fails_decryption() {
        let body = notification_body("ZYXWVUTSRQPONMLKJIHGFEDCBA987654", RESOURCE);
        let headers = signed_headers(PLATFORM_A_KEY_PEM, PLATFORM_A_SERIAL, now(), &body);

        let err = handler().parse_notify_request(&headers, &body).unwrap_err();
        assert_eq!(err.code(), WechatPayErrorCode::Decryption);
    }

    #[test]
    fn test_invalid_key_length() {
        let verifier = Sha256WithRsaVerifier::new(Arc::new(certificate_map(&[])));
        assert!(NotifyHandler::new("too-short", Arc::new(verifier)).is_err());
    }
}
