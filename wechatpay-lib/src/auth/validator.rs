//! Response and notification validation.
//!
//! Inbound signatures cover three newline-terminated fields:
//!
//! ```text
//! TIMESTAMP\nNONCE\nBODY\n
//! ```
//!
//! [`WechatPayValidator`] is the only validator business traffic can use.
//! [`NullValidator`] skips every check and is accepted solely by the
//! certificate bootstrap path inside this crate.

use std::sync::Arc;

use reqwest::header::HeaderMap;

use crate::auth::verifier::Verifier;
use crate::config::DEFAULT_MAX_CLOCK_SKEW_SECS;
use crate::{Result, WechatPayError};

/// Response timestamp header.
pub const WECHATPAY_TIMESTAMP: &str = "Wechatpay-Timestamp";
/// Response nonce header.
pub const WECHATPAY_NONCE: &str = "Wechatpay-Nonce";
/// Response signature header.
pub const WECHATPAY_SIGNATURE: &str = "Wechatpay-Signature";
/// Serial number of the platform certificate that signed the response.
pub const WECHATPAY_SERIAL: &str = "Wechatpay-Serial";
/// Gateway request id, used for diagnostics only.
pub const REQUEST_ID: &str = "Request-ID";

/// Build the canonical response/notification message.
pub fn build_response_message(timestamp: &str, nonce: &str, body: &str) -> String {
    format!("{timestamp}\n{nonce}\n{body}\n")
}

/// Validates an inbound message given its headers and raw body.
pub trait Validator: Send + Sync {
    /// Fail unless `body` is authentically signed by the platform.
    fn validate(&self, headers: &HeaderMap, body: &str) -> Result<()>;
}

/// Signature-checking validator.
#[derive(Clone)]
pub struct WechatPayValidator {
    verifier: Arc<dyn Verifier>,
    max_clock_skew: Option<u64>,
}

impl WechatPayValidator {
    /// Create a validator with the default freshness window.
    pub fn new(verifier: Arc<dyn Verifier>) -> Self {
        Self {
            verifier,
            max_clock_skew: Some(DEFAULT_MAX_CLOCK_SKEW_SECS),
        }
    }

    /// Set or disable the allowed distance between `Wechatpay-Timestamp` and now.
    pub fn with_max_clock_skew(mut self, secs: Option<u64>) -> Self {
        self.max_clock_skew = secs;
        self
    }

    fn check(&self, headers: &HeaderMap, body: &str, serial_no: Option<&str>) -> std::result::Result<(), String> {
        let serial_no = serial_no.ok_or_else(|| format!("missing header {}", WECHATPAY_SERIAL))?;
        let signature = required(headers, WECHATPAY_SIGNATURE)?;
        let timestamp = required(headers, WECHATPAY_TIMESTAMP)?;
        let nonce = required(headers, WECHATPAY_NONCE)?;

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| format!("malformed {}: {}", WECHATPAY_TIMESTAMP, timestamp))?;
        if let Some(max) = self.max_clock_skew {
            let skew = chrono::Utc::now().timestamp().abs_diff(ts);
            if skew > max {
                return Err(format!("timestamp {} outside allowed skew of {}s", ts, max));
            }
        }

        let message = build_response_message(timestamp, nonce, body);
        self.verifier
            .verify(serial_no, &message, signature)
            .map_err(|e| e.to_string())
    }
}

impl Validator for WechatPayValidator {
    fn validate(&self, headers: &HeaderMap, body: &str) -> Result<()> {
        let serial_no = header_str(headers, WECHATPAY_SERIAL);
        let request_id = header_str(headers, REQUEST_ID);

        self.check(headers, body, serial_no).map_err(|reason| {
            tracing::warn!(
                serial_no = serial_no.unwrap_or_default(),
                request_id = request_id.unwrap_or_default(),
                %reason,
                "response validation failed"
            );
            WechatPayError::validation(serial_no, request_id, reason)
        })
    }
}

impl std::fmt::Debug for WechatPayValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatPayValidator")
            .field("max_clock_skew", &self.max_clock_skew)
            .finish_non_exhaustive()
    }
}

/// Validator that accepts everything.
///
/// Only the certificate download path can wire this into a client: before
/// the first certificate arrives there is nothing to verify against.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullValidator;

impl Validator for NullValidator {
    fn validate(&self, _headers: &HeaderMap, _body: &str) -> Result<()> {
        Ok(())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn required<'a>(headers: &'a HeaderMap, name: &str) -> std::result::Result<&'a str, String> {
    header_str(headers, name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing header {}", name))
}
