//! Error types for WeChat Pay protocol operations.
//!
//! Every failure surfaced by the crate is a [`WechatPayError`]. The variants
//! follow the protocol's failure classes: configuration problems are fatal at
//! construction, transport failures are passed through for the caller to
//! retry, and every trust failure (signature, certificate, header) fails
//! closed.

use std::fmt;

use crate::crypto::aead::AeadError;

/// Error codes for FFI and service integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum WechatPayErrorCode {
    /// Malformed key material or configuration
    Configuration = 1000,
    /// Transport/network layer error
    Transport = 2000,
    /// Connection failed
    ConnectionFailed = 2001,
    /// Connection timeout
    ConnectionTimeout = 2002,
    /// Gateway answered with a non-2xx status
    Api = 3000,
    /// No platform certificate for the requested serial number
    CertificateNotFound = 4000,
    /// Signature did not verify
    VerificationFailed = 4001,
    /// Response or notification failed validation
    ValidationFailed = 4002,
    /// AEAD decryption failed
    Decryption = 5000,
    /// Certificate refresh produced no usable certificate
    EmptyCertificateSet = 6000,
    /// Serialization error
    Serialization = 7000,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for WeChat Pay operations.
#[derive(Debug)]
pub enum WechatPayError {
    /// Invalid configuration or key material.
    Configuration {
        /// Offending field or input
        field: String,
        /// Reason for rejection
        reason: String,
    },

    /// Transport/network layer error.
    Transport(String),

    /// Connection failed.
    ConnectionFailed {
        /// Target URL
        target: String,
        /// Underlying error message
        reason: String,
    },

    /// Connection timeout.
    ConnectionTimeout {
        /// Operation that timed out
        operation: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// The gateway answered with a status outside 200..=299.
    Api {
        /// HTTP status code
        status: u16,
        /// `Request-ID` response header, if present
        request_id: Option<String>,
        /// Raw response body for diagnostics
        body: String,
    },

    /// No platform certificate is known for this serial number.
    CertificateNotFound {
        /// Requested serial number
        serial_no: String,
    },

    /// Signature verification failed.
    VerificationFailed {
        /// Serial number of the certificate used
        serial_no: String,
        /// Failure reason
        reason: String,
    },

    /// A response or notification did not pass validation.
    ///
    /// Carries only diagnostics, never signature material.
    ValidationFailed {
        /// `Wechatpay-Serial` header value, if present
        serial_no: Option<String>,
        /// `Request-ID` header value, if present
        request_id: Option<String>,
        /// Failure reason
        reason: String,
    },

    /// AEAD decryption failed.
    Decryption(AeadError),

    /// A certificate refresh produced no usable certificate.
    EmptyCertificateSet {
        /// Merchant whose refresh failed
        mch_id: String,
    },

    /// Serialization/deserialization error.
    Serialization(String),

    /// Internal/unexpected error.
    Internal(String),
}

impl WechatPayError {
    /// Get the error code for FFI/service integration.
    pub fn code(&self) -> WechatPayErrorCode {
        match self {
            Self::Configuration { .. } => WechatPayErrorCode::Configuration,
            Self::Transport(_) => WechatPayErrorCode::Transport,
            Self::ConnectionFailed { .. } => WechatPayErrorCode::ConnectionFailed,
            Self::ConnectionTimeout { .. } => WechatPayErrorCode::ConnectionTimeout,
            Self::Api { .. } => WechatPayErrorCode::Api,
            Self::CertificateNotFound { .. } => WechatPayErrorCode::CertificateNotFound,
            Self::VerificationFailed { .. } => WechatPayErrorCode::VerificationFailed,
            Self::ValidationFailed { .. } => WechatPayErrorCode::ValidationFailed,
            Self::Decryption(_) => WechatPayErrorCode::Decryption,
            Self::EmptyCertificateSet { .. } => WechatPayErrorCode::EmptyCertificateSet,
            Self::Serialization(_) => WechatPayErrorCode::Serialization,
            Self::Internal(_) => WechatPayErrorCode::Internal,
        }
    }

    /// Returns true if the caller may reasonably retry the operation.
    ///
    /// A retry must go through [`Client::request`](crate::Client::request)
    /// again so that it carries a fresh timestamp and nonce.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::ConnectionFailed { .. } | Self::ConnectionTimeout { .. } => {
                true
            }
            Self::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// Create a configuration error.
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a validation error without signature material.
    pub fn validation(
        serial_no: Option<&str>,
        request_id: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ValidationFailed {
            serial_no: serial_no.map(str::to_string),
            request_id: request_id.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// Create a verification error.
    pub fn verification(serial_no: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::VerificationFailed {
            serial_no: serial_no.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for WechatPayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { field, reason } => {
                write!(f, "invalid configuration {}: {}", field, reason)
            }
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::ConnectionFailed { target, reason } => {
                write!(f, "connection to {} failed: {}", target, reason)
            }
            Self::ConnectionTimeout {
                operation,
                timeout_ms,
            } => {
                write!(f, "{} timed out after {}ms", operation, timeout_ms)
            }
            Self::Api {
                status,
                request_id,
                body,
            } => match request_id {
                Some(id) => write!(f, "api error {} (request-id {}): {}", status, id, body),
                None => write!(f, "api error {}: {}", status, body),
            },
            Self::CertificateNotFound { serial_no } => {
                write!(f, "certificate[{}] not found in verifier", serial_no)
            }
            Self::VerificationFailed { serial_no, reason } => {
                write!(f, "verify failed serial=[{}]: {}", serial_no, reason)
            }
            Self::ValidationFailed {
                serial_no,
                request_id,
                reason,
            } => write!(
                f,
                "validation failed serial=[{}] request-id=[{}]: {}",
                serial_no.as_deref().unwrap_or(""),
                request_id.as_deref().unwrap_or(""),
                reason
            ),
            Self::Decryption(err) => write!(f, "decryption error: {}", err),
            Self::EmptyCertificateSet { mch_id } => {
                write!(f, "no certificate downloaded for merchant {}", mch_id)
            }
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for WechatPayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decryption(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WechatPayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<AeadError> for WechatPayError {
    fn from(err: AeadError) -> Self {
        Self::Decryption(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = WechatPayError::ConnectionTimeout {
            operation: "GET /v3/certificates".to_string(),
            timeout_ms: 30_000,
        };
        assert_eq!(err.code(), WechatPayErrorCode::ConnectionTimeout);
        assert!(err.is_retryable());

        let err = WechatPayError::verification("ABC", "bad signature");
        assert_eq!(err.code(), WechatPayErrorCode::VerificationFailed);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_api_error_retryable_by_status() {
        let api = |status| WechatPayError::Api {
            status,
            request_id: None,
            body: String::new(),
        };
        assert!(api(500).is_retryable());
        assert!(api(429).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(!api(401).is_retryable());
    }

    #[test]
    fn test_validation_display_has_diagnostics() {
        let err = WechatPayError::validation(Some("SERIAL1"), Some("req-42"), "signature mismatch");
        let msg = err.to_string();
        assert!(msg.contains("SERIAL1"));
        assert!(msg.contains("req-42"));
        assert_eq!(err.code(), WechatPayErrorCode::ValidationFailed);
    }

    #[test]
    fn test_decryption_conversion() {
        let err: WechatPayError = AeadError::DecryptFailed.into();
        assert_eq!(err.code(), WechatPayErrorCode::Decryption);
        assert!(std::error::Error::source(&err).is_some());
    }
}
