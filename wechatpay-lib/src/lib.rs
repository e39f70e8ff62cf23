//! WeChat Pay API v3 protocol layer.
//!
//! Signs outgoing requests with the merchant's RSA key, verifies responses and
//! notifications against the gateway's rotating platform certificates, and
//! decrypts AES-256-GCM protected payloads. Payment-product endpoints are left
//! to callers: they are plain JSON built on top of [`Client`].
//!
//! # Features
//!
//! - **Request signing**: `Authorization` headers with a fresh timestamp and nonce per call
//! - **Response validation**: fail-closed signature checks; a no-op validator exists only
//!   for certificate bootstrap and cannot be wired into business clients
//! - **Certificate management**: per-merchant downloaders with atomic snapshot refresh,
//!   grouped in an explicitly scoped [`DownloaderRegistry`]
//! - **Notifications**: validate then decrypt callback payloads
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wechatpay_lib::prelude::*;
//!
//! let merchant = MerchantConfig::from_env().expect("merchant configuration");
//! let registry = DownloaderRegistry::new(ClientConfig::from_env(), Arc::new(HttpTransport::new()?));
//! let client = Client::auto_auth(&merchant, &registry).await?;
//!
//! let response = client
//!     .post_json("/v3/pay/transactions/native", &serde_json::json!({
//!         "appid": "wxd678efh567hg6787",
//!         "mchid": merchant.mch_id,
//!         "description": "Image形象店-深圳腾大-QQ公仔",
//!         "out_trade_no": "1217752501201407033233368018",
//!         "notify_url": "https://www.weixin.qq.com/wxpay/pay.php",
//!         "amount": { "total": 100, "currency": "CNY" },
//!     }))
//!     .await?;
//! ```

pub mod auth;
pub mod certificates;
pub mod client;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod notify;
pub mod prelude;
pub mod transport;

/// Test utilities for protocol testing.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use auth::{
    CertificateVisitor, Credential, NullValidator, Sha256WithRsaSigner, Sha256WithRsaVerifier,
    SignatureResult, Signer, Validator, Verifier, WechatPayValidator,
};
pub use certificates::{CertificateDownloader, DownloaderRegistry, RegistryCertificateVisitor};
pub use client::{ApiResponse, Client};
pub use config::{ClientConfig, MerchantConfig};
pub use crypto::{AeadCipher, EncryptedResource, PlatformCertificate};
pub use errors::{WechatPayError, WechatPayErrorCode};
pub use notify::{NotifyHandler, NotifyRequest, ParsedNotification};
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

/// Common result alias for WeChat Pay operations.
pub type Result<T> = std::result::Result<T, WechatPayError>;

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("WechatPay-Rust/", env!("CARGO_PKG_VERSION"));
