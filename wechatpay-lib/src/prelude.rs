//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use wechatpay_lib::prelude::*;
//! ```
//!
//! ## What's Included
//!
//! - Error types: `WechatPayError`, `WechatPayErrorCode`, `Result`
//! - Configuration: `ClientConfig`, `MerchantConfig`
//! - Client: `Client`, `ApiResponse`, `HttpTransport`, `Transport`
//! - Auth traits and implementations
//! - Certificates: `DownloaderRegistry`, `CertificateDownloader`, `PlatformCertificate`
//! - Notifications: `NotifyHandler`, `ParsedNotification`

// Error handling
pub use crate::errors::{WechatPayError, WechatPayErrorCode};
pub use crate::Result;

// Configuration
pub use crate::config::{ClientConfig, MerchantConfig};

// Client and transport
pub use crate::client::{ApiResponse, Client};
pub use crate::transport::{HttpTransport, Transport};

// Signing and validation
pub use crate::auth::{
    CertificateVisitor, Credential, Sha256WithRsaSigner, Sha256WithRsaVerifier, Signer, Validator,
    Verifier, WechatPayValidator,
};

// Certificates
pub use crate::certificates::{CertificateDownloader, DownloaderRegistry};
pub use crate::crypto::{AeadCipher, PlatformCertificate};

// Notifications
pub use crate::notify::{NotifyHandler, ParsedNotification};
