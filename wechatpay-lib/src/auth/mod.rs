//! Request signing and response validation.

pub mod credential;
pub mod signer;
pub mod validator;
pub mod verifier;

pub use credential::{build_request_message, Credential, AUTHORIZATION_SCHEME_PREFIX};
pub use signer::{Sha256WithRsaSigner, SignatureResult, Signer};
pub use validator::{
    build_response_message, NullValidator, Validator, WechatPayValidator, REQUEST_ID,
    WECHATPAY_NONCE, WECHATPAY_SERIAL, WECHATPAY_SIGNATURE, WECHATPAY_TIMESTAMP,
};
pub use verifier::{CertificateVisitor, Sha256WithRsaVerifier, Verifier};
