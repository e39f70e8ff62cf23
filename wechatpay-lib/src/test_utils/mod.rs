//! Test utilities for WeChat Pay protocol testing.
//!
//! Provides fixture keys and certificates, builders for signed responses,
//! certificate lists and notifications, and a scripted in-memory transport.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wechatpay_lib::test_utils::*;
//!
//! let transport = Arc::new(MockTransport::new());
//! transport.push(unsigned_response(
//!     200,
//!     &certificate_list_body(API_V3_KEY, &[(PLATFORM_A_SERIAL, PLATFORM_A_CERT_PEM)]),
//! ));
//! ```

mod fixtures;
mod mock_transport;

pub use fixtures::*;
pub use mock_transport::MockTransport;
