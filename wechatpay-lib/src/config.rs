//! Configuration types for the WeChat Pay client.
//!
//! All configurations can be overridden via environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `WECHATPAY_API_URL` | [`ClientConfig::api_base_url`] |
//! | `WECHATPAY_TIMEOUT_SECS` | [`ClientConfig::timeout_secs`] |
//! | `WECHATPAY_MAX_CLOCK_SKEW_SECS` | [`ClientConfig::max_clock_skew_secs`] (`0` disables) |
//! | `WECHATPAY_MCH_ID` | [`MerchantConfig::mch_id`] |
//! | `WECHATPAY_MCH_CERT_SERIAL_NO` | [`MerchantConfig::mch_cert_serial_no`] |
//! | `WECHATPAY_MCH_PRIVATE_KEY` / `WECHATPAY_MCH_PRIVATE_KEY_PATH` | [`MerchantConfig::mch_private_key`] |
//! | `WECHATPAY_MCH_API_V3_KEY` | [`MerchantConfig::mch_api_v3_key`] |

use std::time::Duration;

use serde::Deserialize;

/// Production API server.
pub const WECHAT_PAY_API_SERVER: &str = "https://api.mch.weixin.qq.com";

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default tolerated distance between a response timestamp and local time.
pub const DEFAULT_MAX_CLOCK_SKEW_SECS: u64 = 300;

/// Transport-level client configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// API base URL without trailing path.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum accepted age of `Wechatpay-Timestamp`, in seconds.
    ///
    /// `None` disables the freshness check.
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew_secs: Option<u64>,
}

fn default_api_base_url() -> String {
    WECHAT_PAY_API_SERVER.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_clock_skew() -> Option<u64> {
    Some(DEFAULT_MAX_CLOCK_SKEW_SECS)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            timeout_secs: default_timeout(),
            max_clock_skew_secs: default_max_clock_skew(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for a custom API base URL.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set or disable the response freshness window.
    pub fn with_max_clock_skew(mut self, secs: Option<u64>) -> Self {
        self.max_clock_skew_secs = secs;
        self
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the full URL for an API path such as `/v3/certificates`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("WECHATPAY_API_URL") {
            config.api_base_url = url;
        }

        if let Ok(timeout) = std::env::var("WECHATPAY_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.timeout_secs = secs;
            }
        }

        if let Ok(skew) = std::env::var("WECHATPAY_MAX_CLOCK_SKEW_SECS") {
            if let Ok(secs) = skew.parse::<u64>() {
                config.max_clock_skew_secs = (secs > 0).then_some(secs);
            }
        }

        config
    }
}

/// Merchant identity and secrets.
#[derive(Clone, Deserialize)]
pub struct MerchantConfig {
    /// Merchant id (`mchid`).
    pub mch_id: String,

    /// Serial number of the merchant API certificate.
    pub mch_cert_serial_no: String,

    /// Merchant API private key (PEM or bare base64 body).
    pub mch_private_key: String,

    /// Merchant API v3 key (32 bytes).
    pub mch_api_v3_key: String,
}

impl MerchantConfig {
    /// Create a merchant configuration.
    pub fn new(
        mch_id: impl Into<String>,
        mch_cert_serial_no: impl Into<String>,
        mch_private_key: impl Into<String>,
        mch_api_v3_key: impl Into<String>,
    ) -> Self {
        Self {
            mch_id: mch_id.into(),
            mch_cert_serial_no: mch_cert_serial_no.into(),
            mch_private_key: mch_private_key.into(),
            mch_api_v3_key: mch_api_v3_key.into(),
        }
    }

    /// Load merchant configuration from environment variables.
    ///
    /// Returns `None` if any required variable is missing or the key file
    /// cannot be read.
    pub fn from_env() -> Option<Self> {
        let mch_id = std::env::var("WECHATPAY_MCH_ID").ok()?;
        let serial = std::env::var("WECHATPAY_MCH_CERT_SERIAL_NO").ok()?;
        let api_v3_key = std::env::var("WECHATPAY_MCH_API_V3_KEY").ok()?;

        let private_key = match std::env::var("WECHATPAY_MCH_PRIVATE_KEY") {
            Ok(key) => key,
            Err(_) => {
                let path = std::env::var("WECHATPAY_MCH_PRIVATE_KEY_PATH").ok()?;
                std::fs::read_to_string(path).ok()?
            }
        };

        Some(Self::new(mch_id, serial, private_key, api_v3_key))
    }
}

impl std::fmt::Debug for MerchantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerchantConfig")
            .field("mch_id", &self.mch_id)
            .field("mch_cert_serial_no", &self.mch_cert_serial_no)
            .field("mch_private_key", &"<redacted>")
            .field("mch_api_v3_key", &"<redacted>")
            .finish()
    }
}
