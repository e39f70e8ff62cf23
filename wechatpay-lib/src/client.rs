//! Authenticated request orchestration.
//!
//! Every call goes through the same pipeline: sign, send, reject non-2xx,
//! validate. A response that fails validation never reaches the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wechatpay_lib::prelude::*;
//!
//! let registry = DownloaderRegistry::new(ClientConfig::default(), Arc::new(HttpTransport::new()?));
//! let client = Client::auto_auth(&merchant, &registry).await?;
//!
//! let order: serde_json::Value = client
//!     .get("/v3/pay/transactions/out-trade-no/ORDER123?mchid=1900000109")
//!     .await?
//!     .json()?;
//! ```

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::credential::Credential;
use crate::auth::signer::{SignatureResult, Signer};
use crate::auth::validator::{NullValidator, Validator, WechatPayValidator, REQUEST_ID};
use crate::auth::verifier::{Sha256WithRsaVerifier, Verifier};
use crate::certificates::registry::DownloaderRegistry;
use crate::config::{ClientConfig, MerchantConfig};
use crate::transport::{Transport, TransportRequest};
use crate::{Result, WechatPayError, USER_AGENT};

const JSON: &str = "application/json";

/// A validated API response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw body text, exactly as verified.
    pub body: String,
}

impl ApiResponse {
    /// Deserialize the body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// `Request-ID` header, if present.
    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

/// API client bound to one merchant identity.
///
/// The validator is part of the type. Business clients are always
/// `Client<WechatPayValidator>`; the unvalidated `Client<NullValidator>` can
/// only be built inside the crate for certificate bootstrap.
pub struct Client<V: Validator = WechatPayValidator> {
    config: ClientConfig,
    credential: Credential,
    validator: V,
    transport: Arc<dyn Transport>,
}

impl Client<WechatPayValidator> {
    /// Create a client that verifies responses with `verifier`.
    pub fn new(
        config: ClientConfig,
        credential: Credential,
        verifier: Arc<dyn Verifier>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let validator =
            WechatPayValidator::new(verifier).with_max_clock_skew(config.max_clock_skew_secs);
        Self {
            config,
            credential,
            validator,
            transport,
        }
    }

    /// Create a client whose verifier reads `merchant`'s certificates from the registry.
    ///
    /// The merchant does not need to be registered yet; lookups fail with
    /// [`WechatPayError::CertificateNotFound`] until it is.
    pub fn with_registry(merchant: &MerchantConfig, registry: &DownloaderRegistry) -> Result<Self> {
        let credential = Credential::from_merchant(merchant)?;
        let verifier = Sha256WithRsaVerifier::new(Arc::new(
            registry.certificate_visitor(&merchant.mch_id),
        ));
        Ok(Self::new(
            registry.config().clone(),
            credential,
            Arc::new(verifier),
            registry.transport(),
        ))
    }

    /// Register `merchant` if needed (downloading its certificates), then
    /// build a registry-backed client.
    pub async fn auto_auth(merchant: &MerchantConfig, registry: &DownloaderRegistry) -> Result<Self> {
        registry.register_if_absent(merchant).await?;
        Self::with_registry(merchant, registry)
    }
}

impl Client<NullValidator> {
    /// Unvalidated client for the first certificate download.
    pub(crate) fn bootstrap(
        config: ClientConfig,
        credential: Credential,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            credential,
            validator: NullValidator,
            transport,
        }
    }
}

impl<V: Validator> Client<V> {
    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Credential used to sign requests.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Sign an arbitrary message with the merchant key.
    ///
    /// Useful for parameters that must be signed outside a request, such as
    /// mini-program payment packages.
    pub fn sign(&self, message: &str) -> Result<SignatureResult> {
        self.credential.signer().sign(message)
    }

    /// Signed GET.
    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.request(Method::GET, url, None, HeaderMap::new()).await
    }

    /// Signed POST with a JSON body.
    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<ApiResponse> {
        let body = serde_json::to_string(body)?;
        self.request(Method::POST, url, Some(&body), HeaderMap::new())
            .await
    }

    /// Send one signed request and validate the response.
    ///
    /// `url` may be absolute or a path relative to the configured base URL.
    /// The body is signed exactly as sent. `headers` are added before the
    /// protocol headers, which take precedence.
    #[tracing::instrument(level = "debug", skip_all, fields(method = %method, url = %url))]
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&str>,
        headers: HeaderMap,
    ) -> Result<ApiResponse> {
        let url = self.absolute_url(url);
        let parsed = Url::parse(&url)
            .map_err(|e| WechatPayError::configuration("url", format!("{}: {}", url, e)))?;
        let signed_path = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };

        let authorization = self.credential.authorization_header(
            method.as_str(),
            &signed_path,
            body.unwrap_or_default(),
        )?;

        let mut request_headers = headers;
        insert_header(&mut request_headers, AUTHORIZATION, &authorization)?;
        insert_header(&mut request_headers, reqwest::header::USER_AGENT, USER_AGENT)?;
        insert_header(&mut request_headers, ACCEPT, JSON)?;
        if body.is_some() {
            insert_header(&mut request_headers, CONTENT_TYPE, JSON)?;
        }

        tracing::debug!(path = %signed_path, "sending request");
        let response = self
            .transport
            .execute(TransportRequest {
                method,
                url,
                headers: request_headers,
                body: body.map(str::to_string),
                timeout: self.config.timeout(),
            })
            .await?;
        tracing::debug!(status = response.status, "received response");

        if !response.is_success() {
            let request_id = response
                .headers
                .get(REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(WechatPayError::Api {
                status: response.status,
                request_id,
                body: response.body,
            });
        }

        self.validator.validate(&response.headers, &response.body)?;

        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }

    fn absolute_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.config.url(url)
        }
    }
}

impl<V: Validator + std::fmt::Debug> std::fmt::Debug for Client<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("credential", &self.credential)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| WechatPayError::Internal(format!("invalid {} header: {}", name, e)))?;
    headers.insert(name, value);
    Ok(())
}
