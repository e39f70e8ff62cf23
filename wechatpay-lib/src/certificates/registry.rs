//! Multi-merchant downloader registry.
//!
//! A [`DownloaderRegistry`] is an explicitly constructed object, not a
//! process-wide singleton: create one per application (or per test), share it
//! by cloning, and drop it (or call [`clear`](DownloaderRegistry::clear)) to
//! tear it down. It holds at most one [`CertificateDownloader`] per merchant id.
//!
//! # Thread Safety
//!
//! The merchant map sits behind an `RwLock`. The lock is never held across an
//! `.await`, and a poisoned lock is recovered rather than propagated.
//! Registrations of the same merchant id are serialized by a per-id async
//! lock, so concurrent first registrations download certificates once.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = DownloaderRegistry::new(ClientConfig::default(), Arc::new(HttpTransport::new()?));
//! registry.register_if_absent(&merchant).await?;
//!
//! let verifier = Sha256WithRsaVerifier::new(Arc::new(registry.certificate_visitor(&merchant.mch_id)));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use futures::future::join_all;
use futures::lock::Mutex as AsyncMutex;

use crate::auth::verifier::CertificateVisitor;
use crate::certificates::downloader::CertificateDownloader;
use crate::config::{ClientConfig, MerchantConfig};
use crate::crypto::pem::PlatformCertificate;
use crate::transport::Transport;
use crate::{Result, WechatPayError};

struct RegistryInner {
    downloaders: RwLock<HashMap<String, Arc<CertificateDownloader>>>,
    registering: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl RegistryInner {
    fn downloader(&self, mch_id: &str) -> Option<Arc<CertificateDownloader>> {
        let downloaders = self.downloaders.read().unwrap_or_else(|e| e.into_inner());
        downloaders.get(mch_id).cloned()
    }

    fn contains(&self, mch_id: &str) -> bool {
        let downloaders = self.downloaders.read().unwrap_or_else(|e| e.into_inner());
        downloaders.contains_key(mch_id)
    }

    fn registration_lock(&self, mch_id: &str) -> Arc<AsyncMutex<()>> {
        let mut registering = self.registering.lock().unwrap_or_else(|e| e.into_inner());
        let lock = registering
            .entry(mch_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())));
        Arc::clone(lock)
    }

    /// Drop the per-id lock once no other registration is waiting on it.
    fn release_registration_lock(&self, mch_id: &str, lock: &Arc<AsyncMutex<()>>) {
        let mut registering = self.registering.lock().unwrap_or_else(|e| e.into_inner());
        // one reference in the map, one held by the caller
        if Arc::strong_count(lock) <= 2 {
            registering.remove(mch_id);
        }
    }
}

/// Registry of per-merchant certificate downloaders.
#[derive(Clone)]
pub struct DownloaderRegistry {
    inner: Arc<RegistryInner>,
}

impl DownloaderRegistry {
    /// Create an empty registry whose downloaders share `transport`.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                downloaders: RwLock::new(HashMap::new()),
                registering: Mutex::new(HashMap::new()),
                config,
                transport,
            }),
        }
    }

    /// Configuration handed to every downloader.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Shared transport.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.inner.transport)
    }

    /// Register `merchant` and download its certificates, unless it is
    /// already registered.
    ///
    /// Returns `Ok(true)` when a new downloader was added. Registering a known
    /// merchant id is a no-op that returns `Ok(false)`: it neither refreshes
    /// nor replaces the existing downloader. A merchant whose initial refresh
    /// fails is not registered.
    ///
    /// Concurrent calls for the same new merchant id wait for each other:
    /// only the first downloads, the rest return `Ok(false)` once it has
    /// been inserted. If the first fails, the next waiter tries again.
    #[tracing::instrument(skip_all, fields(mch_id = %merchant.mch_id))]
    pub async fn register_if_absent(&self, merchant: &MerchantConfig) -> Result<bool> {
        if self.inner.contains(&merchant.mch_id) {
            tracing::debug!("merchant already registered");
            return Ok(false);
        }

        let lock = self.inner.registration_lock(&merchant.mch_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.register_locked(merchant).await
        };
        self.inner.release_registration_lock(&merchant.mch_id, &lock);
        outcome
    }

    async fn register_locked(&self, merchant: &MerchantConfig) -> Result<bool> {
        if self.inner.contains(&merchant.mch_id) {
            tracing::debug!("merchant registered concurrently");
            return Ok(false);
        }

        let downloader = CertificateDownloader::new(
            merchant,
            self.inner.config.clone(),
            Arc::clone(&self.inner.transport),
        )?;
        downloader.refresh().await?;

        let mut downloaders = self
            .inner
            .downloaders
            .write()
            .unwrap_or_else(|e| e.into_inner());
        downloaders.insert(merchant.mch_id.clone(), Arc::new(downloader));
        Ok(true)
    }

    /// Narrow certificate lookup for one merchant.
    ///
    /// The visitor can be created before the merchant is registered; it
    /// answers `None` until then.
    pub fn certificate_visitor(&self, mch_id: &str) -> RegistryCertificateVisitor {
        RegistryCertificateVisitor {
            inner: Arc::clone(&self.inner),
            mch_id: mch_id.to_string(),
        }
    }

    /// Look up a certificate for a merchant.
    pub fn certificate(&self, mch_id: &str, serial_no: &str) -> Option<Arc<PlatformCertificate>> {
        self.inner.downloader(mch_id)?.get(serial_no)
    }

    /// Checks if a merchant is registered.
    pub fn contains(&self, mch_id: &str) -> bool {
        self.inner.contains(mch_id)
    }

    /// Returns all registered merchant ids, sorted.
    pub fn merchant_ids(&self) -> Vec<String> {
        let downloaders = self.inner.downloaders.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = downloaders.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Gets the downloader for a merchant.
    pub fn downloader(&self, mch_id: &str) -> Option<Arc<CertificateDownloader>> {
        self.inner.downloader(mch_id)
    }

    /// Refresh one merchant's certificates.
    pub async fn refresh(&self, mch_id: &str) -> Result<usize> {
        let downloader = self.inner.downloader(mch_id).ok_or_else(|| {
            WechatPayError::configuration("mch_id", format!("merchant {} is not registered", mch_id))
        })?;
        downloader.refresh().await
    }

    /// Refresh every registered merchant.
    ///
    /// Merchants are refreshed concurrently. A failure or a slow gateway
    /// answer for one merchant is reported in its slot and does not hold up
    /// the others.
    pub async fn refresh_all(&self) -> Vec<(String, Result<usize>)> {
        let downloaders: Vec<Arc<CertificateDownloader>> = {
            let map = self.inner.downloaders.read().unwrap_or_else(|e| e.into_inner());
            map.values().cloned().collect()
        };

        join_all(downloaders.into_iter().map(|downloader| async move {
            let outcome = downloader.refresh().await;
            if let Err(e) = &outcome {
                tracing::warn!(mch_id = downloader.mch_id(), error = %e, "certificate refresh failed");
            }
            (downloader.mch_id().to_string(), outcome)
        }))
        .await
    }

    /// Remove a merchant. Returns the removed downloader if it existed.
    pub fn unregister(&self, mch_id: &str) -> Option<Arc<CertificateDownloader>> {
        let mut downloaders = self
            .inner
            .downloaders
            .write()
            .unwrap_or_else(|e| e.into_inner());
        downloaders.remove(mch_id)
    }

    /// Remove every merchant.
    pub fn clear(&self) {
        let mut downloaders = self
            .inner
            .downloaders
            .write()
            .unwrap_or_else(|e| e.into_inner());
        downloaders.clear();
    }

    /// Returns the number of registered merchants.
    pub fn len(&self) -> usize {
        let downloaders = self.inner.downloaders.read().unwrap_or_else(|e| e.into_inner());
        downloaders.len()
    }

    /// Returns true if no merchant is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DownloaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloaderRegistry")
            .field("merchants", &self.merchant_ids())
            .finish_non_exhaustive()
    }
}

/// Certificate lookup scoped to one merchant of a registry.
#[derive(Clone)]
pub struct RegistryCertificateVisitor {
    inner: Arc<RegistryInner>,
    mch_id: String,
}

impl RegistryCertificateVisitor {
    /// Merchant this visitor reads for.
    pub fn mch_id(&self) -> &str {
        &self.mch_id
    }
}

impl CertificateVisitor for RegistryCertificateVisitor {
    fn get(&self, serial_no: &str) -> Option<Arc<PlatformCertificate>> {
        self.inner.downloader(&self.mch_id)?.get(serial_no)
    }
}

impl std::fmt::Debug for RegistryCertificateVisitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCertificateVisitor")
            .field("mch_id", &self.mch_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        certificate_list_body, merchant_config, signed_response, unsigned_response, MockTransport,
        API_V3_KEY, MCH_ID, PLATFORM_A_CERT_PEM, PLATFORM_A_KEY_PEM, PLATFORM_A_SERIAL,
    };
    use crate::transport::{TransportRequest, TransportResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    /// Yields before answering. Once armed, every request also waits until
    /// `parties` requests are in flight.
    struct GatedTransport {
        inner: MockTransport,
        barrier: Barrier,
        armed: AtomicBool,
    }

    impl GatedTransport {
        fn new(parties: usize) -> Self {
            Self {
                inner: MockTransport::new(),
                barrier: Barrier::new(parties),
                armed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
            tokio::task::yield_now().await;
            if self.armed.load(Ordering::SeqCst) {
                self.barrier.wait().await;
            }
            self.inner.execute(request).await
        }
    }

    fn registry(transport: Arc<MockTransport>) -> DownloaderRegistry {
        DownloaderRegistry::new(ClientConfig::new("https://api.test"), transport)
    }

    fn certificate_response() -> crate::transport::TransportResponse {
        unsigned_response(
            200,
            &certificate_list_body(API_V3_KEY, &[(PLATFORM_A_SERIAL, PLATFORM_A_CERT_PEM)]),
        )
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let transport = Arc::new(MockTransport::new());
        transport.push(certificate_response());
        let registry = registry(transport.clone());

        assert!(registry.register_if_absent(&merchant_config()).await.unwrap());
        assert!(!registry.register_if_absent(&merchant_config()).await.unwrap());

        assert_eq!(transport.requests().len(), 1);
        assert_eq!(registry.merchant_ids(), vec![MCH_ID.to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_first_registrations_download_once() {
        let transport = Arc::new(GatedTransport::new(1));
        transport.inner.push(certificate_response());
        let registry = DownloaderRegistry::new(ClientConfig::new("https://api.test"), transport.clone());
        let merchant = merchant_config();

        let (first, second) = tokio::join!(
            registry.register_if_absent(&merchant),
            registry.register_if_absent(&merchant)
        );
        let mut added = [first.unwrap(), second.unwrap()];
        added.sort();

        assert_eq!(added, [false, true]);
        assert_eq!(transport.inner.requests().len(), 1);
        assert!(registry.contains(MCH_ID));
        let registering = registry.inner.registering.lock().unwrap();
        assert!(registering.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_all_runs_merchants_concurrently() {
        let transport = Arc::new(GatedTransport::new(2));
        let registry = DownloaderRegistry::new(ClientConfig::new("https://api.test"), transport.clone());
        let mut other = merchant_config();
        other.mch_id = "1900000110".to_string();

        for merchant in [merchant_config(), other] {
            transport.inner.push(certificate_response());
            registry.register_if_absent(&merchant).await.unwrap();
        }

        let body = certificate_list_body(API_V3_KEY, &[(PLATFORM_A_SERIAL, PLATFORM_A_CERT_PEM)]);
        for _ in 0..2 {
            transport
                .inner
                .push(signed_response(PLATFORM_A_KEY_PEM, PLATFORM_A_SERIAL, 200, &body));
        }
        // each refresh blocks until the other one has reached the gateway
        transport.armed.store(true, Ordering::SeqCst);

        let outcomes = tokio::time::timeout(Duration::from_secs(5), registry.refresh_all())
            .await
            .expect("refreshes must not wait on each other");
        assert_eq!(outcomes.len(), 2);
        for (mch_id, outcome) in outcomes {
            assert_eq!(*outcome.as_ref().unwrap(), 1, "{mch_id}");
        }
    }

    #[tokio::test]
    async fn test_visitor_created_before_registration() {
        let transport = Arc::new(MockTransport::new());
        transport.push(certificate_response());
        let registry = registry(transport);

        let visitor = registry.certificate_visitor(MCH_ID);
        assert!(visitor.get(PLATFORM_A_SERIAL).is_none());

        registry.register_if_absent(&merchant_config()).await.unwrap();
        assert!(visitor.get(PLATFORM_A_SERIAL).is_some());
    }

    #[tokio::test]
    async fn test_failed_registration_leaves_registry_unchanged() {
        let transport = Arc::new(MockTransport::new());
        transport.push(unsigned_response(500, "boom"));
        let registry = registry(transport);

        assert!(registry.register_if_absent(&merchant_config()).await.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unregister_and_clear() {
        let transport = Arc::new(MockTransport::new());
        transport.push(certificate_response());
        let registry = registry(transport);
        registry.register_if_absent(&merchant_config()).await.unwrap();

        assert!(registry.certificate(MCH_ID, PLATFORM_A_SERIAL).is_some());
        assert!(registry.unregister(MCH_ID).is_some());
        assert!(registry.certificate(MCH_ID, PLATFORM_A_SERIAL).is_none());
        registry.clear();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_unknown_merchant_fails() {
        let registry = registry(Arc::new(MockTransport::new()));
        let err = registry.refresh("unknown").await.unwrap_err();
        assert_eq!(err.code(), crate::WechatPayErrorCode::Configuration);
    }
}
