//! Platform certificate download and refresh.
//!
//! A downloader starts empty. The first refresh cannot verify the gateway's
//! answer (no certificate is known yet) and goes through an unvalidated
//! bootstrap client. Every later refresh is verified against the certificates
//! the downloader already holds.

use std::sync::Arc;

use serde::Deserialize;

use crate::auth::credential::Credential;
use crate::auth::validator::{NullValidator, WechatPayValidator};
use crate::auth::verifier::{CertificateVisitor, Sha256WithRsaVerifier};
use crate::certificates::store::{CertificateSnapshot, CertificateStore};
use crate::client::{ApiResponse, Client};
use crate::config::{ClientConfig, MerchantConfig};
use crate::crypto::aead::{AeadCipher, EncryptedResource};
use crate::crypto::pem::PlatformCertificate;
use crate::transport::Transport;
use crate::{Result, WechatPayError};

/// Certificate list endpoint.
pub const CERTIFICATES_PATH: &str = "/v3/certificates";

#[derive(Debug, Deserialize)]
struct CertificateList {
    data: Vec<CertificateEntry>,
}

#[derive(Debug, Deserialize)]
struct CertificateEntry {
    serial_no: String,
    encrypt_certificate: EncryptedResource,
}

/// Downloads and caches one merchant's platform certificates.
pub struct CertificateDownloader {
    mch_id: String,
    cipher: AeadCipher,
    store: Arc<CertificateStore>,
    bootstrap: Client<NullValidator>,
    validated: Client<WechatPayValidator>,
}

impl CertificateDownloader {
    /// Create an empty downloader.
    ///
    /// Key material is checked here; no request is sent until
    /// [`refresh`](Self::refresh).
    pub fn new(
        merchant: &MerchantConfig,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let credential = Credential::from_merchant(merchant)?;
        let cipher = AeadCipher::new(&merchant.mch_api_v3_key)
            .map_err(|e| WechatPayError::configuration("mch_api_v3_key", e.to_string()))?;

        let store = Arc::new(CertificateStore::new());
        let visitor: Arc<dyn CertificateVisitor> = store.clone();
        let validated = Client::new(
            config.clone(),
            credential.clone(),
            Arc::new(Sha256WithRsaVerifier::new(visitor)),
            Arc::clone(&transport),
        );
        let bootstrap = Client::bootstrap(config, credential, transport);

        Ok(Self {
            mch_id: merchant.mch_id.clone(),
            cipher,
            store,
            bootstrap,
            validated,
        })
    }

    /// Merchant this downloader serves.
    pub fn mch_id(&self) -> &str {
        &self.mch_id
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<CertificateStore> {
        &self.store
    }

    /// Look up a certificate in the current snapshot.
    pub fn get(&self, serial_no: &str) -> Option<Arc<PlatformCertificate>> {
        self.store.get(serial_no)
    }

    /// Raw PEM of a cached certificate.
    pub fn certificate_pem(&self, serial_no: &str) -> Option<String> {
        self.store.pem(serial_no)
    }

    /// Serial of the certificate that expires last.
    pub fn newest_serial(&self) -> Option<String> {
        self.store.newest_serial()
    }

    /// Download the certificate list and publish it as the new snapshot.
    ///
    /// Either every entry decrypts and parses and the whole set replaces the
    /// cache, or the refresh fails and the cache is left as it was. Returns
    /// the number of certificates published.
    #[tracing::instrument(skip(self), fields(mch_id = %self.mch_id))]
    pub async fn refresh(&self) -> Result<usize> {
        let response = self.download().await?;
        let list: CertificateList = response.json()?;

        let now = chrono::Utc::now().timestamp();
        let mut certificates = Vec::with_capacity(list.data.len());
        for entry in list.data {
            let certificate = self.decode_entry(&entry)?;
            if certificate.not_after() < now {
                tracing::warn!(serial_no = %entry.serial_no, "dropping expired platform certificate");
                continue;
            }
            certificates.push(certificate);
        }

        let snapshot = CertificateSnapshot::new(certificates);
        if snapshot.is_empty() {
            return Err(WechatPayError::EmptyCertificateSet {
                mch_id: self.mch_id.clone(),
            });
        }

        let count = snapshot.len();
        let serials = snapshot.serials();
        self.store.replace(snapshot);
        tracing::info!(count, ?serials, "platform certificates updated");
        Ok(count)
    }

    async fn download(&self) -> Result<ApiResponse> {
        if self.store.is_empty() {
            tracing::debug!("bootstrapping certificates without response validation");
            self.bootstrap.get(CERTIFICATES_PATH).await
        } else {
            self.validated.get(CERTIFICATES_PATH).await
        }
    }

    fn decode_entry(&self, entry: &CertificateEntry) -> Result<PlatformCertificate> {
        let pem = self.cipher.decrypt_resource(&entry.encrypt_certificate)?;
        let certificate = PlatformCertificate::from_pem(&pem)?;
        if !certificate.matches_serial(&entry.serial_no) {
            return Err(WechatPayError::verification(
                entry.serial_no.clone(),
                format!(
                    "listed serial does not match certificate serial {}",
                    certificate.serial_no()
                ),
            ));
        }
        Ok(certificate)
    }
}

impl std::fmt::Debug for CertificateDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateDownloader")
            .field("mch_id", &self.mch_id)
            .field("certificates", &self.store.snapshot().serials())
            .finish_non_exhaustive()
    }
}
