//! Snapshot-swapped platform certificate cache.
//!
//! Readers clone an `Arc` to the current [`CertificateSnapshot`] and work
//! against it without holding any lock. A refresh builds a whole new snapshot
//! and publishes it with one pointer swap, so a reader sees either the old
//! set or the new set, never a mixture.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::auth::verifier::CertificateVisitor;
use crate::crypto::pem::{normalize_serial, PlatformCertificate};

/// Immutable serial-to-certificate mapping.
#[derive(Clone, Debug, Default)]
pub struct CertificateSnapshot {
    certificates: HashMap<String, Arc<PlatformCertificate>>,
}

impl CertificateSnapshot {
    /// Build a snapshot from parsed certificates, keyed by their own serials.
    pub fn new(certificates: impl IntoIterator<Item = PlatformCertificate>) -> Self {
        Self {
            certificates: certificates
                .into_iter()
                .map(|c| (c.serial_no().to_string(), Arc::new(c)))
                .collect(),
        }
    }

    /// Look up a certificate, ignoring case and leading zeros in `serial_no`.
    pub fn get(&self, serial_no: &str) -> Option<Arc<PlatformCertificate>> {
        self.certificates
            .get(serial_no)
            .or_else(|| self.certificates.get(&normalize_serial(serial_no)))
            .cloned()
    }

    /// Number of certificates.
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Returns true if the snapshot holds no certificate.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Serial numbers, sorted.
    pub fn serials(&self) -> Vec<String> {
        let mut serials: Vec<String> = self.certificates.keys().cloned().collect();
        serials.sort();
        serials
    }

    /// Iterate over the certificates.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PlatformCertificate>> {
        self.certificates.values()
    }

    /// The certificate that expires last.
    pub fn newest(&self) -> Option<&Arc<PlatformCertificate>> {
        self.certificates.values().max_by_key(|c| c.not_after())
    }
}

impl CertificateVisitor for CertificateSnapshot {
    fn get(&self, serial_no: &str) -> Option<Arc<PlatformCertificate>> {
        CertificateSnapshot::get(self, serial_no)
    }
}

/// Per-merchant certificate cache.
#[derive(Debug, Default)]
pub struct CertificateStore {
    current: RwLock<Arc<CertificateSnapshot>>,
}

impl CertificateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<CertificateSnapshot> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*current)
    }

    /// Publish a new snapshot, returning the one it replaced.
    ///
    /// An empty snapshot is never published over a populated one.
    pub fn replace(&self, snapshot: CertificateSnapshot) -> Option<Arc<CertificateSnapshot>> {
        if snapshot.is_empty() {
            return None;
        }
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        Some(std::mem::replace(&mut *current, Arc::new(snapshot)))
    }

    /// Look up a certificate in the current snapshot.
    pub fn get(&self, serial_no: &str) -> Option<Arc<PlatformCertificate>> {
        self.snapshot().get(serial_no)
    }

    /// Raw PEM of a cached certificate.
    pub fn pem(&self, serial_no: &str) -> Option<String> {
        self.get(serial_no).map(|c| c.pem().to_string())
    }

    /// Returns true until the first successful refresh.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Serial of the certificate that expires last.
    pub fn newest_serial(&self) -> Option<String> {
        self.snapshot().newest().map(|c| c.serial_no().to_string())
    }
}

impl CertificateVisitor for CertificateStore {
    fn get(&self, serial_no: &str) -> Option<Arc<PlatformCertificate>> {
        CertificateStore::get(self, serial_no)
    }
}
