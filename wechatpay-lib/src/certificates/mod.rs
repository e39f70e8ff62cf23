//! Platform certificate lifecycle: cache, download, multi-merchant registry.

pub mod downloader;
pub mod registry;
pub mod store;

pub use downloader::{CertificateDownloader, CERTIFICATES_PATH};
pub use registry::{DownloaderRegistry, RegistryCertificateVisitor};
pub use store::{CertificateSnapshot, CertificateStore};
