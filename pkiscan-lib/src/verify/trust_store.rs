//! Trust anchor sets.
//!
//! Anchors are indexed by raw subject bytes so path building can look up
//! an issuer without decoding names. The system store is located the way
//! OpenSSL does it (`SSL_CERT_FILE`, `SSL_CERT_DIR`, then well-known paths).

use crate::fields::ParsedCertificate;
use crate::parser::{parse_certificate_der, CERTIFICATE_LABELS};
use crate::ParseError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Well-known CA bundle file paths, in order of preference.
const KNOWN_CA_BUNDLE_PATHS: &[&str] = &[
    "/etc/ssl/certs/ca-certificates.crt", // Debian/Ubuntu
    "/etc/pki/tls/certs/ca-bundle.crt",   // RHEL/CentOS/Fedora
    "/etc/ssl/ca-bundle.pem",             // openSUSE
    "/etc/ssl/cert.pem",                  // macOS, Alpine
];

const KNOWN_CA_DIR_PATHS: &[&str] = &["/etc/ssl/certs"];

/// Errors raised while loading trust anchors.
#[derive(Debug, thiserror::Error)]
pub enum TrustStoreError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    Empty(String),

    #[error("no system trust store found")]
    NoSystemStore,
}

/// Matches `.pem`, `.crt`, `.cer` and OpenSSL hash links (`a1b2c3d4.0`).
fn is_pem_cert_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    matches!(ext, "pem" | "crt" | "cer")
        || (ext.len() == 1 && ext.bytes().next().is_some_and(|b| b.is_ascii_digit()))
}

/// A set of trusted CA certificates, indexed by raw subject name.
#[derive(Clone, Default)]
pub struct TrustStore {
    certs_by_subject: HashMap<Vec<u8>, Vec<ParsedCertificate>>,
    count: usize,
}

impl std::fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustStore")
            .field("count", &self.count)
            .finish()
    }
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the system trust store.
    ///
    /// Search order follows OpenSSL: `SSL_CERT_FILE`, the bundle found by
    /// `openssl-probe`, well-known bundle paths, then `SSL_CERT_DIR`, the
    /// discovered directory and well-known directories.
    pub fn system() -> Result<Self, TrustStoreError> {
        let mut store = TrustStore::new();

        if let Some(bundle_path) = find_system_ca_bundle() {
            if let Ok(data) = std::fs::read(&bundle_path) {
                if store.add_pem_bundle(&data) > 0 {
                    tracing::debug!(path = %bundle_path.display(), count = store.len(), "loaded system CA bundle");
                    return Ok(store);
                }
            }
        }

        let discovered = openssl_probe::probe();
        let dir_candidates = std::env::var("SSL_CERT_DIR")
            .ok()
            .into_iter()
            .chain(
                discovered
                    .cert_dir
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned()),
            )
            .chain(KNOWN_CA_DIR_PATHS.iter().map(|s| (*s).to_string()));

        for dir in dir_candidates {
            if let Ok(added) = store.add_pem_directory(Path::new(&dir)) {
                if added > 0 {
                    tracing::debug!(dir = %dir, count = store.len(), "loaded system CA directory");
                    return Ok(store);
                }
            }
        }

        Err(TrustStoreError::NoSystemStore)
    }

    /// Create a trust store from a PEM bundle such as a CA certificates file.
    pub fn from_pem(pem_data: &[u8]) -> Result<Self, TrustStoreError> {
        let mut store = TrustStore::new();
        if store.add_pem_bundle(pem_data) == 0 {
            return Err(TrustStoreError::Empty("PEM input".into()));
        }
        Ok(store)
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, TrustStoreError> {
        let data = std::fs::read(path).map_err(|source| TrustStoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut store = TrustStore::new();
        if store.add_pem_bundle(&data) == 0 {
            return Err(TrustStoreError::Empty(path.display().to_string()));
        }
        Ok(store)
    }

    /// Load every certificate file in a directory (like OpenSSL's `-CApath`).
    pub fn from_pem_directory(dir: &Path) -> Result<Self, TrustStoreError> {
        let mut store = TrustStore::new();
        if store.add_pem_directory(dir)? == 0 {
            return Err(TrustStoreError::Empty(dir.display().to_string()));
        }
        Ok(store)
    }

    /// Add a DER-encoded certificate.
    pub fn add_der(&mut self, der: &[u8]) -> Result<(), ParseError> {
        let cert = parse_certificate_der(der)?;
        self.add_certificate(cert);
        Ok(())
    }

    pub fn add_certificate(&mut self, cert: ParsedCertificate) {
        self.certs_by_subject
            .entry(cert.subject_raw.clone())
            .or_default()
            .push(cert);
        self.count += 1;
    }

    /// Merge another store into this one.
    pub fn extend(&mut self, other: TrustStore) {
        for cert in other.certs_by_subject.into_values().flatten() {
            self.add_certificate(cert);
        }
    }

    /// Add all certificates from a PEM bundle. Returns the number added;
    /// blocks that are not certificates, or fail to parse, are skipped.
    pub fn add_pem_bundle(&mut self, pem_data: &[u8]) -> usize {
        let Ok(blocks) = pem::parse_many(pem_data) else {
            return 0;
        };
        let mut added = 0;
        for block in blocks
            .iter()
            .filter(|b| CERTIFICATE_LABELS.contains(&b.tag()))
        {
            match self.add_der(block.contents()) {
                Ok(()) => added += 1,
                Err(e) => tracing::debug!(error = %e, "skipping unparseable trust anchor"),
            }
        }
        added
    }

    /// Load certificates from a directory of PEM files. Returns the number added.
    pub fn add_pem_directory(&mut self, dir: &Path) -> Result<usize, TrustStoreError> {
        let io_err = |source| TrustStoreError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut total = 0;
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && is_pem_cert_file(&path) {
                if let Ok(data) = std::fs::read(&path) {
                    total += self.add_pem_bundle(&data);
                }
            }
        }
        Ok(total)
    }

    /// Trusted certificates whose subject matches the given raw name.
    pub(crate) fn find_by_subject_raw(&self, subject_raw: &[u8]) -> Option<&Vec<ParsedCertificate>> {
        self.certs_by_subject.get(subject_raw)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether a certificate with identical DER is in the store.
    pub fn contains(&self, cert: &ParsedCertificate) -> bool {
        self.find_by_subject_raw(&cert.subject_raw)
            .is_some_and(|certs| certs.iter().any(|c| c.raw_der == cert.raw_der))
    }
}

/// Find the system CA bundle path (same location OpenSSL uses).
pub fn find_system_ca_bundle() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SSL_CERT_FILE") {
        let p = PathBuf::from(&path);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(file) = openssl_probe::probe().cert_file {
        if file.exists() {
            return Some(file);
        }
    }

    KNOWN_CA_BUNDLE_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}
