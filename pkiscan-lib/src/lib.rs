//! pkiscan-lib: parsers and hygiene rules for X.509 material.
//!
//! Decodes certificates, certificate signing requests, private keys and
//! PKCS#12 bundles from PEM or DER, runs a fixed set of hygiene rules over
//! them (weak algorithms, short keys, unencrypted keys, weak MACs), verifies
//! certificates against a trust set, and aggregates the results into a
//! report.

mod convert;
mod display;
mod fields;
mod fingerprint;
mod inspect;
mod kdf;
mod key;
pub mod oid;
mod parser;
mod pbe;
mod pkcs12;
mod report;
mod rules;
mod util;
pub mod verify;

pub use convert::{der_to_pem, pem_to_der};
pub use display::{display_text, to_json};
pub use fields::{
    BasicConstraints, DateTime, DigestAlgorithm, DistinguishedName, EncryptionState,
    KeyAlgorithm, KeyFormat, MacInfo, ParsedCertificate, ParsedCsr, ParsedKey, ParsedPfxBundle,
    PfxEntry, Property, PublicKeyInfo,
};
pub use fingerprint::compute_fingerprint;
pub use inspect::{
    inspect, inspect_bytes, ArtifactKind, InspectOptions, TrustSource, MAX_INPUT_BYTES,
};
pub use key::parse_key;
pub use parser::{
    parse_certificate, parse_certificate_der, parse_certificate_pem, parse_csr, parse_csr_der,
    parse_csr_pem,
};
pub use pkcs12::parse_pfx;
pub use report::{build_section, Report, ReportSection, Summary};
pub use rules::{
    evaluate, verification_finding, weak_algorithm_token, Assess, HygieneFinding, Rule,
    RuleOptions, Severity, WEAK_ALGORITHMS,
};
pub use verify::{
    find_system_ca_bundle, verify, verify_with_options, TrustStore, VerificationResult,
    VerifyOptions,
};

/// Errors returned by the container parsers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unrecognized format: {0}")]
    UnrecognizedFormat(String),

    #[error("invalid PEM: {0}")]
    Pem(String),

    #[error("invalid DER: {0}")]
    Der(String),

    #[error("malformed structure: {0}")]
    Malformed(String),

    #[error("authentication failed: wrong passphrase or corrupted data")]
    AuthenticationFailed,

    #[error("a passphrase is required to decrypt this content")]
    PassphraseRequired,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

impl From<yasna::ASN1Error> for ParseError {
    fn from(e: yasna::ASN1Error) -> Self {
        ParseError::Der(e.to_string())
    }
}

impl From<pem::PemError> for ParseError {
    fn from(e: pem::PemError) -> Self {
        ParseError::Pem(e.to_string())
    }
}

/// Errors returned by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: file is {size} bytes, limit is {limit}")]
    TooLarge {
        path: String,
        size: u64,
        limit: u64,
    },

    #[error("{path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
