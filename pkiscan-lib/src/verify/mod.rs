//! Certificate verification against a trust set.
//!
//! Two modes:
//! - **self**: the certificate is its own trust anchor. This only tells a
//!   self-signed certificate apart from a tampered or expired one; it is not
//!   a chain-of-trust check, and results say so.
//! - **anchors**: a path is built from the leaf through untrusted
//!   intermediates to a certificate in a [`TrustStore`].
//!
//! Checks run in a fixed order and the first failure names the result:
//! validity window, issuer lookup, signatures, then CA flags on issuers.
//! Failures never abort an inspection; the rule engine turns them into
//! informational findings.

mod chain;
mod trust_store;

use crate::fields::ParsedCertificate;
use serde::{Serialize, Serializer};
use std::fmt;
use x509_parser::error::X509Error;
use x509_parser::prelude::*;

pub(crate) use chain::MAX_CHAIN_DEPTH;
pub use trust_store::{find_system_ca_bundle, TrustStore, TrustStoreError};

/// Which trust set a result was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustMode {
    SelfSigned,
    Anchors(usize),
}

impl fmt::Display for TrustMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustMode::SelfSigned => f.write_str("self (not a chain-of-trust check)"),
            TrustMode::Anchors(n) => write!(f, "{} anchor(s)", n),
        }
    }
}

impl Serialize for TrustMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of verifying one certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub valid: bool,
    /// `"ok"`, or the first failure: `"expired"`, `"not yet valid"`,
    /// `"unknown issuer"`, `"undetermined (path search limit reached)"`,
    /// `"signature mismatch"`, `"unsupported signature algorithm"`,
    /// `"issuer is not a CA"`.
    pub reason: String,
    /// Every failure found, with the certificate it applies to.
    pub errors: Vec<String>,
    /// The path that was checked, leaf first, ending at the anchor if found.
    pub chain: Vec<ChainLink>,
    pub mode: TrustMode,
}

/// A certificate on a verified path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainLink {
    /// Position in the path (0 = leaf).
    pub depth: usize,
    pub subject: String,
    pub issuer: String,
    pub trusted: bool,
}

/// Verification options.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Verify at this Unix timestamp instead of the current time.
    pub at_time: Option<i64>,
    /// Maximum number of links followed while building a path.
    pub max_depth: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions {
            at_time: None,
            max_depth: MAX_CHAIN_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Expired,
    NotYetValid,
    UnknownIssuer,
    SearchLimit,
    SignatureMismatch,
    UnsupportedAlgorithm,
    NotCa,
}

impl Failure {
    fn as_str(self) -> &'static str {
        match self {
            Failure::Expired => "expired",
            Failure::NotYetValid => "not yet valid",
            Failure::UnknownIssuer => "unknown issuer",
            Failure::SearchLimit => "undetermined (path search limit reached)",
            Failure::SignatureMismatch => "signature mismatch",
            Failure::UnsupportedAlgorithm => "unsupported signature algorithm",
            Failure::NotCa => "issuer is not a CA",
        }
    }
}

/// Verify `cert` against `anchors`, or against itself when `anchors` is `None`.
pub fn verify(cert: &ParsedCertificate, anchors: Option<&TrustStore>) -> VerificationResult {
    verify_with_options(cert, anchors, &[], &VerifyOptions::default())
}

/// Verify with untrusted `intermediates` available for path building.
///
/// Intermediates are ignored in self mode.
pub fn verify_with_options(
    cert: &ParsedCertificate,
    anchors: Option<&TrustStore>,
    intermediates: &[ParsedCertificate],
    options: &VerifyOptions,
) -> VerificationResult {
    let now = options
        .at_time
        .unwrap_or_else(|| ::time::OffsetDateTime::now_utc().unix_timestamp());

    let (links, anchor, exhausted, mode) = match anchors {
        None => {
            let anchor = cert.is_self_issued().then_some(cert);
            (vec![cert], anchor, false, TrustMode::SelfSigned)
        }
        Some(store) => {
            let path = chain::build_path(cert, intermediates, store, options.max_depth);
            (
                path.links,
                path.anchor,
                path.exhausted,
                TrustMode::Anchors(store.len()),
            )
        }
    };

    // The anchor is listed separately unless the leaf is its own anchor.
    let mut path: Vec<&ParsedCertificate> = links.clone();
    if let Some(a) = anchor {
        if links.last().map_or(true, |last| last.raw_der != a.raw_der) {
            path.push(a);
        }
    }

    let mut failures: Vec<(Failure, String)> = Vec::new();

    for c in &path {
        if now > c.not_after.timestamp {
            failures.push((
                Failure::Expired,
                format!("{}: expired at {}", c.subject_string(), c.not_after),
            ));
        } else if now < c.not_before.timestamp {
            failures.push((
                Failure::NotYetValid,
                format!("{}: not valid before {}", c.subject_string(), c.not_before),
            ));
        }
    }

    match anchor {
        None if exhausted => failures.push((
            Failure::SearchLimit,
            format!(
                "{}: gave up after {} signature checks looking for {}",
                cert.subject_string(),
                chain::MAX_SIGNATURE_CHECKS,
                cert.issuer_string()
            ),
        )),
        None => failures.push((
            Failure::UnknownIssuer,
            format!(
                "{}: no trusted issuer found for {}",
                cert.subject_string(),
                cert.issuer_string()
            ),
        )),
        Some(anchor) => {
            let issuers = links.iter().skip(1).copied().chain(std::iter::once(anchor));
            for (child, issuer) in links.iter().zip(issuers) {
                if let Err(failure) = check_signature(child, issuer) {
                    failures.push((
                        failure,
                        format!(
                            "{}: {} (issuer {})",
                            child.subject_string(),
                            failure.as_str(),
                            issuer.subject_string()
                        ),
                    ));
                }
                if issuer.raw_der != child.raw_der && !issuer.is_ca() {
                    failures.push((
                        Failure::NotCa,
                        format!("{}: not a CA certificate", issuer.subject_string()),
                    ));
                }
            }
        }
    }

    // Stable sort keeps per-certificate order within each failure class.
    failures.sort_by_key(|(f, _)| failure_rank(*f));

    let reason = failures
        .first()
        .map_or("ok", |(f, _)| f.as_str())
        .to_string();

    tracing::debug!(subject = %cert.subject_string(), mode = %mode, reason = %reason, "verified certificate");

    let chain = path
        .iter()
        .enumerate()
        .map(|(depth, c)| ChainLink {
            depth,
            subject: c.subject_string(),
            issuer: c.issuer_string(),
            trusted: anchor.is_some_and(|a| a.raw_der == c.raw_der),
        })
        .collect();

    VerificationResult {
        valid: failures.is_empty(),
        reason,
        errors: failures.into_iter().map(|(_, msg)| msg).collect(),
        chain,
        mode,
    }
}

fn failure_rank(f: Failure) -> u8 {
    match f {
        Failure::Expired | Failure::NotYetValid => 0,
        Failure::UnknownIssuer | Failure::SearchLimit => 1,
        Failure::SignatureMismatch | Failure::UnsupportedAlgorithm => 2,
        Failure::NotCa => 3,
    }
}

/// Check that `issuer`'s key signed `child`.
fn check_signature(child: &ParsedCertificate, issuer: &ParsedCertificate) -> Result<(), Failure> {
    let (_, child_x509) =
        X509Certificate::from_der(&child.raw_der).map_err(|_| Failure::SignatureMismatch)?;
    let (_, issuer_x509) =
        X509Certificate::from_der(&issuer.raw_der).map_err(|_| Failure::SignatureMismatch)?;
    match child_x509.verify_signature(Some(issuer_x509.public_key())) {
        Ok(()) => Ok(()),
        Err(X509Error::SignatureUnsupportedAlgorithm) => Err(Failure::UnsupportedAlgorithm),
        Err(_) => Err(Failure::SignatureMismatch),
    }
}
