//! Hygiene rule engine.
//!
//! Rules run in a fixed order and never short-circuit:
//! 1. weak signature algorithm
//! 2. short key
//! 3. unencrypted private key
//! 4. weak PKCS#12 MAC
//! 5. weak key or bundle encryption
//! 6. certificate expiring within a configured window (opt-in)
//! 7. PKCS#12 contents not extracted
//!
//! Chain verification outcomes are turned into findings separately by
//! [`verification_finding`].

use crate::fields::{
    DateTime, EncryptionState, KeyAlgorithm, ParsedCertificate, ParsedCsr, ParsedKey,
    ParsedPfxBundle, Property,
};
use crate::verify::VerificationResult;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Algorithm identifiers considered weak, in match-priority order.
pub const WEAK_ALGORITHMS: &[&str] = &[
    "md2",
    "md4",
    "md5",
    "sha1",
    "sha1WithRSAEncryption",
    "ecdsa-with-SHA1",
    "DSA-SHA1",
    "RC4",
];

/// Minimum acceptable RSA and DSA modulus size.
const MIN_RSA_DSA_BITS: u32 = 2048;
/// Minimum acceptable elliptic-curve field size.
const MIN_EC_BITS: u32 = 224;

/// Identifies which rule produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    WeakAlgorithm,
    ShortKey,
    UnencryptedKey,
    WeakMac,
    WeakEncryption,
    ExpiringSoon,
    NotExtracted,
    ChainVerification,
}

impl Rule {
    pub fn name(self) -> &'static str {
        match self {
            Rule::WeakAlgorithm => "weak-algorithm",
            Rule::ShortKey => "short-key",
            Rule::UnencryptedKey => "unencrypted-key",
            Rule::WeakMac => "weak-mac",
            Rule::WeakEncryption => "weak-encryption",
            Rule::ExpiringSoon => "expiring-soon",
            Rule::NotExtracted => "not-extracted",
            Rule::ChainVerification => "chain-verification",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One result of a hygiene rule. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HygieneFinding {
    rule: Rule,
    severity: Severity,
    message: String,
}

impl HygieneFinding {
    fn new(rule: Rule, severity: Severity, message: impl Into<String>) -> Self {
        HygieneFinding {
            rule,
            severity,
            message: message.into(),
        }
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HygieneFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.rule, self.message)
    }
}

/// Options for rule evaluation.
#[derive(Debug, Clone, Default)]
pub struct RuleOptions {
    /// Evaluation time as a Unix timestamp (defaults to now).
    pub now: Option<i64>,
    /// Warn when a certificate expires within this window.
    pub expiry_window: Option<Duration>,
}

impl RuleOptions {
    pub(crate) fn now(&self) -> i64 {
        self.now
            .unwrap_or_else(|| ::time::OffsetDateTime::now_utc().unix_timestamp())
    }
}

/// Read-only view of a parsed artifact for the rule engine.
///
/// Every method defaults to "not applicable".
pub trait Assess {
    /// Signature algorithm identifier.
    fn signature_algorithm(&self) -> Option<&str> {
        None
    }

    /// Key algorithm (when known) and size.
    fn key_size(&self) -> Option<(Option<&KeyAlgorithm>, &Property<u32>)> {
        None
    }

    /// Whether private key material is encrypted at rest.
    fn encryption_state(&self) -> Option<EncryptionState> {
        None
    }

    /// PKCS#12 MAC: `Some(None)` for a bundle without MacData.
    fn mac_algorithm(&self) -> Option<Option<&str>> {
        None
    }

    /// Encryption schemes protecting key material.
    fn encryption_schemes(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Certificate validity window.
    fn validity(&self) -> Option<(&DateTime, &DateTime)> {
        None
    }

    /// Why PKCS#12 entries were left unextracted, if they were.
    fn unextracted(&self) -> Option<&str> {
        None
    }
}

impl Assess for ParsedCertificate {
    fn signature_algorithm(&self) -> Option<&str> {
        Some(&self.signature_algorithm)
    }

    fn key_size(&self) -> Option<(Option<&KeyAlgorithm>, &Property<u32>)> {
        Some((Some(&self.public_key.algorithm), &self.public_key.bits))
    }

    fn validity(&self) -> Option<(&DateTime, &DateTime)> {
        Some((&self.not_before, &self.not_after))
    }
}

impl Assess for ParsedCsr {
    fn signature_algorithm(&self) -> Option<&str> {
        Some(&self.signature_algorithm)
    }

    fn key_size(&self) -> Option<(Option<&KeyAlgorithm>, &Property<u32>)> {
        Some((Some(&self.public_key.algorithm), &self.public_key.bits))
    }
}

impl Assess for ParsedKey {
    fn key_size(&self) -> Option<(Option<&KeyAlgorithm>, &Property<u32>)> {
        Some((self.algorithm.known(), &self.bits))
    }

    fn encryption_state(&self) -> Option<EncryptionState> {
        Some(self.encryption)
    }

    fn encryption_schemes(&self) -> Vec<&str> {
        self.encryption_scheme.as_deref().into_iter().collect()
    }
}

impl Assess for ParsedPfxBundle {
    fn mac_algorithm(&self) -> Option<Option<&str>> {
        Some(self.mac.as_ref().map(|m| m.algorithm.as_str()))
    }

    fn encryption_schemes(&self) -> Vec<&str> {
        self.encryption_algorithms.iter().map(String::as_str).collect()
    }

    fn unextracted(&self) -> Option<&str> {
        if self.extracted {
            None
        } else {
            Some(self.unextracted_reason.as_deref().unwrap_or("reason unknown"))
        }
    }
}

/// Match an algorithm identifier against [`WEAK_ALGORITHMS`].
///
/// The whole identifier is compared first; otherwise it is split into tokens
/// on non-alphanumeric characters and on the `With`/`And` connectives of
/// OpenSSL-style names (`sha1WithRSAEncryption` gives `sha1`,
/// `RSAEncryption`). Comparison is ASCII case-insensitive. Returns the first
/// weak entry, in list order, that matches.
pub fn weak_algorithm_token(identifier: &str) -> Option<&'static str> {
    let identifier = identifier.trim();
    if let Some(hit) = WEAK_ALGORITHMS
        .iter()
        .find(|w| w.eq_ignore_ascii_case(identifier))
    {
        return Some(hit);
    }
    let tokens = tokenize(identifier);
    WEAK_ALGORITHMS
        .iter()
        .find(|w| tokens.iter().any(|t| w.eq_ignore_ascii_case(t)))
        .copied()
}

fn tokenize(identifier: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for run in identifier
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
    {
        split_connectives(run, &mut tokens);
    }
    tokens
}

/// Split an ASCII alphanumeric run on interior `With`/`And` words that are
/// followed by an uppercase letter, a digit, or the end of the run.
fn split_connectives<'a>(run: &'a str, out: &mut Vec<&'a str>) {
    let bytes = run.as_bytes();
    let mut start = 0;
    let mut i = 1;
    while i < bytes.len() {
        let rest = run.get(i..).unwrap_or("");
        let connective = ["With", "And"].into_iter().find(|c| rest.starts_with(c));
        if let Some(c) = connective {
            let end = i + c.len();
            let boundary = bytes
                .get(end)
                .map_or(true, |b| b.is_ascii_uppercase() || b.is_ascii_digit());
            if boundary {
                if let Some(tok) = run.get(start..i).filter(|t| !t.is_empty()) {
                    out.push(tok);
                }
                start = end;
                i = end;
                continue;
            }
        }
        i += 1;
    }
    if let Some(tok) = run.get(start..).filter(|t| !t.is_empty()) {
        out.push(tok);
    }
}

/// Run every applicable rule against an artifact.
pub fn evaluate(entity: &impl Assess, options: &RuleOptions) -> Vec<HygieneFinding> {
    let mut findings = Vec::new();

    if let Some(sig) = entity.signature_algorithm() {
        if let Some(token) = weak_algorithm_token(sig) {
            findings.push(HygieneFinding::new(
                Rule::WeakAlgorithm,
                Severity::Warning,
                format!("weak signature algorithm {} (matched {})", sig, token),
            ));
        }
    }

    if let Some((algorithm, bits)) = entity.key_size() {
        if let Some(finding) = short_key(algorithm, bits) {
            findings.push(finding);
        }
    }

    if entity.encryption_state() == Some(EncryptionState::Plaintext) {
        findings.push(HygieneFinding::new(
            Rule::UnencryptedKey,
            Severity::Warning,
            "private key is stored unencrypted",
        ));
    }

    match entity.mac_algorithm() {
        Some(Some(mac)) => {
            if let Some(token) = weak_algorithm_token(mac) {
                findings.push(HygieneFinding::new(
                    Rule::WeakMac,
                    Severity::Warning,
                    format!("weak MAC algorithm {} (matched {})", mac, token),
                ));
            }
        }
        Some(None) => findings.push(HygieneFinding::new(
            Rule::WeakMac,
            Severity::Info,
            "bundle carries no integrity MAC",
        )),
        None => {}
    }

    let mut seen: Vec<&str> = Vec::new();
    for scheme in entity.encryption_schemes() {
        if seen.contains(&scheme) {
            continue;
        }
        seen.push(scheme);
        if let Some(token) = weak_algorithm_token(scheme) {
            findings.push(HygieneFinding::new(
                Rule::WeakEncryption,
                Severity::Warning,
                format!("weak encryption scheme {} (matched {})", scheme, token),
            ));
        }
    }

    if let (Some(window), Some((not_before, not_after))) =
        (options.expiry_window, entity.validity())
    {
        let now = options.now();
        let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        if not_before.timestamp <= now
            && now <= not_after.timestamp
            && not_after.timestamp - now <= window_secs
        {
            findings.push(HygieneFinding::new(
                Rule::ExpiringSoon,
                Severity::Warning,
                format!(
                    "certificate expires {} ({} days from now)",
                    not_after.iso8601,
                    (not_after.timestamp - now) / 86_400
                ),
            ));
        }
    }

    if let Some(reason) = entity.unextracted() {
        findings.push(HygieneFinding::new(
            Rule::NotExtracted,
            Severity::Info,
            format!("certificates and keys not inspected: {}", reason),
        ));
    }

    findings
}

fn short_key(algorithm: Option<&KeyAlgorithm>, bits: &Property<u32>) -> Option<HygieneFinding> {
    let bits = match bits {
        Property::Known(bits) => *bits,
        Property::Undetermined { reason } => {
            return Some(HygieneFinding::new(
                Rule::ShortKey,
                Severity::Info,
                format!("could not determine key length ({})", reason),
            ))
        }
    };
    let minimum = match algorithm? {
        KeyAlgorithm::Rsa | KeyAlgorithm::Dsa => MIN_RSA_DSA_BITS,
        KeyAlgorithm::Ec => MIN_EC_BITS,
        KeyAlgorithm::Ed25519
        | KeyAlgorithm::Ed448
        | KeyAlgorithm::X25519
        | KeyAlgorithm::X448
        | KeyAlgorithm::Other(_) => return None,
    };
    let algorithm = algorithm?;
    (bits < minimum).then(|| {
        HygieneFinding::new(
            Rule::ShortKey,
            Severity::Warning,
            format!(
                "{}-bit {} key is below the {}-bit minimum",
                bits, algorithm, minimum
            ),
        )
    })
}

/// Turn a failed verification into an informational finding.
pub fn verification_finding(result: &VerificationResult) -> Option<HygieneFinding> {
    (!result.valid).then(|| {
        HygieneFinding::new(
            Rule::ChainVerification,
            Severity::Info,
            format!("chain verification failed: {} ({})", result.reason, result.mode),
        )
    })
}
