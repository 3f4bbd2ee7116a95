//! Parsed artifact types shared by the parsers, the rule engine and the
//! report builder.

use serde::{Serialize, Serializer};
use std::fmt;

/// Digest algorithm for fingerprint computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
    Sha1,
}

/// A value the parser either determined or could not determine.
///
/// Renderers print `undetermined (<reason>)` for the second case so a reader
/// can tell "checked and fine" apart from "not checked".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Property<T> {
    Known(T),
    Undetermined { reason: String },
}

impl<T> Property<T> {
    pub fn undetermined(reason: impl Into<String>) -> Self {
        Property::Undetermined {
            reason: reason.into(),
        }
    }

    /// The value, if it was determined.
    pub fn known(&self) -> Option<&T> {
        match self {
            Property::Known(v) => Some(v),
            Property::Undetermined { .. } => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Property::Known(_))
    }
}

impl<T: fmt::Display> fmt::Display for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Known(v) => write!(f, "{v}"),
            Property::Undetermined { reason } => write!(f, "undetermined ({reason})"),
        }
    }
}

/// Public key algorithm family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
    Ec,
    Dsa,
    Ed25519,
    Ed448,
    X25519,
    X448,
    /// Unmodelled algorithm, carried as its dotted OID.
    Other(String),
}

impl KeyAlgorithm {
    /// Map an algorithm OID from a SubjectPublicKeyInfo or PrivateKeyInfo.
    pub fn from_oid(oid: &str) -> Self {
        match oid {
            crate::oid::RSA_ENCRYPTION => KeyAlgorithm::Rsa,
            crate::oid::EC_PUBLIC_KEY => KeyAlgorithm::Ec,
            crate::oid::DSA => KeyAlgorithm::Dsa,
            crate::oid::ED25519 => KeyAlgorithm::Ed25519,
            crate::oid::ED448 => KeyAlgorithm::Ed448,
            crate::oid::X25519 => KeyAlgorithm::X25519,
            crate::oid::X448 => KeyAlgorithm::X448,
            other => KeyAlgorithm::Other(other.to_string()),
        }
    }

    /// Fixed key size for algorithms whose size is implied by the algorithm.
    pub fn implied_bits(&self) -> Option<u32> {
        match self {
            KeyAlgorithm::Ed25519 | KeyAlgorithm::X25519 => Some(256),
            KeyAlgorithm::Ed448 => Some(456),
            KeyAlgorithm::X448 => Some(448),
            _ => None,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Ec => "EC",
            KeyAlgorithm::Dsa => "DSA",
            KeyAlgorithm::Ed25519 => "Ed25519",
            KeyAlgorithm::Ed448 => "Ed448",
            KeyAlgorithm::X25519 => "X25519",
            KeyAlgorithm::X448 => "X448",
            KeyAlgorithm::Other(oid) => oid,
        };
        f.write_str(name)
    }
}

impl Serialize for KeyAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Map a named-curve OID to its common name.
pub fn curve_name(oid: &str) -> Option<&'static str> {
    match oid {
        crate::oid::CURVE_P256 => Some("P-256"),
        crate::oid::CURVE_P384 => Some("P-384"),
        crate::oid::CURVE_P521 => Some("P-521"),
        crate::oid::CURVE_SECP256K1 => Some("secp256k1"),
        _ => None,
    }
}

/// Field size in bits for a named curve.
pub fn curve_bits(name: &str) -> Option<u32> {
    match name {
        "P-256" | "secp256k1" => Some(256),
        "P-384" => Some(384),
        "P-521" => Some(521),
        _ => None,
    }
}

/// Distinguished name with ordered components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistinguishedName {
    /// Ordered list of (attribute_type, value) pairs.
    /// Attribute types use short names where known (e.g., "CN", "O", "C").
    pub components: Vec<(String, String)>,
}

impl DistinguishedName {
    /// Format as a comma-separated one-line string matching OpenSSL's default format.
    /// Example: "C = US, O = Org, CN = example.com"
    ///
    /// Values containing commas, equals signs, or backslashes are escaped.
    pub fn to_oneline(&self) -> String {
        let mut result = String::new();
        for (i, (k, v)) in self.components.iter().enumerate() {
            if i > 0 {
                result.push_str(", ");
            }
            result.push_str(k);
            result.push_str(" = ");
            for ch in v.chars() {
                match ch {
                    '\\' => result.push_str("\\\\"),
                    ',' => result.push_str("\\,"),
                    '=' => result.push_str("\\="),
                    _ => result.push(ch),
                }
            }
        }
        result
    }

    /// First value of the given short attribute name.
    pub fn get(&self, attr: &str) -> Option<&str> {
        self.components
            .iter()
            .find(|(k, _)| k == attr)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_oneline())
    }
}

/// Public key information from a certificate or CSR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicKeyInfo {
    pub algorithm: KeyAlgorithm,
    /// Key size in bits (e.g., 2048 for RSA, 256 for P-256).
    pub bits: Property<u32>,
    /// Named curve for EC keys (e.g., "P-256").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    /// RSA public exponent, typically 65537.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exponent: Option<u64>,
}

/// Date-time representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateTime {
    /// ISO 8601 formatted string.
    pub iso8601: String,
    /// Unix timestamp.
    pub timestamp: i64,
}

impl DateTime {
    pub fn from_timestamp(timestamp: i64) -> Self {
        let iso8601 = match ::time::OffsetDateTime::from_unix_timestamp(timestamp) {
            Ok(dt) => format!(
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
                dt.year(),
                u8::from(dt.month()),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second()
            ),
            Err(_) => timestamp.to_string(),
        };
        DateTime { iso8601, timestamp }
    }

    /// Format in OpenSSL's default date style: `Feb  3 23:57:06 2026 GMT`.
    pub fn to_openssl(&self) -> String {
        match ::time::OffsetDateTime::from_unix_timestamp(self.timestamp) {
            Ok(dt) => {
                let month = match u8::from(dt.month()) {
                    1 => "Jan",
                    2 => "Feb",
                    3 => "Mar",
                    4 => "Apr",
                    5 => "May",
                    6 => "Jun",
                    7 => "Jul",
                    8 => "Aug",
                    9 => "Sep",
                    10 => "Oct",
                    11 => "Nov",
                    12 => "Dec",
                    _ => "???",
                };
                format!(
                    "{} {:2} {:02}:{:02}:{:02} {} GMT",
                    month,
                    dt.day(),
                    dt.hour(),
                    dt.minute(),
                    dt.second(),
                    dt.year()
                )
            }
            Err(_) => self.iso8601.clone(),
        }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_openssl())
    }
}

/// The BasicConstraints extension, when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BasicConstraints {
    pub ca: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_len: Option<u32>,
}

/// A parsed X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCertificate {
    /// Certificate version (1, 2, or 3).
    pub version: u32,
    /// Serial number as a colon-separated hex string.
    pub serial: String,
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    pub not_before: DateTime,
    pub not_after: DateTime,
    pub public_key: PublicKeyInfo,
    /// Signature algorithm name, e.g. "sha256WithRSAEncryption".
    pub signature_algorithm: String,
    /// Signature algorithm OID in dotted-decimal form.
    pub signature_oid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_constraints: Option<BasicConstraints>,
    /// SHA-256 fingerprint, colon-separated uppercase hex.
    pub fingerprint_sha256: String,

    /// Raw DER bytes of the subject name, for issuer lookups.
    #[serde(skip)]
    pub subject_raw: Vec<u8>,
    /// Raw DER bytes of the issuer name.
    #[serde(skip)]
    pub issuer_raw: Vec<u8>,
    /// Raw DER bytes of the entire certificate.
    #[serde(skip)]
    pub raw_der: Vec<u8>,
}

impl ParsedCertificate {
    /// Return the subject as a one-line string.
    pub fn subject_string(&self) -> String {
        self.subject.to_oneline()
    }

    /// Return the issuer as a one-line string.
    pub fn issuer_string(&self) -> String {
        self.issuer.to_oneline()
    }

    /// Subject and issuer names are byte-identical.
    pub fn is_self_issued(&self) -> bool {
        self.subject_raw == self.issuer_raw
    }

    /// Whether BasicConstraints marks this certificate as a CA. Version 1
    /// certificates carry no extensions and are accepted as issuers.
    pub fn is_ca(&self) -> bool {
        match self.basic_constraints {
            Some(bc) => bc.ca,
            None => self.version < 3,
        }
    }

    /// Compute the fingerprint of the certificate using the given digest algorithm.
    pub fn fingerprint(&self, algorithm: DigestAlgorithm) -> String {
        crate::fingerprint::compute_fingerprint(&self.raw_der, algorithm)
    }
}

/// Whether private key material is protected at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionState {
    Encrypted,
    Plaintext,
}

impl fmt::Display for EncryptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionState::Encrypted => f.write_str("encrypted"),
            EncryptionState::Plaintext => f.write_str("plaintext"),
        }
    }
}

/// The container a private key was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyFormat {
    Pkcs8,
    EncryptedPkcs8,
    Pkcs1,
    Sec1,
    TraditionalDsa,
    LegacyEncryptedPem,
    Pkcs12Bag,
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyFormat::Pkcs8 => "PKCS#8",
            KeyFormat::EncryptedPkcs8 => "encrypted PKCS#8",
            KeyFormat::Pkcs1 => "PKCS#1",
            KeyFormat::Sec1 => "SEC1",
            KeyFormat::TraditionalDsa => "traditional DSA",
            KeyFormat::LegacyEncryptedPem => "legacy encrypted PEM",
            KeyFormat::Pkcs12Bag => "PKCS#12 bag",
        };
        f.write_str(s)
    }
}

/// A parsed private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedKey {
    pub algorithm: Property<KeyAlgorithm>,
    pub bits: Property<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    pub encryption: EncryptionState,
    /// Name of the encryption scheme, e.g. "PBES2/PBKDF2/aes-256-cbc".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_scheme: Option<String>,
    pub format: KeyFormat,
    /// Subject of the certificate this key was bundled with. Informational.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// A parsed PKCS#10 certificate signing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCsr {
    pub subject: DistinguishedName,
    pub public_key: PublicKeyInfo,
    pub signature_algorithm: String,
    pub signature_oid: String,
    #[serde(skip)]
    pub raw_der: Vec<u8>,
}

/// The integrity MAC of a PKCS#12 bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacInfo {
    /// Digest name, e.g. "sha256".
    pub algorithm: String,
    pub oid: String,
    pub iterations: u32,
    pub salt_len: usize,
}

/// One certificate/key pairing extracted from a PKCS#12 bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PfxEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<ParsedCertificate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<ParsedKey>,
}

/// A parsed PKCS#12 bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedPfxBundle {
    /// `None` when the bundle carries no MacData.
    pub mac: Option<MacInfo>,
    /// Every content and bag encryption scheme seen, in encounter order.
    pub encryption_algorithms: Vec<String>,
    /// Whether certificates and keys were decrypted and extracted.
    pub extracted: bool,
    /// Why they were not, when `extracted` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unextracted_reason: Option<String>,
    pub entries: Vec<PfxEntry>,
}

impl ParsedPfxBundle {
    pub fn certificates(&self) -> impl Iterator<Item = &ParsedCertificate> {
        self.entries.iter().filter_map(|e| e.certificate.as_ref())
    }

    pub fn keys(&self) -> impl Iterator<Item = &ParsedKey> {
        self.entries.iter().filter_map(|e| e.key.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_display() {
        let p: Property<u32> = Property::Known(2048);
        assert_eq!(p.to_string(), "2048");
        let u: Property<u32> = Property::undetermined("key is encrypted");
        assert_eq!(u.to_string(), "undetermined (key is encrypted)");
        assert!(u.known().is_none());
    }

    #[test]
    fn key_algorithm_from_oid() {
        assert_eq!(KeyAlgorithm::from_oid("1.2.840.113549.1.1.1"), KeyAlgorithm::Rsa);
        assert_eq!(KeyAlgorithm::from_oid("1.3.101.112").implied_bits(), Some(256));
        assert_eq!(
            KeyAlgorithm::from_oid("1.2.3.4").to_string(),
            "1.2.3.4".to_string()
        );
    }

    #[test]
    fn oneline_escapes_separators() {
        let dn = DistinguishedName {
            components: vec![
                ("O".into(), "Acme, Inc".into()),
                ("CN".into(), "a=b".into()),
            ],
        };
        assert_eq!(dn.to_oneline(), "O = Acme\\, Inc, CN = a\\=b");
        assert_eq!(dn.get("CN"), Some("a=b"));
    }

    #[test]
    fn datetime_openssl_format() {
        let dt = DateTime::from_timestamp(1_609_459_200);
        assert_eq!(dt.to_openssl(), "Jan  1 00:00:00 2021 GMT");
        assert_eq!(dt.iso8601, "2021-01-01T00:00:00Z");
    }
}
