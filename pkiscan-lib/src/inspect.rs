//! Dispatcher: pick a parser for an artifact, run the rules, verify
//! certificates and assemble report sections.

use crate::fields::{ParsedCertificate, ParsedKey, Property};
use crate::key::{parse_key_pem_block, KEY_LABELS};
use crate::parser::{parse_certificate_der, parse_csr, parse_csr_der, CERTIFICATE_LABELS, CSR_LABELS};
use crate::report::{build_section, Report, ReportSection, Summary};
use crate::rules::{evaluate, verification_finding, RuleOptions};
use crate::verify::{verify_with_options, TrustStore, VerifyOptions};
use crate::{parse_key, parse_pfx, util, InspectError, ParseError};
use std::fmt;
use std::path::Path;

/// Largest input accepted, in bytes.
pub const MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Parser selected for an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// PKCS#12 (`.pfx`, `.p12`).
    Pfx,
    /// PEM or DER certificates and keys (`.pem`, `.crt`, `.cer`, `.der`).
    Pem,
    /// PKCS#10 request (`.csr`, `.req`).
    Csr,
    /// Private key (`.key`).
    Key,
    /// Anything else; decided by content.
    Unknown,
}

impl ArtifactKind {
    /// Map a file extension, without the dot, case-insensitively.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "pfx" | "p12" => ArtifactKind::Pfx,
            "pem" | "crt" | "cer" | "der" => ArtifactKind::Pem,
            "csr" | "req" => ArtifactKind::Csr,
            "key" => ArtifactKind::Key,
            _ => ArtifactKind::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(ArtifactKind::Unknown, ArtifactKind::from_extension)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactKind::Pfx => "pkcs12",
            ArtifactKind::Pem => "pem",
            ArtifactKind::Csr => "csr",
            ArtifactKind::Key => "key",
            ArtifactKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Trust set used for certificate verification.
#[derive(Debug, Clone, Default)]
pub enum TrustSource {
    /// Each certificate is checked against itself.
    #[default]
    SelfSigned,
    Anchors(TrustStore),
}

impl TrustSource {
    fn store(&self) -> Option<&TrustStore> {
        match self {
            TrustSource::SelfSigned => None,
            TrustSource::Anchors(store) => Some(store),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
    pub rules: RuleOptions,
    pub trust: TrustSource,
}

/// Read and inspect one file.
///
/// `extension` overrides the extension taken from `path`.
pub fn inspect(
    path: &Path,
    extension: Option<&str>,
    passphrase: Option<&str>,
    options: &InspectOptions,
) -> Result<Report, InspectError> {
    let label = path.display().to_string();
    let meta = std::fs::metadata(path).map_err(|source| InspectError::Io {
        path: label.clone(),
        source,
    })?;
    if meta.len() > MAX_INPUT_BYTES {
        return Err(InspectError::TooLarge {
            path: label,
            size: meta.len(),
            limit: MAX_INPUT_BYTES,
        });
    }
    let data = std::fs::read(path).map_err(|source| InspectError::Io {
        path: label.clone(),
        source,
    })?;

    let kind = extension.map_or_else(|| ArtifactKind::from_path(path), ArtifactKind::from_extension);
    inspect_bytes(&label, &data, kind, passphrase, options)
}

/// Inspect an in-memory artifact. `label` names it in the report.
pub fn inspect_bytes(
    label: &str,
    data: &[u8],
    kind: ArtifactKind,
    passphrase: Option<&str>,
    options: &InspectOptions,
) -> Result<Report, InspectError> {
    let size = u64::try_from(data.len()).unwrap_or(u64::MAX);
    if size > MAX_INPUT_BYTES {
        return Err(InspectError::TooLarge {
            path: label.to_string(),
            size,
            limit: MAX_INPUT_BYTES,
        });
    }

    tracing::debug!(artifact = %label, kind = %kind, bytes = data.len(), "dispatching");

    let ctx = Dispatch {
        label,
        passphrase,
        options,
    };
    ctx.run(data, kind).map_err(|source| InspectError::Parse {
        path: label.to_string(),
        source,
    })
}

struct Dispatch<'a> {
    label: &'a str,
    passphrase: Option<&'a str>,
    options: &'a InspectOptions,
}

/// A decoded item awaiting its report section.
enum Item {
    Certificate(ParsedCertificate),
    Csr(crate::fields::ParsedCsr),
    Key(ParsedKey, Option<String>),
}

impl Dispatch<'_> {
    fn run(&self, data: &[u8], kind: ArtifactKind) -> Result<Report, ParseError> {
        if data.is_empty() {
            return Err(ParseError::UnrecognizedFormat("empty input".into()));
        }
        match kind {
            ArtifactKind::Pfx => self.pfx(data),
            ArtifactKind::Csr => Ok(self.items(vec![Item::Csr(parse_csr(data)?)])),
            ArtifactKind::Key => {
                let (key, failure) = self.with_passphrase(|p| parse_key(data, p))?;
                Ok(self.items(vec![Item::Key(key, failure)]))
            }
            ArtifactKind::Pem | ArtifactKind::Unknown if util::is_pem(data) => {
                self.pem_blocks(data)
            }
            ArtifactKind::Pem | ArtifactKind::Unknown => self.sniff_der(data),
        }
    }

    /// Run `parse` with the passphrase. When decryption fails because the
    /// passphrase is wrong or the scheme is one we cannot decrypt, rerun it
    /// without one and return the failure text alongside the result.
    fn with_passphrase<T>(
        &self,
        parse: impl Fn(Option<&str>) -> Result<T, ParseError>,
    ) -> Result<(T, Option<String>), ParseError> {
        match parse(self.passphrase) {
            Err(e @ (ParseError::AuthenticationFailed | ParseError::Unsupported(_)))
                if self.passphrase.is_some() =>
            {
                tracing::debug!(artifact = %self.label, error = %e, "decryption failed, reporting passphrase-free fields");
                let value = parse(None)?;
                Ok((value, Some(e.to_string())))
            }
            other => other.map(|v| (v, None)),
        }
    }

    fn pem_blocks(&self, data: &[u8]) -> Result<Report, ParseError> {
        let blocks = pem::parse_many(data)?;
        let mut items = Vec::new();
        for block in &blocks {
            let tag = block.tag();
            if CERTIFICATE_LABELS.contains(&tag) {
                items.push(Item::Certificate(parse_certificate_der(block.contents())?));
            } else if CSR_LABELS.contains(&tag) {
                items.push(Item::Csr(parse_csr_der(block.contents())?));
            } else if KEY_LABELS.contains(&tag) {
                let (key, failure) = self.with_passphrase(|p| parse_key_pem_block(block, p))?;
                items.push(Item::Key(key, failure));
            } else {
                tracing::debug!(artifact = %self.label, label = %tag, "skipping PEM block");
            }
        }
        if items.is_empty() {
            return Err(ParseError::UnrecognizedFormat(
                "no certificate, request or private key PEM block".into(),
            ));
        }
        Ok(self.items(items))
    }

    fn sniff_der(&self, data: &[u8]) -> Result<Report, ParseError> {
        if let Ok(cert) = parse_certificate_der(data) {
            tracing::debug!(artifact = %self.label, "content sniffed as certificate");
            return Ok(self.items(vec![Item::Certificate(cert)]));
        }
        if let Ok(csr) = parse_csr_der(data) {
            tracing::debug!(artifact = %self.label, "content sniffed as certificate request");
            return Ok(self.items(vec![Item::Csr(csr)]));
        }
        if let Ok((key, failure)) = self.with_passphrase(|p| parse_key(data, p)) {
            tracing::debug!(artifact = %self.label, "content sniffed as private key");
            return Ok(self.items(vec![Item::Key(key, failure)]));
        }
        if let Ok(report) = self.pfx(data) {
            tracing::debug!(artifact = %self.label, "content sniffed as PKCS#12");
            return Ok(report);
        }
        Err(ParseError::UnrecognizedFormat(
            "not a certificate, request, private key or PKCS#12 bundle".into(),
        ))
    }

    fn pfx(&self, data: &[u8]) -> Result<Report, ParseError> {
        let (mut bundle, failure) = self.with_passphrase(|p| parse_pfx(data, p))?;
        if let Some(failure) = &failure {
            bundle.unextracted_reason = Some(failure.clone());
        }

        let mut items = Vec::new();
        for (i, entry) in bundle.entries.iter().enumerate() {
            let name = entry
                .friendly_name
                .clone()
                .unwrap_or_else(|| format!("entry {}", i + 1));
            if let Some(cert) = &entry.certificate {
                items.push((name.clone(), Item::Certificate(cert.clone())));
            }
            if let Some(key) = &entry.key {
                items.push((name, Item::Key(key.clone(), None)));
            }
        }

        let findings = evaluate(&bundle, &self.options.rules);
        let mut section = build_section(self.label, Summary::Pfx { bundle }, findings);
        section.failure = failure;

        let mut report = Report::new();
        report.push(section);
        let intermediates = certificates(items.iter().map(|(_, item)| item));
        for (name, item) in items {
            let label = format!("{} [{}]", self.label, name);
            report.push(self.section(label, item, &intermediates));
        }
        Ok(report)
    }

    /// One section per item. Certificates in the same artifact serve as
    /// untrusted intermediates for each other.
    fn items(&self, items: Vec<Item>) -> Report {
        let intermediates = certificates(items.iter());
        let single = items.len() == 1;
        let mut report = Report::new();
        for (i, item) in items.into_iter().enumerate() {
            let label = if single {
                self.label.to_string()
            } else {
                format!("{} [{}]", self.label, i + 1)
            };
            report.push(self.section(label, item, &intermediates));
        }
        report
    }

    fn section(&self, label: String, item: Item, intermediates: &[ParsedCertificate]) -> ReportSection {
        let rules = &self.options.rules;
        match item {
            Item::Certificate(cert) => {
                let verify_options = VerifyOptions {
                    at_time: rules.now,
                    ..VerifyOptions::default()
                };
                let verification = verify_with_options(
                    &cert,
                    self.options.trust.store(),
                    intermediates,
                    &verify_options,
                );
                let mut findings = evaluate(&cert, rules);
                findings.extend(verification_finding(&verification));
                build_section(
                    label,
                    Summary::Certificate {
                        certificate: cert,
                        verification,
                    },
                    findings,
                )
            }
            Item::Csr(csr) => {
                let findings = evaluate(&csr, rules);
                build_section(label, Summary::Csr { csr }, findings)
            }
            Item::Key(mut key, failure) => {
                if let Some(failure) = &failure {
                    let reason = format!("key could not be decrypted: {}", failure);
                    if !key.algorithm.is_known() {
                        key.algorithm = Property::undetermined(reason.clone());
                    }
                    if !key.bits.is_known() {
                        key.bits = Property::undetermined(reason);
                    }
                }
                let findings = evaluate(&key, rules);
                let mut section = build_section(label, Summary::Key { key }, findings);
                section.failure = failure;
                section
            }
        }
    }
}

fn certificates<'a>(items: impl Iterator<Item = &'a Item>) -> Vec<ParsedCertificate> {
    items
        .filter_map(|item| match item {
            Item::Certificate(cert) => Some(cert.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_map_to_parsers() {
        assert_eq!(ArtifactKind::from_extension("PFX"), ArtifactKind::Pfx);
        assert_eq!(ArtifactKind::from_extension("p12"), ArtifactKind::Pfx);
        assert_eq!(ArtifactKind::from_extension("crt"), ArtifactKind::Pem);
        assert_eq!(ArtifactKind::from_extension("req"), ArtifactKind::Csr);
        assert_eq!(ArtifactKind::from_extension("key"), ArtifactKind::Key);
        assert_eq!(ArtifactKind::from_extension("txt"), ArtifactKind::Unknown);
        assert_eq!(
            ArtifactKind::from_path(Path::new("dir.d/cert")),
            ArtifactKind::Unknown
        );
    }

    #[test]
    fn garbage_is_unrecognized() {
        let err = inspect_bytes(
            "junk.bin",
            b"\x01\x02\x03 not a certificate",
            ArtifactKind::Unknown,
            None,
            &InspectOptions::default(),
        );
        assert!(matches!(
            err,
            Err(InspectError::Parse {
                source: ParseError::UnrecognizedFormat(_),
                ..
            })
        ));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let data = vec![0u8; usize::try_from(MAX_INPUT_BYTES).unwrap_or(usize::MAX) + 1];
        let err = inspect_bytes("big.pem", &data, ArtifactKind::Pem, None, &InspectOptions::default());
        assert!(matches!(err, Err(InspectError::TooLarge { .. })));
    }

    #[test]
    fn pem_without_known_blocks_is_unrecognized() {
        let data = b"-----BEGIN X509 CRL-----\nMAA=\n-----END X509 CRL-----\n";
        let err = inspect_bytes("crl.pem", data, ArtifactKind::Pem, None, &InspectOptions::default());
        assert!(matches!(
            err,
            Err(InspectError::Parse {
                source: ParseError::UnrecognizedFormat(_),
                ..
            })
        ));
    }
}
