//! Human-readable and JSON formatting of a report.

use crate::fields::{ParsedCertificate, ParsedCsr, ParsedKey, ParsedPfxBundle, Property, PublicKeyInfo};
use crate::report::{Report, ReportSection, Summary};
use crate::verify::VerificationResult;
use crate::InspectError;

/// Format a report as text, one block per section.
///
/// Fields that could not be determined are printed as
/// `undetermined (<reason>)` rather than left out.
pub fn display_text(report: &Report) -> String {
    let mut out = String::new();
    for (i, section) in report.sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        format_section(&mut out, section);
    }
    out
}

fn format_section(out: &mut String, section: &ReportSection) {
    out.push_str(&format!(
        "== {} ({}) ==\n",
        section.artifact,
        section.summary.kind()
    ));

    match &section.summary {
        Summary::Certificate {
            certificate,
            verification,
        } => {
            format_certificate(out, certificate);
            format_verification(out, verification);
        }
        Summary::Key { key } => format_key(out, key),
        Summary::Csr { csr } => format_csr(out, csr),
        Summary::Pfx { bundle } => format_pfx(out, bundle),
    }

    if section.findings.is_empty() {
        out.push_str("Findings: none\n");
    } else {
        out.push_str("Findings:\n");
        for finding in &section.findings {
            out.push_str(&format!("  {}\n", finding));
        }
    }

    if let Some(failure) = &section.failure {
        out.push_str(&format!("Error: {}\n", failure));
    }
}

fn bits(p: &Property<u32>) -> String {
    match p {
        Property::Known(b) => format!("{} bit", b),
        other => other.to_string(),
    }
}

fn format_public_key(out: &mut String, pk: &PublicKeyInfo) {
    out.push_str(&format!("  Public Key: {}\n", pk.algorithm));
    out.push_str(&format!("    Key Length: {}\n", bits(&pk.bits)));
    if let Some(curve) = &pk.curve {
        out.push_str(&format!("    Curve: {}\n", curve));
    }
    if let Some(e) = pk.exponent {
        out.push_str(&format!("    Exponent: {} (0x{:x})\n", e, e));
    }
}

fn format_certificate(out: &mut String, cert: &ParsedCertificate) {
    out.push_str("Certificate:\n");
    out.push_str(&format!("  Version: {}\n", cert.version));
    out.push_str(&format!("  Serial: {}\n", cert.serial));
    out.push_str(&format!("  Subject: {}\n", cert.subject_string()));
    out.push_str(&format!("  Issuer: {}\n", cert.issuer_string()));
    out.push_str("  Validity:\n");
    out.push_str(&format!("    Not Before: {}\n", cert.not_before));
    out.push_str(&format!("    Not After:  {}\n", cert.not_after));
    format_public_key(out, &cert.public_key);
    out.push_str(&format!(
        "  Signature Algorithm: {}\n",
        cert.signature_algorithm
    ));
    if let Some(bc) = cert.basic_constraints {
        let pl = match bc.path_len {
            Some(n) => format!(", pathlen:{}", n),
            None => String::new(),
        };
        out.push_str(&format!("  Basic Constraints: CA={}{}\n", bc.ca, pl));
    }
    out.push_str(&format!(
        "  Fingerprint (SHA-256): {}\n",
        cert.fingerprint_sha256
    ));
}

fn format_verification(out: &mut String, result: &VerificationResult) {
    let status = if result.valid { "OK" } else { "FAIL" };
    out.push_str(&format!("Verification: {} ({})\n", status, result.reason));
    out.push_str(&format!("  trust: {}\n", result.mode));
    for link in &result.chain {
        let marker = if link.trusted { " [trusted]" } else { "" };
        out.push_str(&format!("  {}: {}{}\n", link.depth, link.subject, marker));
    }
    for error in &result.errors {
        out.push_str(&format!("  error: {}\n", error));
    }
}

fn format_key(out: &mut String, key: &ParsedKey) {
    out.push_str("Private Key:\n");
    out.push_str(&format!("  Algorithm: {}\n", key.algorithm));
    out.push_str(&format!("  Key Length: {}\n", bits(&key.bits)));
    if let Some(curve) = &key.curve {
        out.push_str(&format!("  Curve: {}\n", curve));
    }
    out.push_str(&format!("  Format: {}\n", key.format));
    match &key.encryption_scheme {
        Some(scheme) => out.push_str(&format!("  Encryption: {} ({})\n", key.encryption, scheme)),
        None => out.push_str(&format!("  Encryption: {}\n", key.encryption)),
    }
    if let Some(owner) = &key.owner {
        out.push_str(&format!("  Owner: {}\n", owner));
    }
}

fn format_csr(out: &mut String, csr: &ParsedCsr) {
    out.push_str("Certificate Request:\n");
    out.push_str(&format!("  Subject: {}\n", csr.subject));
    format_public_key(out, &csr.public_key);
    out.push_str(&format!(
        "  Signature Algorithm: {}\n",
        csr.signature_algorithm
    ));
}

fn format_pfx(out: &mut String, bundle: &ParsedPfxBundle) {
    out.push_str("PKCS#12:\n");
    match &bundle.mac {
        Some(mac) => out.push_str(&format!(
            "  MAC: {} ({} iterations, {}-byte salt)\n",
            mac.algorithm, mac.iterations, mac.salt_len
        )),
        None => out.push_str("  MAC: absent\n"),
    }
    if bundle.encryption_algorithms.is_empty() {
        out.push_str("  Encryption: none\n");
    } else {
        out.push_str("  Encryption:\n");
        for alg in &bundle.encryption_algorithms {
            out.push_str(&format!("    {}\n", alg));
        }
    }
    if bundle.extracted {
        out.push_str(&format!("  Entries: {}\n", bundle.entries.len()));
        for entry in &bundle.entries {
            let name = entry.friendly_name.as_deref().unwrap_or("(unnamed)");
            let cert = entry
                .certificate
                .as_ref()
                .map_or("-".to_string(), |c| c.subject_string());
            let key = if entry.key.is_some() { "key" } else { "no key" };
            out.push_str(&format!("    {}: {}, {}\n", name, cert, key));
        }
    } else {
        let reason = bundle.unextracted_reason.as_deref().unwrap_or("not extracted");
        out.push_str(&format!("  Entries: undetermined ({})\n", reason));
    }
}

/// Serialize a report to a pretty-printed JSON string.
pub fn to_json(report: &Report) -> Result<String, InspectError> {
    serde_json::to_string_pretty(report).map_err(InspectError::Json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fields::{EncryptionState, KeyFormat, MacInfo};
    use crate::report::build_section;

    fn encrypted_key() -> ParsedKey {
        ParsedKey {
            algorithm: Property::undetermined("key is encrypted"),
            bits: Property::undetermined("key is encrypted"),
            curve: None,
            encryption: EncryptionState::Encrypted,
            encryption_scheme: Some("PBES2 (PBKDF2-hmacWithSHA256, aes-256-cbc)".into()),
            format: KeyFormat::EncryptedPkcs8,
            owner: None,
        }
    }

    #[test]
    fn undetermined_fields_are_printed() {
        let mut report = Report::new();
        report.push(build_section(
            "enc.key",
            Summary::Key {
                key: encrypted_key(),
            },
            Vec::new(),
        ));
        let text = display_text(&report);
        assert!(text.contains("== enc.key (private key) =="));
        assert!(text.contains("Key Length: undetermined (key is encrypted)"));
        assert!(text.contains("Encryption: encrypted (PBES2"));
        assert!(text.contains("Findings: none"));
    }

    #[test]
    fn missing_mac_and_unextracted_bundle() {
        let bundle = ParsedPfxBundle {
            mac: None,
            encryption_algorithms: Vec::new(),
            extracted: false,
            unextracted_reason: Some("no passphrase supplied".into()),
            entries: Vec::new(),
        };
        let mut report = Report::new();
        report.push(build_section("a.pfx", Summary::Pfx { bundle }, Vec::new()));
        let text = display_text(&report);
        assert!(text.contains("MAC: absent"));
        assert!(text.contains("Entries: undetermined"));
    }

    #[test]
    fn json_tags_summary_kind() {
        let bundle = ParsedPfxBundle {
            mac: Some(MacInfo {
                algorithm: "sha256".into(),
                oid: crate::oid::SHA256.into(),
                iterations: 2048,
                salt_len: 8,
            }),
            encryption_algorithms: Vec::new(),
            extracted: false,
            unextracted_reason: Some("no passphrase supplied".into()),
            entries: Vec::new(),
        };
        let mut report = Report::new();
        report.push(build_section("a.pfx", Summary::Pfx { bundle }, Vec::new()));
        let json: serde_json::Value = serde_json::from_str(&to_json(&report).unwrap()).unwrap();
        assert_eq!(json["sections"][0]["summary"]["kind"], "pfx");
        assert_eq!(json["sections"][0]["summary"]["bundle"]["mac"]["algorithm"], "sha256");
    }
}
