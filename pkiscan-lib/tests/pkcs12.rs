#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! PKCS#12 tests. Every bundle in `testdata/` uses the passphrase "secret".

use pkiscan_lib::*;
use std::path::PathBuf;

fn fixture(name: &str) -> Vec<u8> {
    let mut p = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.pop();
    p.push("testdata");
    p.push(name);
    std::fs::read(&p).unwrap_or_else(|e| panic!("{}: {}", p.display(), e))
}

#[test]
fn mac_is_readable_without_passphrase() {
    let bundle = parse_pfx(&fixture("modern.pfx"), None).unwrap();
    let mac = bundle.mac.as_ref().unwrap();
    assert_eq!(mac.algorithm, "sha256");
    assert_eq!(mac.iterations, 2048);
    assert_eq!(mac.salt_len, 8);
    assert!(!bundle.extracted);
    assert!(bundle.entries.is_empty());
    assert!(!bundle.encryption_algorithms.is_empty());
}

#[test]
fn wrong_passphrase_extracts_nothing() {
    for name in ["modern.pfx", "legacy-sha1.pfx"] {
        assert_eq!(
            parse_pfx(&fixture(name), Some("wrong")),
            Err(ParseError::AuthenticationFailed),
            "{name}"
        );
        // The MAC algorithm is still available from a passphrase-free parse.
        assert!(parse_pfx(&fixture(name), None).unwrap().mac.is_some());
    }
}

#[test]
fn modern_bundle_extracts_pair() {
    let bundle = parse_pfx(&fixture("modern.pfx"), Some("secret")).unwrap();
    assert!(bundle.extracted);
    assert_eq!(bundle.entries.len(), 1);
    let entry = &bundle.entries[0];
    assert_eq!(entry.friendly_name.as_deref(), Some("modern"));
    let cert = entry.certificate.as_ref().unwrap();
    assert_eq!(cert.subject.get("CN"), Some("rsa2048.example"));
    let key = entry.key.as_ref().unwrap();
    assert_eq!(key.format, KeyFormat::Pkcs12Bag);
    assert_eq!(key.bits, Property::Known(2048));
    assert_eq!(key.owner.as_deref(), Some(cert.subject_string().as_str()));
    assert!(bundle
        .encryption_algorithms
        .iter()
        .all(|a| a == "PBES2 (PBKDF2-hmacWithSHA256, aes-256-cbc)"));
}

#[test]
fn legacy_bundle_is_flagged() {
    let bundle = parse_pfx(&fixture("legacy-sha1.pfx"), Some("secret")).unwrap();
    assert_eq!(bundle.mac.as_ref().unwrap().algorithm, "sha1");
    assert!(bundle
        .encryption_algorithms
        .iter()
        .any(|a| a == "pbeWithSHA1And3-KeyTripleDES-CBC"));
    assert_eq!(bundle.certificates().count(), 1);
    assert_eq!(bundle.keys().count(), 1);

    let findings = evaluate(&bundle, &RuleOptions::default());
    let rules: Vec<Rule> = findings.iter().map(|f| f.rule()).collect();
    assert_eq!(rules, vec![Rule::WeakMac, Rule::WeakEncryption]);
    assert!(findings.iter().all(|f| f.severity() == Severity::Warning));
}

#[test]
fn modern_bundle_has_no_findings_once_extracted() {
    let bundle = parse_pfx(&fixture("modern.pfx"), Some("secret")).unwrap();
    assert!(evaluate(&bundle, &RuleOptions::default()).is_empty());

    let locked = parse_pfx(&fixture("modern.pfx"), None).unwrap();
    let findings = evaluate(&locked, &RuleOptions::default());
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule(), Rule::NotExtracted);
    assert_eq!(findings[0].severity(), Severity::Info);
}

#[test]
fn bundled_ca_is_a_certificate_only_entry() {
    let bundle = parse_pfx(&fixture("leaf-with-ca.pfx"), Some("secret")).unwrap();
    assert_eq!(bundle.certificates().count(), 2);
    assert_eq!(bundle.keys().count(), 1);
    let leaf = bundle
        .entries
        .iter()
        .find(|e| e.friendly_name.as_deref() == Some("leaf"))
        .unwrap();
    assert!(leaf.key.is_some());
    assert!(bundle
        .entries
        .iter()
        .any(|e| e.key.is_none() && e.certificate.as_ref().is_some_and(|c| c.is_ca())));
}

#[test]
fn not_a_bundle() {
    assert!(parse_pfx(&fixture("rsa2048-self.der"), None).is_err());
    assert!(parse_pfx(&fixture("modern.pfx")[..100], None).is_err());
}

#[test]
fn rc2_encrypted_certificates_are_extracted() {
    let bundle = parse_pfx(&fixture("legacy-rc2.pfx"), Some("secret")).unwrap();
    assert!(bundle.extracted);
    assert_eq!(bundle.unextracted_reason, None);
    assert_eq!(bundle.entries.len(), 1);
    let entry = &bundle.entries[0];
    assert_eq!(entry.friendly_name.as_deref(), Some("legacy-rc2"));
    assert_eq!(
        entry.certificate.as_ref().unwrap().subject.get("CN"),
        Some("rsa2048.example")
    );
    assert_eq!(entry.key.as_ref().unwrap().bits, Property::Known(2048));
}
