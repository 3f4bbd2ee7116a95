#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Rule engine and chain validator behaviour on real fixtures.

use pkiscan_lib::*;
use std::path::PathBuf;
use std::time::Duration;

fn fixture(name: &str) -> Vec<u8> {
    let mut p = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.pop();
    p.push("testdata");
    p.push(name);
    std::fs::read(&p).unwrap_or_else(|e| panic!("{}: {}", p.display(), e))
}

fn cert(name: &str) -> ParsedCertificate {
    parse_certificate(&fixture(name)).unwrap()
}

fn warnings(findings: &[HygieneFinding]) -> Vec<Rule> {
    findings
        .iter()
        .filter(|f| f.severity() == Severity::Warning)
        .map(HygieneFinding::rule)
        .collect()
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[test]
fn sha256_certificate_is_clean() {
    for name in ["rsa2048-self.pem", "ec-p256-self.pem", "leaf.pem"] {
        assert!(evaluate(&cert(name), &RuleOptions::default()).is_empty(), "{name}");
    }
}

#[test]
fn weak_signatures_are_flagged() {
    let md5 = evaluate(&cert("rsa2048-md5.pem"), &RuleOptions::default());
    assert_eq!(warnings(&md5), vec![Rule::WeakAlgorithm]);
    assert!(md5[0].message().contains("md5"));

    let sha1 = evaluate(&cert("rsa1024-sha1.pem"), &RuleOptions::default());
    assert_eq!(warnings(&sha1), vec![Rule::WeakAlgorithm, Rule::ShortKey]);
    assert!(sha1[0].message().contains("sha1WithRSAEncryption"));
    assert!(sha1[1].message().contains("1024"));
}

#[test]
fn weak_csr_has_exactly_two_warnings() {
    let csr = parse_csr(&fixture("rsa1024-sha1.csr")).unwrap();
    let findings = evaluate(&csr, &RuleOptions::default());
    assert_eq!(findings.len(), 2);
    assert_eq!(warnings(&findings), vec![Rule::WeakAlgorithm, Rule::ShortKey]);
    assert!(findings[0].message().contains("sha1WithRSAEncryption"));
    assert!(findings[1].message().contains("1024"));

    let strong = parse_csr(&fixture("rsa2048-sha256.csr")).unwrap();
    assert!(evaluate(&strong, &RuleOptions::default()).is_empty());
}

#[test]
fn legacy_signature_algorithms_on_whole_entities() {
    let base = cert("rsa2048-self.pem");
    let request = parse_csr(&fixture("rsa2048-sha256.csr")).unwrap();
    for (sig, token) in [
        ("md2WithRSAEncryption", "md2"),
        ("md4WithRSAEncryption", "md4"),
        ("ecdsa-with-SHA1", "ecdsa-with-SHA1"),
        ("DSA-SHA1", "DSA-SHA1"),
        ("dsaWithSHA1", "sha1"),
    ] {
        let mut certificate = base.clone();
        certificate.signature_algorithm = sig.into();
        let findings = evaluate(&certificate, &RuleOptions::default());
        assert_eq!(warnings(&findings), vec![Rule::WeakAlgorithm], "{sig}");
        assert_eq!(
            findings[0].message(),
            format!("weak signature algorithm {} (matched {})", sig, token)
        );

        let mut csr = request.clone();
        csr.signature_algorithm = sig.into();
        assert_eq!(
            warnings(&evaluate(&csr, &RuleOptions::default())),
            vec![Rule::WeakAlgorithm],
            "{sig}"
        );
    }
}

#[test]
fn rc4_protection_is_weak_encryption() {
    let mut key = parse_key(&fixture("rsa2048-pkcs8-encrypted.key"), None).unwrap();
    key.encryption_scheme = Some("PBES2 (PBKDF2-hmacWithSHA256, rc4)".into());
    let findings = evaluate(&key, &RuleOptions::default());
    assert_eq!(warnings(&findings), vec![Rule::WeakEncryption]);
    assert!(findings
        .iter()
        .any(|f| f.message().ends_with("(matched RC4)")));

    // The PKCS#12 RC4 schemes are caught by their SHA-1 first.
    let mut bundle = parse_pfx(&fixture("modern.pfx"), None).unwrap();
    bundle.encryption_algorithms = vec!["pbeWithSHA1And128BitRC4".into()];
    let findings = evaluate(&bundle, &RuleOptions::default());
    assert_eq!(warnings(&findings), vec![Rule::WeakEncryption]);
    assert!(findings[0].message().ends_with("(matched sha1)"));
}

#[test]
fn key_length_thresholds() {
    let short = parse_key(&fixture("rsa1024-sha1.key"), None).unwrap();
    assert!(warnings(&evaluate(&short, &RuleOptions::default())).contains(&Rule::ShortKey));
    for name in ["rsa2048-self.key", "rsa3072-pkcs8.key", "ec-p256.key", "ed25519.key"] {
        let key = parse_key(&fixture(name), None).unwrap();
        let rules = warnings(&evaluate(&key, &RuleOptions::default()));
        assert!(!rules.contains(&Rule::ShortKey), "{name}");
    }
}

#[test]
fn plaintext_keys_are_flagged() {
    let key = parse_key(&fixture("rsa2048-pkcs1.key"), None).unwrap();
    assert_eq!(
        warnings(&evaluate(&key, &RuleOptions::default())),
        vec![Rule::UnencryptedKey]
    );
}

#[test]
fn encrypted_key_without_passphrase_gets_info_only() {
    let key = parse_key(&fixture("rsa2048-pkcs8-encrypted.key"), None).unwrap();
    let findings = evaluate(&key, &RuleOptions::default());
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule(), Rule::ShortKey);
    assert_eq!(findings[0].severity(), Severity::Info);
}

#[test]
fn legacy_pem_encryption_is_flagged_for_md5_kdf() {
    let key = parse_key(&fixture("rsa2048-legacy-encrypted.key"), Some("secret")).unwrap();
    assert_eq!(
        warnings(&evaluate(&key, &RuleOptions::default())),
        vec![Rule::WeakEncryption]
    );
}

#[test]
fn expiry_window_is_opt_in() {
    let c = cert("rsa2048-self.pem");
    let near_end = RuleOptions {
        now: Some(c.not_after.timestamp - 10 * 86_400),
        expiry_window: Some(Duration::from_secs(30 * 86_400)),
    };
    assert_eq!(warnings(&evaluate(&c, &near_end)), vec![Rule::ExpiringSoon]);

    let no_window = RuleOptions {
        now: near_end.now,
        expiry_window: None,
    };
    assert!(evaluate(&c, &no_window).is_empty());

    let far = RuleOptions {
        now: Some(c.not_before.timestamp),
        expiry_window: Some(Duration::from_secs(30 * 86_400)),
    };
    assert!(evaluate(&c, &far).is_empty());
}

// ---------------------------------------------------------------------------
// Chain validator
// ---------------------------------------------------------------------------

#[test]
fn self_verification() {
    let result = verify(&cert("rsa2048-self.pem"), None);
    assert!(result.valid);
    assert_eq!(result.reason, "ok");
    assert_eq!(result.mode.to_string(), "self (not a chain-of-trust check)");

    let expired = verify(&cert("expired-self.pem"), None);
    assert!(!expired.valid);
    assert_eq!(expired.reason, "expired");
}

#[test]
fn ec_self_signed_verifies() {
    assert!(verify(&cert("ec-p256-self.pem"), None).valid);
}

#[test]
fn issued_certificate_fails_self_verification() {
    let result = verify(&cert("leaf.pem"), None);
    assert!(!result.valid);
    assert_eq!(result.reason, "unknown issuer");
}

#[test]
fn leaf_validates_against_its_root() {
    let store = TrustStore::from_pem(&fixture("root-ca.pem")).unwrap();
    let result = verify(&cert("leaf.pem"), Some(&store));
    assert!(result.valid, "{:?}", result.errors);
    assert_eq!(result.reason, "ok");
    assert_eq!(result.chain.len(), 2);
    assert!(result.chain[1].trusted);
    assert_eq!(result.mode.to_string(), "1 anchor(s)");
}

#[test]
fn leaf_against_unrelated_root() {
    let store = TrustStore::from_pem(&fixture("other-ca.pem")).unwrap();
    let result = verify(&cert("leaf.pem"), Some(&store));
    assert!(!result.valid);
    assert_eq!(result.reason, "unknown issuer");
}

#[test]
fn root_as_untrusted_intermediate_is_not_enough() {
    let store = TrustStore::from_pem(&fixture("other-ca.pem")).unwrap();
    let root = cert("root-ca.pem");
    let result = verify_with_options(
        &cert("leaf.pem"),
        Some(&store),
        &[root],
        &VerifyOptions::default(),
    );
    assert_eq!(result.reason, "unknown issuer");
}

#[test]
fn expiry_is_reported_before_issuer() {
    let store = TrustStore::from_pem(&fixture("root-ca.pem")).unwrap();
    let result = verify(&cert("expired-self.pem"), Some(&store));
    assert_eq!(result.reason, "expired");
    assert_eq!(result.errors.len(), 2);
}

#[test]
fn failed_verification_becomes_info_finding() {
    let finding = verification_finding(&verify(&cert("expired-self.pem"), None)).unwrap();
    assert_eq!(finding.rule(), Rule::ChainVerification);
    assert_eq!(finding.severity(), Severity::Info);
    assert!(finding.message().contains("expired"));

    assert!(verification_finding(&verify(&cert("rsa2048-self.pem"), None)).is_none());
}

#[test]
fn interchangeable_intermediates_stop_at_the_search_budget() {
    let options = InspectOptions {
        trust: TrustSource::Anchors(TrustStore::from_pem(&fixture("other-ca.pem")).unwrap()),
        ..InspectOptions::default()
    };
    let report = inspect_bytes(
        "same-name-12.pem",
        &fixture("same-name-12.pem"),
        ArtifactKind::Pem,
        None,
        &options,
    )
    .unwrap();
    assert_eq!(report.len(), 12);
    for section in &report.sections {
        let Summary::Certificate { verification, .. } = &section.summary else {
            panic!("unexpected summary {:?}", section.summary);
        };
        assert!(!verification.valid);
        assert_eq!(verification.reason, "undetermined (path search limit reached)");
        assert_eq!(verification.chain.len(), 1);
    }
}
