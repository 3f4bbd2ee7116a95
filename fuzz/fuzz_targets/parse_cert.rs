#![no_main]

use libfuzzer_sys::fuzz_target;
use pkiscan_lib::{evaluate, parse_certificate, parse_csr, verify, DigestAlgorithm, RuleOptions};

fuzz_target!(|data: &[u8]| {
    // The parsers must never panic, regardless of input.
    if let Ok(cert) = parse_certificate(data) {
        let _ = cert.subject_string();
        let _ = cert.issuer_string();
        let _ = cert.fingerprint(DigestAlgorithm::Sha1);
        let _ = evaluate(&cert, &RuleOptions::default());
        let _ = verify(&cert, None);
    }

    if let Ok(csr) = parse_csr(data) {
        let _ = evaluate(&csr, &RuleOptions::default());
    }
});
