#![no_main]

use libfuzzer_sys::fuzz_target;
use pkiscan_lib::{
    display_text, evaluate, inspect_bytes, parse_key, parse_pfx, ArtifactKind, InspectOptions,
    RuleOptions,
};

fuzz_target!(|data: &[u8]| {
    // Keys and PKCS#12 bundles, with and without a passphrase.
    for passphrase in [None, Some(""), Some("secret")] {
        if let Ok(key) = parse_key(data, passphrase) {
            let _ = evaluate(&key, &RuleOptions::default());
        }
        if let Ok(bundle) = parse_pfx(data, passphrase) {
            let _ = evaluate(&bundle, &RuleOptions::default());
        }
    }

    // The dispatcher on every parser selection.
    let options = InspectOptions::default();
    for kind in [
        ArtifactKind::Pfx,
        ArtifactKind::Pem,
        ArtifactKind::Csr,
        ArtifactKind::Key,
        ArtifactKind::Unknown,
    ] {
        if let Ok(report) = inspect_bytes("fuzz", data, kind, Some("secret"), &options) {
            let _ = display_text(&report);
        }
    }
});
