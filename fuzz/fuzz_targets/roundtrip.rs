#![no_main]

use libfuzzer_sys::fuzz_target;
use pkiscan_lib::{der_to_pem, parse_certificate_der, pem_to_der};

fuzz_target!(|data: &[u8]| {
    // A certificate that parses from DER must survive PEM wrapping unchanged.
    if let Ok(cert1) = parse_certificate_der(data) {
        let pem = der_to_pem(&cert1.raw_der);
        let der_back = pem_to_der(pem.as_bytes()).expect("wrapped DER must unwrap");
        let cert2 = parse_certificate_der(&der_back).expect("unwrapped DER must reparse");
        assert_eq!(cert1, cert2, "certificate changed across PEM round trip");
    }
});
