//! Certificate fingerprints.

use crate::fields::DigestAlgorithm;
use crate::util::hex_colon_upper;
use digest::Digest;

/// Digest DER bytes and render the result as colon-separated uppercase hex.
pub fn compute_fingerprint(der_bytes: &[u8], algorithm: DigestAlgorithm) -> String {
    match algorithm {
        DigestAlgorithm::Sha256 => hex_colon_upper(&sha2::Sha256::digest(der_bytes)),
        DigestAlgorithm::Sha384 => hex_colon_upper(&sha2::Sha384::digest(der_bytes)),
        DigestAlgorithm::Sha512 => hex_colon_upper(&sha2::Sha512::digest(der_bytes)),
        DigestAlgorithm::Sha1 => hex_colon_upper(&sha1::Sha1::digest(der_bytes)),
    }
}
