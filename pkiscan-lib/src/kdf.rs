//! Password-based key derivation.
//!
//! Three derivations are needed to open password-protected containers:
//! 1. PKCS#12 KDF (RFC 7292 Appendix B) for MAC keys and legacy PKCS#12 PBE
//! 2. PBKDF2 (RFC 8018) for PBES2
//! 3. OpenSSL's `EVP_BytesToKey` with MD5 for traditional encrypted PEM
//!
//! Derived material is returned in [`Zeroizing`] buffers.

use crate::ParseError;
use digest::core_api::BlockSizeUser;
use digest::{Digest, FixedOutputReset};
use zeroize::Zeroizing;

/// PKCS#12 KDF ID values (RFC 7292 Appendix B.3).
pub(crate) const ID_KEY: u8 = 1;
pub(crate) const ID_IV: u8 = 2;
pub(crate) const ID_MAC: u8 = 3;

/// Upper bound on any iteration count read from untrusted input.
pub(crate) const MAX_ITERATIONS: u32 = 5_000_000;

pub(crate) fn check_iterations(iterations: u32) -> Result<(), ParseError> {
    if iterations == 0 {
        return Err(ParseError::Malformed("iteration count is zero".into()));
    }
    if iterations > MAX_ITERATIONS {
        return Err(ParseError::LimitExceeded(format!(
            "iteration count {} exceeds {}",
            iterations, MAX_ITERATIONS
        )));
    }
    Ok(())
}

/// PBKDF2 pseudo-random function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Prf {
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl Prf {
    pub(crate) fn from_oid(oid: &str) -> Option<Self> {
        match oid {
            crate::oid::HMAC_WITH_SHA1 => Some(Prf::HmacSha1),
            crate::oid::HMAC_WITH_SHA224 => Some(Prf::HmacSha224),
            crate::oid::HMAC_WITH_SHA256 => Some(Prf::HmacSha256),
            crate::oid::HMAC_WITH_SHA384 => Some(Prf::HmacSha384),
            crate::oid::HMAC_WITH_SHA512 => Some(Prf::HmacSha512),
            _ => None,
        }
    }
}

/// PBKDF2 with the given PRF, filling `key_len` bytes.
pub(crate) fn pbkdf2(
    prf: Prf,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    key_len: usize,
) -> Result<Zeroizing<Vec<u8>>, ParseError> {
    check_iterations(iterations)?;
    let mut out = Zeroizing::new(vec![0u8; key_len]);
    match prf {
        Prf::HmacSha1 => pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password, salt, iterations, &mut out),
        Prf::HmacSha224 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha224>(password, salt, iterations, &mut out)
        }
        Prf::HmacSha256 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, iterations, &mut out)
        }
        Prf::HmacSha384 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha384>(password, salt, iterations, &mut out)
        }
        Prf::HmacSha512 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha512>(password, salt, iterations, &mut out)
        }
    }
    Ok(out)
}

/// PKCS#12 KDF (RFC 7292 Appendix B.2).
///
/// `password` is the BMP-encoded password (see [`bmp_password`]). The
/// digest's block size is used as `v` (64 for MD5/SHA-1/SHA-256, 128 for
/// SHA-384/SHA-512).
pub(crate) fn pkcs12_kdf<D>(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, ParseError>
where
    D: Digest + FixedOutputReset + BlockSizeUser,
{
    check_iterations(iterations)?;
    let u = <D as Digest>::output_size();
    let v = D::block_size();

    let d_block = vec![id; v];
    let s = extend_to_multiple(salt, v);
    let p = extend_to_multiple(password, v);

    let mut i_block = Zeroizing::new(Vec::with_capacity(s.len() + p.len()));
    i_block.extend_from_slice(&s);
    i_block.extend_from_slice(&p);

    let num_blocks = output_len.div_ceil(u);
    let mut result = Zeroizing::new(Vec::with_capacity(num_blocks * u));

    for block_idx in 0..num_blocks {
        let mut hasher = D::new();
        Digest::update(&mut hasher, &d_block);
        Digest::update(&mut hasher, i_block.as_slice());
        let mut a = hasher.finalize_reset();
        for _ in 1..iterations {
            Digest::update(&mut hasher, &a);
            a = hasher.finalize_reset();
        }
        result.extend_from_slice(&a);

        if block_idx + 1 < num_blocks {
            let b = extend_to_multiple(&a, v);
            for chunk in i_block.chunks_mut(v) {
                add_one_plus_b(chunk, &b);
            }
        }
    }

    result.truncate(output_len);
    Ok(result)
}

/// Repeat `data` to fill a multiple of `v` bytes. Empty input stays empty.
fn extend_to_multiple(data: &[u8], v: usize) -> Zeroizing<Vec<u8>> {
    if data.is_empty() {
        return Zeroizing::new(Vec::new());
    }
    let len = data.len().div_ceil(v) * v;
    Zeroizing::new(data.iter().copied().cycle().take(len).collect())
}

/// `block = (block + b + 1) mod 2^(8 * block.len())`, big-endian.
fn add_one_plus_b(block: &mut [u8], b: &[u8]) {
    let mut carry: u16 = 1;
    for (x, y) in block.iter_mut().rev().zip(b.iter().rev()) {
        let sum = u16::from(*x) + u16::from(*y) + carry;
        *x = (sum & 0xff) as u8;
        carry = sum >> 8;
    }
}

/// Encode a password as BMP (UTF-16BE) with two trailing zero bytes.
///
/// The empty password encodes as the two-byte terminator alone.
pub(crate) fn bmp_password(password: &str) -> Zeroizing<Vec<u8>> {
    let mut bmp = Zeroizing::new(Vec::with_capacity(password.len() * 2 + 2));
    for c in password.encode_utf16() {
        bmp.extend_from_slice(&c.to_be_bytes());
    }
    bmp.extend_from_slice(&[0, 0]);
    bmp
}

/// BMP encodings to try for a passphrase. Writers disagree on the empty
/// password: some emit the terminator, some emit nothing.
pub(crate) fn bmp_candidates(password: &str) -> Vec<Zeroizing<Vec<u8>>> {
    if password.is_empty() {
        vec![bmp_password(""), Zeroizing::new(Vec::new())]
    } else {
        vec![bmp_password(password)]
    }
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration, as used by
/// traditional `Proc-Type: 4,ENCRYPTED` PEM. `salt` is the first eight
/// bytes of the IV.
pub(crate) fn evp_bytes_to_key_md5(
    password: &[u8],
    salt: &[u8],
    key_len: usize,
) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(Vec::with_capacity(key_len + 16));
    let mut prev: Option<Vec<u8>> = None;
    while key.len() < key_len {
        let mut hasher = md5::Md5::new();
        if let Some(p) = &prev {
            hasher.update(p);
        }
        hasher.update(password);
        hasher.update(salt);
        let block = hasher.finalize().to_vec();
        key.extend_from_slice(&block);
        prev = Some(block);
    }
    key.truncate(key_len);
    key
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn bmp_encoding() {
        assert_eq!(*bmp_password(""), vec![0x00, 0x00]);
        assert_eq!(*bmp_password("A"), vec![0x00, 0x41, 0x00, 0x00]);
        assert_eq!(bmp_candidates("").len(), 2);
        assert_eq!(bmp_candidates("x").len(), 1);
    }

    // RFC 7292 does not publish vectors; these come from the widely used
    // PKCS#12 KDF test set ("smeg", "queeg") shared by OpenSSL and Bouncy Castle.
    #[test]
    fn pkcs12_kdf_known_vectors() {
        let salt = hex::decode("0A58CF64530D823F").unwrap();
        let key = pkcs12_kdf::<sha1::Sha1>(ID_KEY, &bmp_password("smeg"), &salt, 1, 24).unwrap();
        assert_eq!(
            hex::encode_upper(&*key),
            "8AAAE6297B6CB04642AB5B077851284EB7128F1A2A7FBCA3"
        );
        let iv = pkcs12_kdf::<sha1::Sha1>(ID_IV, &bmp_password("smeg"), &salt, 1, 8).unwrap();
        assert_eq!(hex::encode_upper(&*iv), "79993DFE048D3B76");

        let salt = hex::decode("05DEC959ACFF72F7").unwrap();
        let key =
            pkcs12_kdf::<sha1::Sha1>(ID_KEY, &bmp_password("queeg"), &salt, 1000, 24).unwrap();
        assert_eq!(
            hex::encode_upper(&*key),
            "ED2034E36328830FF09DF1E1A07DD357185DAC0D4F9EB3D4"
        );
    }

    #[test]
    fn pkcs12_kdf_block_size_follows_digest() {
        let pw = bmp_password("test");
        let a = pkcs12_kdf::<sha2::Sha512>(ID_MAC, &pw, b"saltsalt", 10, 64).unwrap();
        let b = pkcs12_kdf::<sha2::Sha256>(ID_MAC, &pw, b"saltsalt", 10, 64).unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(*a, *b);
    }

    #[test]
    fn iteration_cap() {
        assert!(matches!(
            pkcs12_kdf::<sha1::Sha1>(ID_MAC, &[], b"s", MAX_ITERATIONS + 1, 20),
            Err(ParseError::LimitExceeded(_))
        ));
        assert!(matches!(
            pbkdf2(Prf::HmacSha256, b"p", b"s", 0, 32),
            Err(ParseError::Malformed(_))
        ));
    }

    // RFC 6070 test vector 2.
    #[test]
    fn pbkdf2_sha1_vector() {
        let out = pbkdf2(Prf::HmacSha1, b"password", b"salt", 2, 20).unwrap();
        assert_eq!(
            hex::encode(&*out),
            "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957"
        );
    }

    #[test]
    fn evp_bytes_to_key_extends_past_one_block() {
        let key = evp_bytes_to_key_md5(b"secret", &[1, 2, 3, 4, 5, 6, 7, 8], 32);
        assert_eq!(key.len(), 32);
        let mut h = md5::Md5::new();
        h.update(b"secret");
        h.update([1u8, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&key[..16], h.finalize().as_slice());
    }
}
