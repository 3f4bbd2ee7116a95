//! Password-based encryption schemes shared by encrypted PKCS#8 keys,
//! traditional encrypted PEM and PKCS#12 bundles.

use crate::kdf::{self, Prf};
use crate::oid;
use crate::ParseError;
use cipher::block_padding::Pkcs7;
use cipher::{BlockCipher, BlockDecryptMut, InnerIvInit, KeyInit, KeyIvInit};
use yasna::{ASN1Result, BERReader};
use zeroize::Zeroizing;

/// Block ciphers supported for decryption, all in CBC mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cipher {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    DesEde3Cbc,
    DesCbc,
}

impl Cipher {
    pub(crate) fn from_oid(oid: &str) -> Option<Self> {
        match oid {
            oid::AES_128_CBC => Some(Cipher::Aes128Cbc),
            oid::AES_192_CBC => Some(Cipher::Aes192Cbc),
            oid::AES_256_CBC => Some(Cipher::Aes256Cbc),
            oid::DES_EDE3_CBC => Some(Cipher::DesEde3Cbc),
            oid::DES_CBC => Some(Cipher::DesCbc),
            _ => None,
        }
    }

    /// Parse the cipher name from a `DEK-Info` PEM header.
    pub(crate) fn from_dek_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "AES-128-CBC" => Some(Cipher::Aes128Cbc),
            "AES-192-CBC" => Some(Cipher::Aes192Cbc),
            "AES-256-CBC" => Some(Cipher::Aes256Cbc),
            "DES-EDE3-CBC" => Some(Cipher::DesEde3Cbc),
            "DES-CBC" => Some(Cipher::DesCbc),
            _ => None,
        }
    }

    pub(crate) fn key_len(self) -> usize {
        match self {
            Cipher::Aes128Cbc => 16,
            Cipher::Aes192Cbc | Cipher::DesEde3Cbc => 24,
            Cipher::Aes256Cbc => 32,
            Cipher::DesCbc => 8,
        }
    }

    pub(crate) fn iv_len(self) -> usize {
        match self {
            Cipher::Aes128Cbc | Cipher::Aes192Cbc | Cipher::Aes256Cbc => 16,
            Cipher::DesEde3Cbc | Cipher::DesCbc => 8,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Cipher::Aes128Cbc => "aes-128-cbc",
            Cipher::Aes192Cbc => "aes-192-cbc",
            Cipher::Aes256Cbc => "aes-256-cbc",
            Cipher::DesEde3Cbc => "des-ede3-cbc",
            Cipher::DesCbc => "des-cbc",
        }
    }

    /// Decrypt and strip PKCS#7 padding. Bad padding is reported as
    /// [`ParseError::AuthenticationFailed`], the usual symptom of a wrong key.
    pub(crate) fn decrypt(
        self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, ParseError> {
        match self {
            Cipher::Aes128Cbc => cbc_decrypt::<aes::Aes128>(key, iv, ciphertext),
            Cipher::Aes192Cbc => cbc_decrypt::<aes::Aes192>(key, iv, ciphertext),
            Cipher::Aes256Cbc => cbc_decrypt::<aes::Aes256>(key, iv, ciphertext),
            Cipher::DesEde3Cbc => cbc_decrypt::<des::TdesEde3>(key, iv, ciphertext),
            Cipher::DesCbc => cbc_decrypt::<des::Des>(key, iv, ciphertext),
        }
    }
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, ParseError>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| ParseError::Malformed("invalid cipher key or IV length".into()))?;
    unpad(decryptor, ciphertext)
}

/// RC2 takes its effective key length from the PBE identifier, which for
/// the PKCS#12 schemes equals the key length in bits.
fn rc2_cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, ParseError> {
    let rc2 = rc2::Rc2::new_with_eff_key_len(key, key.len() * 8);
    let decryptor = cbc::Decryptor::<rc2::Rc2>::inner_iv_slice_init(rc2, iv)
        .map_err(|_| ParseError::Malformed("invalid RC2 IV length".into()))?;
    unpad(decryptor, ciphertext)
}

fn unpad<C>(decryptor: cbc::Decryptor<C>, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, ParseError>
where
    C: BlockCipher + BlockDecryptMut,
{
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| ParseError::AuthenticationFailed)
}

/// A raw AlgorithmIdentifier: dotted OID plus the encoded parameters.
#[derive(Debug, Clone)]
pub(crate) struct AlgorithmId {
    pub(crate) oid: String,
    pub(crate) params: Option<Vec<u8>>,
}

/// Read an AlgorithmIdentifier without interpreting its parameters.
pub(crate) fn read_algorithm(r: BERReader) -> ASN1Result<AlgorithmId> {
    r.read_sequence(|r| {
        let oid = r.next().read_oid()?.to_string();
        let params = r.read_optional(|r| r.read_der())?;
        Ok(AlgorithmId { oid, params })
    })
}

/// A password-based encryption scheme, decoded far enough to name it and
/// derive keys, but before any password is applied.
#[derive(Debug, Clone)]
pub(crate) enum EncryptionScheme {
    Pbes2 {
        prf_oid: String,
        salt: Vec<u8>,
        iterations: u32,
        cipher_oid: String,
        iv: Vec<u8>,
    },
    /// PBES2 with a key derivation function other than PBKDF2 (e.g. scrypt).
    /// Named so reports can show it; never decrypted.
    UnsupportedPbes2 {
        kdf_oid: String,
        cipher_oid: String,
    },
    /// PKCS#12 Appendix C PBE (pbeWithSHAAnd...).
    Pkcs12Pbe {
        oid: String,
        salt: Vec<u8>,
        iterations: u32,
    },
    Other {
        oid: String,
    },
}

impl EncryptionScheme {
    pub(crate) fn from_algorithm(alg: &AlgorithmId) -> Result<Self, ParseError> {
        match alg.oid.as_str() {
            oid::PBES2 => {
                let params = alg
                    .params
                    .as_deref()
                    .ok_or_else(|| ParseError::Malformed("PBES2 parameters missing".into()))?;
                parse_pbes2_params(params)
            }
            oid::PBE_SHA1_RC4_128
            | oid::PBE_SHA1_RC4_40
            | oid::PBE_SHA1_3DES
            | oid::PBE_SHA1_2DES
            | oid::PBE_SHA1_RC2_128
            | oid::PBE_SHA1_RC2_40 => {
                let params = alg
                    .params
                    .as_deref()
                    .ok_or_else(|| ParseError::Malformed("PBE parameters missing".into()))?;
                let (salt, iterations) = yasna::parse_ber(params, |r| {
                    r.read_sequence(|r| {
                        let salt = r.next().read_bytes()?;
                        let iterations = r.next().read_u32()?;
                        Ok((salt, iterations))
                    })
                })?;
                Ok(EncryptionScheme::Pkcs12Pbe {
                    oid: alg.oid.clone(),
                    salt,
                    iterations,
                })
            }
            other => Ok(EncryptionScheme::Other {
                oid: other.to_string(),
            }),
        }
    }

    /// Human-readable scheme name, e.g. `PBES2 (PBKDF2-hmacWithSHA256, aes-256-cbc)`.
    pub(crate) fn name(&self) -> String {
        match self {
            EncryptionScheme::Pbes2 {
                prf_oid,
                cipher_oid,
                ..
            } => format!(
                "PBES2 (PBKDF2-{}, {})",
                oid::algorithm_name_or_oid(prf_oid),
                oid::algorithm_name_or_oid(cipher_oid)
            ),
            EncryptionScheme::UnsupportedPbes2 {
                kdf_oid,
                cipher_oid,
            } => format!(
                "PBES2 ({}, {})",
                oid::algorithm_name_or_oid(kdf_oid),
                oid::algorithm_name_or_oid(cipher_oid)
            ),
            EncryptionScheme::Pkcs12Pbe { oid, .. } | EncryptionScheme::Other { oid } => {
                oid::algorithm_name_or_oid(oid)
            }
        }
    }

    pub(crate) fn decrypt(
        &self,
        passphrase: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, ParseError> {
        match self {
            EncryptionScheme::Pbes2 {
                prf_oid,
                salt,
                iterations,
                cipher_oid,
                iv,
            } => {
                let prf = Prf::from_oid(prf_oid).ok_or_else(|| {
                    ParseError::Unsupported(format!(
                        "PBKDF2 PRF {}",
                        oid::algorithm_name_or_oid(prf_oid)
                    ))
                })?;
                let cipher = Cipher::from_oid(cipher_oid).ok_or_else(|| {
                    ParseError::Unsupported(format!(
                        "PBES2 cipher {}",
                        oid::algorithm_name_or_oid(cipher_oid)
                    ))
                })?;
                let key = kdf::pbkdf2(
                    prf,
                    passphrase.as_bytes(),
                    salt,
                    *iterations,
                    cipher.key_len(),
                )?;
                cipher.decrypt(&key, iv, ciphertext)
            }
            EncryptionScheme::Pkcs12Pbe {
                oid: scheme_oid,
                salt,
                iterations,
            } => {
                let (key_len, iv_len) = match scheme_oid.as_str() {
                    oid::PBE_SHA1_3DES => (24, 8),
                    oid::PBE_SHA1_2DES | oid::PBE_SHA1_RC2_128 => (16, 8),
                    oid::PBE_SHA1_RC2_40 => (5, 8),
                    other => {
                        return Err(ParseError::Unsupported(format!(
                            "decryption with {}",
                            oid::algorithm_name_or_oid(other)
                        )))
                    }
                };
                let mut last = ParseError::AuthenticationFailed;
                for bmp in kdf::bmp_candidates(passphrase) {
                    let key =
                        kdf::pkcs12_kdf::<sha1::Sha1>(kdf::ID_KEY, &bmp, salt, *iterations, key_len)?;
                    let iv =
                        kdf::pkcs12_kdf::<sha1::Sha1>(kdf::ID_IV, &bmp, salt, *iterations, iv_len)?;
                    let attempt = match scheme_oid.as_str() {
                        oid::PBE_SHA1_RC2_128 | oid::PBE_SHA1_RC2_40 => {
                            rc2_cbc_decrypt(&key, &iv, ciphertext)
                        }
                        oid::PBE_SHA1_2DES => cbc_decrypt::<des::TdesEde2>(&key, &iv, ciphertext),
                        _ => cbc_decrypt::<des::TdesEde3>(&key, &iv, ciphertext),
                    };
                    match attempt {
                        Ok(plain) => return Ok(plain),
                        Err(e) => last = e,
                    }
                }
                Err(last)
            }
            EncryptionScheme::UnsupportedPbes2 { .. } => Err(ParseError::Unsupported(format!(
                "decryption with {}",
                self.name()
            ))),
            EncryptionScheme::Other { oid } => Err(ParseError::Unsupported(format!(
                "encryption scheme {}",
                oid::algorithm_name_or_oid(oid)
            ))),
        }
    }
}

fn parse_pbes2_params(params: &[u8]) -> Result<EncryptionScheme, ParseError> {
    let (kdf_alg, enc_alg) = yasna::parse_ber(params, |r| {
        r.read_sequence(|r| {
            let kdf_alg = read_algorithm(r.next())?;
            let enc_alg = read_algorithm(r.next())?;
            Ok((kdf_alg, enc_alg))
        })
    })?;

    if kdf_alg.oid != oid::PBKDF2 {
        tracing::debug!(kdf = %kdf_alg.oid, "PBES2 key derivation is not PBKDF2");
        return Ok(EncryptionScheme::UnsupportedPbes2 {
            kdf_oid: kdf_alg.oid,
            cipher_oid: enc_alg.oid,
        });
    }
    let kdf_params = kdf_alg
        .params
        .as_deref()
        .ok_or_else(|| ParseError::Malformed("PBKDF2 parameters missing".into()))?;

    // PBKDF2-params ::= SEQUENCE { salt, iterationCount, keyLength OPTIONAL,
    //                              prf AlgorithmIdentifier DEFAULT hmacWithSHA1 }
    let (salt, iterations, prf_oid) = yasna::parse_ber(kdf_params, |r| {
        r.read_sequence(|r| {
            let salt = r.next().read_bytes()?;
            let iterations = r.next().read_u32()?;
            let mut prf_oid = oid::HMAC_WITH_SHA1.to_string();
            if let Some(first) = r.read_optional(|r| r.read_der())? {
                let prf_der = if first.first() == Some(&0x30) {
                    Some(first)
                } else {
                    r.read_optional(|r| r.read_der())?
                };
                if let Some(prf_der) = prf_der {
                    prf_oid = yasna::parse_ber(&prf_der, read_algorithm)?.oid;
                }
            }
            Ok((salt, iterations, prf_oid))
        })
    })?;

    // The IV is an OCTET STRING for every CBC cipher handled here; other
    // ciphers keep an empty IV and fail later as unsupported.
    let iv = enc_alg
        .params
        .as_deref()
        .and_then(|p| yasna::parse_ber(p, |r| r.read_bytes()).ok())
        .unwrap_or_default();

    Ok(EncryptionScheme::Pbes2 {
        prf_oid,
        salt,
        iterations,
        cipher_oid: enc_alg.oid,
        iv,
    })
}
