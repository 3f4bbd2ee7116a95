//! PKCS#12 (PFX) parsing (RFC 7292).
//!
//! Parsed with `yasna::parse_ber` since PKCS#12 writers commonly emit BER
//! (indefinite lengths, constructed OCTET STRINGs). The structure is read in
//! two passes: everything that needs no password (MAC parameters, the
//! encryption schemes in use) and then, when a passphrase is given, MAC
//! verification followed by decryption of the bags.

use crate::fields::{
    EncryptionState, KeyFormat, MacInfo, ParsedCertificate, ParsedKey, ParsedPfxBundle, PfxEntry,
};
use crate::kdf;
use crate::key;
use crate::oid;
use crate::parser;
use crate::pbe::{self, AlgorithmId, EncryptionScheme};
use crate::ParseError;
use hmac::{Hmac, Mac};
use yasna::{ASN1Error, ASN1ErrorKind, ASN1Result, BERReader, Tag};
use zeroize::Zeroizing;

/// Why a passphrase-free parse leaves the entries out.
const NO_PASSPHRASE: &str = "no passphrase supplied";

/// Raw `MacData`.
struct RawMac {
    digest_oid: String,
    digest: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

/// One `ContentInfo` of the authenticated safe.
enum RawContent {
    Data(Vec<u8>),
    Encrypted {
        alg: AlgorithmId,
        ciphertext: Vec<u8>,
    },
    Other(String),
}

/// One `SafeBag` with the attributes we use.
struct RawBag {
    bag_type: String,
    value: Vec<u8>,
    friendly_name: Option<String>,
    local_key_id: Option<Vec<u8>>,
}

/// Parse a PKCS#12 bundle.
///
/// The MAC parameters and encryption schemes are always reported. With a
/// passphrase, the MAC is verified and the certificates and keys are
/// extracted; a wrong passphrase yields [`ParseError::AuthenticationFailed`]
/// and nothing else.
pub fn parse_pfx(input: &[u8], passphrase: Option<&str>) -> Result<ParsedPfxBundle, ParseError> {
    if input.is_empty() {
        return Err(ParseError::UnrecognizedFormat("empty input".into()));
    }

    let (auth_safe, raw_mac) = yasna::parse_ber(input, |r| {
        r.read_sequence(|r| {
            let version = r.next().read_u32()?;
            if version != 3 {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            let auth_safe = read_content_info(r.next())?;
            let mac = r.read_optional(read_mac_data)?;
            Ok((auth_safe, mac))
        })
    })?;

    let auth_safe = match auth_safe {
        RawContent::Data(data) => data,
        RawContent::Encrypted { .. } => {
            return Err(ParseError::Malformed(
                "authSafe must be a data ContentInfo".into(),
            ))
        }
        RawContent::Other(content_type) => {
            return Err(ParseError::Unsupported(format!(
                "public-key integrity mode ({})",
                content_type
            )))
        }
    };

    let mac = raw_mac.as_ref().map(|m| MacInfo {
        algorithm: oid::algorithm_name_or_oid(&m.digest_oid),
        oid: m.digest_oid.clone(),
        iterations: m.iterations,
        salt_len: m.salt.len(),
    });

    let contents = yasna::parse_ber(&auth_safe, |r| r.collect_sequence_of(read_content_info))?;

    let mut encryption_algorithms = Vec::new();
    for content in &contents {
        match content {
            RawContent::Data(data) => {
                for bag in parse_bags(data)? {
                    if bag.bag_type == oid::BAG_PKCS8_SHROUDED_KEY {
                        let (alg, _) = key::read_encrypted_pkcs8(&bag.value)?;
                        encryption_algorithms.push(scheme_name(&alg));
                    }
                }
            }
            RawContent::Encrypted { alg, .. } => encryption_algorithms.push(scheme_name(alg)),
            RawContent::Other(content_type) => {
                tracing::warn!(content_type = %content_type, "skipping unsupported PKCS#12 content");
            }
        }
    }

    let Some(passphrase) = passphrase else {
        return Ok(ParsedPfxBundle {
            mac,
            encryption_algorithms,
            extracted: false,
            unextracted_reason: Some(NO_PASSPHRASE.into()),
            entries: Vec::new(),
        });
    };

    if let Some(raw_mac) = &raw_mac {
        verify_mac(raw_mac, &auth_safe, passphrase)?;
    }

    let mut bags = Vec::new();
    for content in contents {
        match content {
            RawContent::Data(data) => bags.extend(parse_bags(&data)?),
            RawContent::Encrypted { alg, ciphertext } => {
                let scheme = EncryptionScheme::from_algorithm(&alg)?;
                let plain = scheme.decrypt(passphrase, &ciphertext)?;
                bags.extend(parse_bags(&plain).map_err(|_| ParseError::AuthenticationFailed)?);
            }
            RawContent::Other(_) => {}
        }
    }

    Ok(ParsedPfxBundle {
        mac,
        encryption_algorithms,
        extracted: true,
        unextracted_reason: None,
        entries: extract_entries(bags, passphrase)?,
    })
}

/// Name a content or bag scheme for the passphrase-free pass. Parameters we
/// cannot read still leave the algorithm named by its OID.
fn scheme_name(alg: &AlgorithmId) -> String {
    match EncryptionScheme::from_algorithm(alg) {
        Ok(scheme) => scheme.name(),
        Err(e) => {
            tracing::warn!(algorithm = %alg.oid, error = %e, "unreadable encryption parameters");
            oid::algorithm_name_or_oid(&alg.oid)
        }
    }
}

// ── Structure readers ───────────────────────────────────────────────────

fn read_content_info(r: BERReader) -> ASN1Result<RawContent> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?.to_string();
        match content_type.as_str() {
            oid::PKCS7_DATA => {
                let data = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                Ok(RawContent::Data(data))
            }
            oid::PKCS7_ENCRYPTED_DATA => r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let _version = r.next().read_u32()?;
                    let content = r.next().read_sequence(|r| {
                        let _content_type = r.next().read_oid()?;
                        let alg = pbe::read_algorithm(r.next())?;
                        let ciphertext = r
                            .read_optional(|r| {
                                r.read_tagged_implicit(Tag::context(0), |r| r.read_bytes())
                            })?
                            .unwrap_or_default();
                        Ok(RawContent::Encrypted { alg, ciphertext })
                    })?;
                    let _unprotected = r.read_optional(|r| r.read_der())?;
                    Ok(content)
                })
            }),
            _ => {
                let _content = r.read_optional(|r| r.read_der())?;
                Ok(RawContent::Other(content_type))
            }
        }
    })
}

fn read_mac_data(r: BERReader) -> ASN1Result<RawMac> {
    r.read_sequence(|r| {
        let (digest_oid, digest) = r.next().read_sequence(|r| {
            let alg = pbe::read_algorithm(r.next())?;
            let digest = r.next().read_bytes()?;
            Ok((alg.oid, digest))
        })?;
        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);
        Ok(RawMac {
            digest_oid,
            digest,
            salt,
            iterations,
        })
    })
}

fn parse_bags(safe_contents: &[u8]) -> Result<Vec<RawBag>, ParseError> {
    Ok(yasna::parse_ber(safe_contents, |r| {
        r.collect_sequence_of(read_safe_bag)
    })?)
}

fn read_safe_bag(r: BERReader) -> ASN1Result<RawBag> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?.to_string();
        let value = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
        let mut friendly_name = None;
        let mut local_key_id = None;
        r.read_optional(|r| {
            r.read_set_of(|r| {
                r.read_sequence(|r| {
                    let attr = r.next().read_oid()?.to_string();
                    r.next().read_set_of(|r| {
                        match attr.as_str() {
                            oid::FRIENDLY_NAME => friendly_name = Some(r.read_bmp_string()?),
                            oid::LOCAL_KEY_ID => local_key_id = Some(r.read_bytes()?),
                            _ => {
                                let _ = r.read_der()?;
                            }
                        }
                        Ok(())
                    })
                })
            })
        })?;
        Ok(RawBag {
            bag_type,
            value,
            friendly_name,
            local_key_id,
        })
    })
}

// ── MAC ─────────────────────────────────────────────────────────────────

/// Verify the integrity MAC, trying each BMP encoding of the passphrase.
fn verify_mac(mac: &RawMac, auth_safe: &[u8], passphrase: &str) -> Result<(), ParseError> {
    for bmp in kdf::bmp_candidates(passphrase) {
        if mac_matches(mac, auth_safe, &bmp)? {
            return Ok(());
        }
    }
    Err(ParseError::AuthenticationFailed)
}

fn mac_matches(mac: &RawMac, data: &[u8], bmp: &[u8]) -> Result<bool, ParseError> {
    macro_rules! hmac_check {
        ($digest:ty, $len:expr) => {{
            let key = kdf::pkcs12_kdf::<$digest>(kdf::ID_MAC, bmp, &mac.salt, mac.iterations, $len)?;
            let mut hmac = <Hmac<$digest>>::new_from_slice(&key)
                .map_err(|_| ParseError::Malformed("invalid MAC key length".into()))?;
            hmac.update(data);
            Ok(hmac.verify_slice(&mac.digest).is_ok())
        }};
    }

    match mac.digest_oid.as_str() {
        oid::MD5 => hmac_check!(md5::Md5, 16),
        oid::SHA1 => hmac_check!(sha1::Sha1, 20),
        oid::SHA224 => hmac_check!(sha2::Sha224, 28),
        oid::SHA256 => hmac_check!(sha2::Sha256, 32),
        oid::SHA384 => hmac_check!(sha2::Sha384, 48),
        oid::SHA512 => hmac_check!(sha2::Sha512, 64),
        other => Err(ParseError::Unsupported(format!(
            "PKCS#12 MAC digest {}",
            oid::algorithm_name_or_oid(other)
        ))),
    }
}

// ── Bag extraction ──────────────────────────────────────────────────────

struct Extracted<T> {
    item: T,
    friendly_name: Option<String>,
    local_key_id: Option<Vec<u8>>,
}

fn extract_entries(bags: Vec<RawBag>, passphrase: &str) -> Result<Vec<PfxEntry>, ParseError> {
    let mut certs: Vec<Extracted<ParsedCertificate>> = Vec::new();
    let mut keys: Vec<Extracted<ParsedKey>> = Vec::new();

    for bag in bags {
        match bag.bag_type.as_str() {
            oid::BAG_CERT => {
                let der = read_cert_bag(&bag.value)?;
                certs.push(Extracted {
                    item: parser::parse_certificate_der(&der)?,
                    friendly_name: bag.friendly_name,
                    local_key_id: bag.local_key_id,
                });
            }
            oid::BAG_KEY => {
                let key = Zeroizing::new(bag.value);
                let item = key::pkcs8_key(&key)?.into_key(
                    EncryptionState::Plaintext,
                    None,
                    KeyFormat::Pkcs12Bag,
                );
                keys.push(Extracted {
                    item,
                    friendly_name: bag.friendly_name,
                    local_key_id: bag.local_key_id,
                });
            }
            oid::BAG_PKCS8_SHROUDED_KEY => {
                let item =
                    key::encrypted_pkcs8_key(&bag.value, Some(passphrase), KeyFormat::Pkcs12Bag)?;
                keys.push(Extracted {
                    item,
                    friendly_name: bag.friendly_name,
                    local_key_id: bag.local_key_id,
                });
            }
            other => {
                tracing::warn!(bag_type = %other, "skipping unsupported PKCS#12 bag");
            }
        }
    }

    let mut entries = Vec::with_capacity(certs.len() + keys.len());
    for cert in certs {
        let paired = cert.local_key_id.as_ref().and_then(|id| {
            keys.iter()
                .position(|k| k.local_key_id.as_ref() == Some(id))
        });
        let key = paired.map(|i| keys.remove(i));
        let friendly_name = cert
            .friendly_name
            .or_else(|| key.as_ref().and_then(|k| k.friendly_name.clone()));
        let key = key.map(|mut k| {
            k.item.owner = Some(cert.item.subject_string());
            k.item
        });
        entries.push(PfxEntry {
            friendly_name,
            certificate: Some(cert.item),
            key,
        });
    }
    for key in keys {
        entries.push(PfxEntry {
            friendly_name: key.friendly_name,
            certificate: None,
            key: Some(key.item),
        });
    }
    Ok(entries)
}

/// `CertBag ::= SEQUENCE { certId OID, certValue [0] EXPLICIT OCTET STRING }`
fn read_cert_bag(value: &[u8]) -> Result<Vec<u8>, ParseError> {
    let (cert_type, der) = yasna::parse_ber(value, |r| {
        r.read_sequence(|r| {
            let cert_type = r.next().read_oid()?.to_string();
            let der = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
            Ok((cert_type, der))
        })
    })?;
    if cert_type != oid::CERT_TYPE_X509 {
        return Err(ParseError::Unsupported(format!(
            "certificate bag type {}",
            cert_type
        )));
    }
    Ok(der)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_unrecognized() {
        assert!(matches!(
            parse_pfx(b"", None),
            Err(ParseError::UnrecognizedFormat(_))
        ));
    }

    #[test]
    fn wrong_version_is_rejected() {
        // SEQUENCE { INTEGER 2 }
        assert!(parse_pfx(&[0x30, 0x03, 0x02, 0x01, 0x02], None).is_err());
    }

    #[test]
    fn unknown_mac_digest_is_unsupported() {
        let mac = RawMac {
            digest_oid: "1.2.3.4".into(),
            digest: vec![0; 20],
            salt: vec![0; 8],
            iterations: 1,
        };
        assert!(matches!(
            mac_matches(&mac, b"data", &[0, 0]),
            Err(ParseError::Unsupported(_))
        ));
    }

    #[test]
    fn mac_roundtrip_sha256() {
        let pw = kdf::bmp_password("secret");
        let key = kdf::pkcs12_kdf::<sha2::Sha256>(kdf::ID_MAC, &pw, b"saltsalt", 3, 32).unwrap();
        let mut hmac = <Hmac<sha2::Sha256>>::new_from_slice(&key).unwrap();
        hmac.update(b"content");
        let digest = hmac.finalize().into_bytes().to_vec();
        let mac = RawMac {
            digest_oid: oid::SHA256.into(),
            digest,
            salt: b"saltsalt".to_vec(),
            iterations: 3,
        };
        assert_eq!(mac_matches(&mac, b"content", &pw), Ok(true));
        assert_eq!(
            mac_matches(&mac, b"content", &kdf::bmp_password("wrong")),
            Ok(false)
        );
        assert!(verify_mac(&mac, b"content", "secret").is_ok());
        assert_eq!(
            verify_mac(&mac, b"content", "nope"),
            Err(ParseError::AuthenticationFailed)
        );
    }

    fn id(s: &str) -> yasna::models::ObjectIdentifier {
        yasna::models::ObjectIdentifier::from_slice(
            &s.split('.').map(|c| c.parse::<u64>().unwrap()).collect::<Vec<_>>(),
        )
    }

    /// A PFX whose only content is an EncryptedData under `alg_oid` with the
    /// given parameters, MACed with SHA-256 under `passphrase`.
    fn pfx_with_encrypted_content(alg_oid: &str, params: &[u8], passphrase: &str) -> Vec<u8> {
        let auth_safe = yasna::construct_der(|w| {
            w.write_sequence_of(|w| {
                w.next().write_sequence(|w| {
                    w.next().write_oid(&id(oid::PKCS7_ENCRYPTED_DATA));
                    w.next().write_tagged(Tag::context(0), |w| {
                        w.write_sequence(|w| {
                            w.next().write_u32(0);
                            w.next().write_sequence(|w| {
                                w.next().write_oid(&id(oid::PKCS7_DATA));
                                w.next().write_sequence(|w| {
                                    w.next().write_oid(&id(alg_oid));
                                    w.next().write_der(params);
                                });
                                w.next()
                                    .write_tagged_implicit(Tag::context(0), |w| w.write_bytes(&[0; 32]));
                            });
                        })
                    });
                });
            })
        });

        let salt = b"saltsalt";
        let key = kdf::pkcs12_kdf::<sha2::Sha256>(
            kdf::ID_MAC,
            &kdf::bmp_password(passphrase),
            salt,
            1,
            32,
        )
        .unwrap();
        let mut hmac = <Hmac<sha2::Sha256>>::new_from_slice(&key).unwrap();
        hmac.update(&auth_safe);
        let digest = hmac.finalize().into_bytes().to_vec();

        yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_u32(3);
                w.next().write_sequence(|w| {
                    w.next().write_oid(&id(oid::PKCS7_DATA));
                    w.next()
                        .write_tagged(Tag::context(0), |w| w.write_bytes(&auth_safe));
                });
                w.next().write_sequence(|w| {
                    w.next().write_sequence(|w| {
                        w.next().write_sequence(|w| {
                            w.next().write_oid(&id(oid::SHA256));
                            w.next().write_null();
                        });
                        w.next().write_bytes(&digest);
                    });
                    w.next().write_bytes(salt);
                    w.next().write_u32(1);
                });
            })
        })
    }

    fn scrypt_params() -> Vec<u8> {
        yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_sequence(|w| {
                    w.next().write_oid(&id(oid::SCRYPT));
                    w.next().write_sequence(|w| {
                        w.next().write_bytes(b"saltsalt");
                        w.next().write_u32(16384);
                        w.next().write_u32(8);
                        w.next().write_u32(1);
                    });
                });
                w.next().write_sequence(|w| {
                    w.next().write_oid(&id(oid::AES_256_CBC));
                    w.next().write_bytes(&[0u8; 16]);
                });
            })
        })
    }

    #[test]
    fn scrypt_content_is_named_without_passphrase() {
        let pfx = pfx_with_encrypted_content(oid::PBES2, &scrypt_params(), "pw");
        let bundle = parse_pfx(&pfx, None).unwrap();
        assert_eq!(bundle.mac.as_ref().unwrap().algorithm, "sha256");
        assert_eq!(
            bundle.encryption_algorithms,
            vec!["PBES2 (scrypt, aes-256-cbc)".to_string()]
        );
        assert!(!bundle.extracted);
        assert_eq!(bundle.unextracted_reason.as_deref(), Some(NO_PASSPHRASE));
    }

    #[test]
    fn scrypt_content_is_unsupported_once_mac_verifies() {
        let pfx = pfx_with_encrypted_content(oid::PBES2, &scrypt_params(), "pw");
        assert_eq!(
            parse_pfx(&pfx, Some("pw")),
            Err(ParseError::Unsupported(
                "decryption with PBES2 (scrypt, aes-256-cbc)".into()
            ))
        );
    }

    #[test]
    fn unreadable_scheme_parameters_fall_back_to_the_oid_name() {
        // PBES2 with NULL where its parameters belong.
        let pfx = pfx_with_encrypted_content(oid::PBES2, &[0x05, 0x00], "pw");
        let bundle = parse_pfx(&pfx, None).unwrap();
        assert_eq!(bundle.encryption_algorithms, vec!["PBES2".to_string()]);
    }
}
