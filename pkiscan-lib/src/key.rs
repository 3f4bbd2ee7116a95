//! Private key parsing: PKCS#8 (plain and encrypted), PKCS#1, SEC1,
//! traditional DSA keys and OpenSSL's legacy `Proc-Type` encrypted PEM.

use crate::fields::{
    curve_bits, curve_name, EncryptionState, KeyAlgorithm, KeyFormat, ParsedKey, Property,
};
use crate::kdf;
use crate::oid;
use crate::pbe::{self, AlgorithmId, Cipher, EncryptionScheme};
use crate::util;
use crate::ParseError;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, Tag};
use zeroize::Zeroizing;

/// PEM labels that carry a private key.
pub(crate) const KEY_LABELS: &[&str] = &[
    "PRIVATE KEY",
    "ENCRYPTED PRIVATE KEY",
    "RSA PRIVATE KEY",
    "EC PRIVATE KEY",
    "DSA PRIVATE KEY",
];

const NO_PASSPHRASE: &str = "key is encrypted and no passphrase was supplied";

/// Parse a private key from PEM or DER (auto-detected).
///
/// Without a passphrase an encrypted key still parses: the result reports
/// [`EncryptionState::Encrypted`] with algorithm and size undetermined. With
/// a wrong passphrase the result is [`ParseError::AuthenticationFailed`].
pub fn parse_key(input: &[u8], passphrase: Option<&str>) -> Result<ParsedKey, ParseError> {
    if input.is_empty() {
        return Err(ParseError::UnrecognizedFormat("empty input".into()));
    }

    if util::is_pem(input) {
        let blocks = pem::parse_many(input)?;
        let block = blocks
            .iter()
            .find(|p| KEY_LABELS.contains(&p.tag()))
            .ok_or_else(|| ParseError::Pem("no private key block found".into()))?;
        parse_key_pem_block(block, passphrase)
    } else {
        parse_key_der(input, passphrase)
    }
}

/// Parse one PEM block whose label is in [`KEY_LABELS`].
pub(crate) fn parse_key_pem_block(
    block: &pem::Pem,
    passphrase: Option<&str>,
) -> Result<ParsedKey, ParseError> {
    let der = block.contents();
    match block.tag() {
        "PRIVATE KEY" => Ok(pkcs8_key(der)?.into_key(
            EncryptionState::Plaintext,
            None,
            KeyFormat::Pkcs8,
        )),
        "ENCRYPTED PRIVATE KEY" => encrypted_pkcs8_key(der, passphrase, KeyFormat::EncryptedPkcs8),
        label @ ("RSA PRIVATE KEY" | "EC PRIVATE KEY" | "DSA PRIVATE KEY") => {
            let encrypted = block
                .headers()
                .get("Proc-Type")
                .is_some_and(|v| v.replace(' ', "").eq_ignore_ascii_case("4,ENCRYPTED"));
            if encrypted {
                legacy_encrypted_key(block, label, passphrase)
            } else {
                let (details, format) = traditional_key(label, der)?;
                Ok(details.into_key(EncryptionState::Plaintext, None, format))
            }
        }
        other => Err(ParseError::UnrecognizedFormat(format!(
            "PEM block {} is not a private key",
            other
        ))),
    }
}

/// Try each DER key encoding in turn.
fn parse_key_der(der: &[u8], passphrase: Option<&str>) -> Result<ParsedKey, ParseError> {
    if read_encrypted_pkcs8(der).is_ok() {
        return encrypted_pkcs8_key(der, passphrase, KeyFormat::EncryptedPkcs8);
    }
    if let Ok(details) = pkcs8_key(der) {
        return Ok(details.into_key(EncryptionState::Plaintext, None, KeyFormat::Pkcs8));
    }
    for label in ["RSA PRIVATE KEY", "EC PRIVATE KEY", "DSA PRIVATE KEY"] {
        if let Ok((details, format)) = traditional_key(label, der) {
            return Ok(details.into_key(EncryptionState::Plaintext, None, format));
        }
    }
    Err(ParseError::UnrecognizedFormat(
        "not a PKCS#8, PKCS#1, SEC1 or DSA private key".into(),
    ))
}

/// Algorithm facts recovered from decrypted key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyDetails {
    pub(crate) algorithm: KeyAlgorithm,
    pub(crate) bits: Property<u32>,
    pub(crate) curve: Option<String>,
}

impl KeyDetails {
    pub(crate) fn into_key(
        self,
        encryption: EncryptionState,
        encryption_scheme: Option<String>,
        format: KeyFormat,
    ) -> ParsedKey {
        ParsedKey {
            algorithm: Property::Known(self.algorithm),
            bits: self.bits,
            curve: self.curve,
            encryption,
            encryption_scheme,
            format,
            owner: None,
        }
    }
}

fn encrypted_placeholder(scheme: String, format: KeyFormat) -> ParsedKey {
    ParsedKey {
        algorithm: Property::undetermined(NO_PASSPHRASE),
        bits: Property::undetermined(NO_PASSPHRASE),
        curve: None,
        encryption: EncryptionState::Encrypted,
        encryption_scheme: Some(scheme),
        format,
        owner: None,
    }
}

/// Decrypted content that fails to parse means the key was wrong but the
/// padding happened to check out.
fn wrong_key_if_garbled(e: ParseError) -> ParseError {
    match e {
        ParseError::Der(_) | ParseError::Malformed(_) | ParseError::UnrecognizedFormat(_) => {
            ParseError::AuthenticationFailed
        }
        other => other,
    }
}

// ── PKCS#8 ──────────────────────────────────────────────────────────────

/// Parse a PKCS#8 `PrivateKeyInfo` / `OneAsymmetricKey`.
pub(crate) fn pkcs8_key(der: &[u8]) -> Result<KeyDetails, ParseError> {
    let (alg, private_key) = yasna::parse_ber(der, |r| {
        r.read_sequence(|r| {
            let version = r.next().read_u32()?;
            if version > 1 {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            let alg = pbe::read_algorithm(r.next())?;
            let private_key = Zeroizing::new(r.next().read_bytes()?);
            skip_rest(r)?;
            Ok((alg, private_key))
        })
    })?;

    let algorithm = KeyAlgorithm::from_oid(&alg.oid);
    let details = match &algorithm {
        KeyAlgorithm::Rsa => {
            let (details, _) = traditional_key("RSA PRIVATE KEY", &private_key)?;
            details
        }
        KeyAlgorithm::Ec => {
            let from_alg = alg
                .params
                .as_deref()
                .and_then(|p| yasna::parse_der(p, |r| r.read_oid()).ok())
                .map(|o| o.to_string());
            let inner = sec1_curve_oid(&private_key)?;
            ec_details(from_alg.or(inner))
        }
        KeyAlgorithm::Dsa => {
            let bits = alg
                .params
                .as_deref()
                .and_then(dsa_params_bits)
                .map_or_else(|| Property::undetermined("DSA parameters are absent"), Property::Known);
            KeyDetails {
                algorithm,
                bits,
                curve: None,
            }
        }
        other => {
            let bits = match other.implied_bits() {
                Some(bits) => Property::Known(bits),
                None => {
                    tracing::warn!(algorithm = %other, "cannot size private key of this type");
                    Property::undetermined(format!("unmodelled key type {}", other))
                }
            };
            KeyDetails {
                algorithm,
                bits,
                curve: None,
            }
        }
    };
    Ok(details)
}

/// Split an `EncryptedPrivateKeyInfo` into its algorithm and ciphertext.
pub(crate) fn read_encrypted_pkcs8(der: &[u8]) -> Result<(AlgorithmId, Vec<u8>), ParseError> {
    Ok(yasna::parse_ber(der, |r| {
        r.read_sequence(|r| {
            let alg = pbe::read_algorithm(r.next())?;
            let ciphertext = r.next().read_bytes()?;
            Ok((alg, ciphertext))
        })
    })?)
}

/// Parse an `EncryptedPrivateKeyInfo`, decrypting it when a passphrase is given.
pub(crate) fn encrypted_pkcs8_key(
    der: &[u8],
    passphrase: Option<&str>,
    format: KeyFormat,
) -> Result<ParsedKey, ParseError> {
    let (alg, ciphertext) = read_encrypted_pkcs8(der)?;
    let scheme = EncryptionScheme::from_algorithm(&alg);
    let name = scheme
        .as_ref()
        .map_or_else(|_| oid::algorithm_name_or_oid(&alg.oid), EncryptionScheme::name);
    let Some(passphrase) = passphrase else {
        return Ok(encrypted_placeholder(name, format));
    };
    let plain = scheme?.decrypt(passphrase, &ciphertext)?;
    let details = pkcs8_key(&plain).map_err(wrong_key_if_garbled)?;
    Ok(details.into_key(EncryptionState::Encrypted, Some(name), format))
}

// ── Traditional (PKCS#1 / SEC1 / DSA) ───────────────────────────────────

fn traditional_key(label: &str, der: &[u8]) -> Result<(KeyDetails, KeyFormat), ParseError> {
    match label {
        "RSA PRIVATE KEY" => Ok((pkcs1_key(der)?, KeyFormat::Pkcs1)),
        "EC PRIVATE KEY" => Ok((ec_details(sec1_curve_oid(der)?), KeyFormat::Sec1)),
        "DSA PRIVATE KEY" => Ok((dsa_key(der)?, KeyFormat::TraditionalDsa)),
        other => Err(ParseError::UnrecognizedFormat(format!(
            "unknown key label {}",
            other
        ))),
    }
}

/// PKCS#1 `RSAPrivateKey`: version, then eight integers, then optional
/// `otherPrimeInfos`.
fn pkcs1_key(der: &[u8]) -> Result<KeyDetails, ParseError> {
    let modulus = yasna::parse_ber(der, |r| {
        r.read_sequence(|r| {
            let version = r.next().read_u32()?;
            if version > 1 {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            let modulus = read_integer(r.next())?;
            for _ in 0..7 {
                let _secret = Zeroizing::new(read_integer(r.next())?);
            }
            skip_rest(r)?;
            Ok(modulus)
        })
    })?;
    Ok(KeyDetails {
        algorithm: KeyAlgorithm::Rsa,
        bits: Property::Known(util::unsigned_bit_length(&modulus)),
        curve: None,
    })
}

/// OpenSSL's traditional DSA key: `SEQUENCE { 0, p, q, g, y, x }`.
fn dsa_key(der: &[u8]) -> Result<KeyDetails, ParseError> {
    let p = yasna::parse_ber(der, |r| {
        r.read_sequence(|r| {
            if r.next().read_u32()? != 0 {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            let p = read_integer(r.next())?;
            for _ in 0..4 {
                let _rest = Zeroizing::new(read_integer(r.next())?);
            }
            Ok(p)
        })
    })?;
    Ok(KeyDetails {
        algorithm: KeyAlgorithm::Dsa,
        bits: Property::Known(util::unsigned_bit_length(&p)),
        curve: None,
    })
}

/// SEC1 `ECPrivateKey`; returns the named-curve OID when parameters are present.
fn sec1_curve_oid(der: &[u8]) -> Result<Option<String>, ParseError> {
    let curve = yasna::parse_ber(der, |r| {
        r.read_sequence(|r| {
            if r.next().read_u32()? != 1 {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            let _secret = Zeroizing::new(r.next().read_bytes()?);
            let params = r.read_optional(|r| r.read_tagged(Tag::context(0), |r| r.read_der()))?;
            let _public = r.read_optional(|r| r.read_tagged(Tag::context(1), |r| r.read_der()))?;
            Ok(params)
        })
    })?;
    Ok(curve
        .and_then(|p| yasna::parse_der(&p, |r| r.read_oid()).ok())
        .map(|o| o.to_string()))
}

fn ec_details(curve_oid: Option<String>) -> KeyDetails {
    let curve = curve_oid.map(|o| curve_name(&o).map_or(o, str::to_string));
    let bits = match curve.as_deref().and_then(curve_bits) {
        Some(bits) => Property::Known(bits),
        None => {
            let reason = match &curve {
                Some(c) => format!("unrecognized curve {}", c),
                None => "EC key carries no named curve".to_string(),
            };
            tracing::warn!("{}", reason);
            Property::undetermined(reason)
        }
    };
    KeyDetails {
        algorithm: KeyAlgorithm::Ec,
        bits,
        curve,
    }
}

/// Bit length of `p` in DSA `Dss-Parms ::= SEQUENCE { p, q, g }`.
fn dsa_params_bits(params: &[u8]) -> Option<u32> {
    yasna::parse_ber(params, |r| {
        r.read_sequence(|r| {
            let p = read_integer(r.next())?;
            let _q = read_integer(r.next())?;
            let _g = read_integer(r.next())?;
            Ok(p)
        })
    })
    .ok()
    .map(|p| util::unsigned_bit_length(&p))
}

// ── Legacy encrypted PEM ────────────────────────────────────────────────

fn legacy_encrypted_key(
    block: &pem::Pem,
    label: &str,
    passphrase: Option<&str>,
) -> Result<ParsedKey, ParseError> {
    let dek_info = block
        .headers()
        .get("DEK-Info")
        .ok_or_else(|| ParseError::Pem("encrypted PEM key without DEK-Info".into()))?;
    let (cipher_name, iv_hex) = dek_info
        .split_once(',')
        .ok_or_else(|| ParseError::Pem(format!("malformed DEK-Info: {}", dek_info)))?;
    let cipher_name = cipher_name.trim();
    let scheme_name = format!("{} (EVP_BytesToKey-MD5)", cipher_name.to_ascii_lowercase());

    let cipher = Cipher::from_dek_name(cipher_name);
    let Some(passphrase) = passphrase else {
        return Ok(encrypted_placeholder(
            scheme_name,
            KeyFormat::LegacyEncryptedPem,
        ));
    };
    let cipher = cipher.ok_or_else(|| {
        ParseError::Unsupported(format!("legacy PEM cipher {}", cipher_name))
    })?;

    let iv = hex::decode(iv_hex.trim())
        .map_err(|e| ParseError::Pem(format!("DEK-Info IV: {}", e)))?;
    if iv.len() != cipher.iv_len() {
        return Err(ParseError::Pem(format!(
            "DEK-Info IV is {} bytes, {} needs {}",
            iv.len(),
            cipher.name(),
            cipher.iv_len()
        )));
    }
    let salt = iv.get(..8).unwrap_or(&iv);
    let key = kdf::evp_bytes_to_key_md5(passphrase.as_bytes(), salt, cipher.key_len());
    let plain = cipher.decrypt(&key, &iv, block.contents())?;

    let (details, _) = traditional_key(label, &plain).map_err(wrong_key_if_garbled)?;
    Ok(details.into_key(
        EncryptionState::Encrypted,
        Some(scheme_name),
        KeyFormat::LegacyEncryptedPem,
    ))
}

// ── ASN.1 helpers ───────────────────────────────────────────────────────

/// Read an INTEGER and return its content octets (sign octet included).
fn read_integer(r: BERReader) -> yasna::ASN1Result<Vec<u8>> {
    let tlv = r.read_der()?;
    util::der_integer_contents(&tlv)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| ASN1Error::new(ASN1ErrorKind::Invalid))
}

/// Consume any remaining optional elements of a SEQUENCE.
fn skip_rest(r: &mut yasna::BERReaderSeq<'_, '_>) -> yasna::ASN1Result<()> {
    while r.read_optional(|r| r.read_der())?.is_some() {}
    Ok(())
}
