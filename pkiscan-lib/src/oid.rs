//! Centralized OID string constants used throughout pkiscan-lib.
//!
//! OIDs are kept in dotted-decimal form so they can be matched directly
//! against `to_id_string()` (x509-parser) and `to_string()` (yasna) output.
//! Sources: RFC 5280/3279/5480/8410 (X.509 algorithms), RFC 8018 (PKCS#5),
//! RFC 7292 (PKCS#12), RFC 2985 (PKCS#9).

// ── X.509 Distinguished Name attributes (RFC 4519 / X.520) ──────────────

pub const COMMON_NAME: &str = "2.5.4.3";
pub const SURNAME: &str = "2.5.4.4";
pub const SERIAL_NUMBER: &str = "2.5.4.5";
pub const COUNTRY: &str = "2.5.4.6";
pub const LOCALITY: &str = "2.5.4.7";
pub const STATE_OR_PROVINCE: &str = "2.5.4.8";
pub const STREET_ADDRESS: &str = "2.5.4.9";
pub const ORGANIZATION: &str = "2.5.4.10";
pub const ORGANIZATIONAL_UNIT: &str = "2.5.4.11";
pub const TITLE: &str = "2.5.4.12";
pub const GIVEN_NAME: &str = "2.5.4.42";
pub const EMAIL_ADDRESS: &str = "1.2.840.113549.1.9.1";
pub const DOMAIN_COMPONENT: &str = "0.9.2342.19200300.100.1.25";

// ── Signature algorithms ─────────────────────────────────────────────────

pub const MD2_WITH_RSA: &str = "1.2.840.113549.1.1.2";
pub const MD4_WITH_RSA: &str = "1.2.840.113549.1.1.3";
pub const MD5_WITH_RSA: &str = "1.2.840.113549.1.1.4";
pub const SHA1_WITH_RSA: &str = "1.2.840.113549.1.1.5";
pub const RSASSA_PSS: &str = "1.2.840.113549.1.1.10";
pub const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
pub const SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
pub const SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";
pub const SHA224_WITH_RSA: &str = "1.2.840.113549.1.1.14";
pub const SHA1_WITH_RSA_OIW: &str = "1.3.14.3.2.29";
pub const DSA_WITH_SHA1: &str = "1.2.840.10040.4.3";
pub const DSA_WITH_SHA256: &str = "2.16.840.1.101.3.4.3.2";
pub const ECDSA_WITH_SHA1: &str = "1.2.840.10045.4.1";
pub const ECDSA_WITH_SHA224: &str = "1.2.840.10045.4.3.1";
pub const ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";
pub const ECDSA_WITH_SHA384: &str = "1.2.840.10045.4.3.3";
pub const ECDSA_WITH_SHA512: &str = "1.2.840.10045.4.3.4";
pub const ED25519: &str = "1.3.101.112";
pub const ED448: &str = "1.3.101.113";

// ── Public key types ─────────────────────────────────────────────────────

pub const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
pub const DSA: &str = "1.2.840.10040.4.1";
pub const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
pub const X25519: &str = "1.3.101.110";
pub const X448: &str = "1.3.101.111";

// ── Named elliptic curves ────────────────────────────────────────────────

pub const CURVE_P256: &str = "1.2.840.10045.3.1.7";
pub const CURVE_P384: &str = "1.3.132.0.34";
pub const CURVE_P521: &str = "1.3.132.0.35";
pub const CURVE_SECP256K1: &str = "1.3.132.0.10";

// ── Digests (MAC and PRF inputs) ─────────────────────────────────────────

pub const MD2: &str = "1.2.840.113549.2.2";
pub const MD5: &str = "1.2.840.113549.2.5";
pub const SHA1: &str = "1.3.14.3.2.26";
pub const SHA224: &str = "2.16.840.1.101.3.4.2.4";
pub const SHA256: &str = "2.16.840.1.101.3.4.2.1";
pub const SHA384: &str = "2.16.840.1.101.3.4.2.2";
pub const SHA512: &str = "2.16.840.1.101.3.4.2.3";

pub const HMAC_WITH_SHA1: &str = "1.2.840.113549.2.7";
pub const HMAC_WITH_SHA224: &str = "1.2.840.113549.2.8";
pub const HMAC_WITH_SHA256: &str = "1.2.840.113549.2.9";
pub const HMAC_WITH_SHA384: &str = "1.2.840.113549.2.10";
pub const HMAC_WITH_SHA512: &str = "1.2.840.113549.2.11";

// ── PKCS#5 password-based encryption (RFC 8018) ─────────────────────────

pub const PBES2: &str = "1.2.840.113549.1.5.13";
pub const PBKDF2: &str = "1.2.840.113549.1.5.12";
pub const PBMAC1: &str = "1.2.840.113549.1.5.14";
pub const SCRYPT: &str = "1.3.6.1.4.1.11591.4.11";
pub const PBE_MD5_DES_CBC: &str = "1.2.840.113549.1.5.3";
pub const PBE_SHA1_DES_CBC: &str = "1.2.840.113549.1.5.10";

pub const DES_CBC: &str = "1.3.14.3.2.7";
pub const DES_EDE3_CBC: &str = "1.2.840.113549.3.7";
pub const RC2_CBC: &str = "1.2.840.113549.3.2";
pub const RC4: &str = "1.2.840.113549.3.4";
pub const AES_128_CBC: &str = "2.16.840.1.101.3.4.1.2";
pub const AES_192_CBC: &str = "2.16.840.1.101.3.4.1.22";
pub const AES_256_CBC: &str = "2.16.840.1.101.3.4.1.42";

// ── PKCS#12 PBE algorithms (RFC 7292 Appendix C) ────────────────────────

pub const PBE_SHA1_RC4_128: &str = "1.2.840.113549.1.12.1.1";
pub const PBE_SHA1_RC4_40: &str = "1.2.840.113549.1.12.1.2";
pub const PBE_SHA1_3DES: &str = "1.2.840.113549.1.12.1.3";
pub const PBE_SHA1_2DES: &str = "1.2.840.113549.1.12.1.4";
pub const PBE_SHA1_RC2_128: &str = "1.2.840.113549.1.12.1.5";
pub const PBE_SHA1_RC2_40: &str = "1.2.840.113549.1.12.1.6";

// ── PKCS#7 content types and PKCS#12 bag types ──────────────────────────

pub const PKCS7_DATA: &str = "1.2.840.113549.1.7.1";
pub const PKCS7_ENCRYPTED_DATA: &str = "1.2.840.113549.1.7.6";

pub const BAG_KEY: &str = "1.2.840.113549.1.12.10.1.1";
pub const BAG_PKCS8_SHROUDED_KEY: &str = "1.2.840.113549.1.12.10.1.2";
pub const BAG_CERT: &str = "1.2.840.113549.1.12.10.1.3";
pub const CERT_TYPE_X509: &str = "1.2.840.113549.1.9.22.1";

// ── PKCS#9 bag attributes ────────────────────────────────────────────────

pub const FRIENDLY_NAME: &str = "1.2.840.113549.1.9.20";
pub const LOCAL_KEY_ID: &str = "1.2.840.113549.1.9.21";

/// Short name for a distinguished-name attribute type, falling back to the
/// dotted OID.
pub fn attribute_short_name(oid: &str) -> String {
    match oid {
        COMMON_NAME => "CN",
        SURNAME => "SN",
        SERIAL_NUMBER => "serialNumber",
        COUNTRY => "C",
        LOCALITY => "L",
        STATE_OR_PROVINCE => "ST",
        STREET_ADDRESS => "street",
        ORGANIZATION => "O",
        ORGANIZATIONAL_UNIT => "OU",
        TITLE => "title",
        GIVEN_NAME => "GN",
        EMAIL_ADDRESS => "emailAddress",
        DOMAIN_COMPONENT => "DC",
        other => return other.to_string(),
    }
    .to_string()
}

/// OpenSSL-style name for a signature, digest, MAC, cipher or PBE algorithm.
pub fn algorithm_name(oid: &str) -> Option<&'static str> {
    let name = match oid {
        MD2_WITH_RSA => "md2WithRSAEncryption",
        MD4_WITH_RSA => "md4WithRSAEncryption",
        MD5_WITH_RSA => "md5WithRSAEncryption",
        SHA1_WITH_RSA => "sha1WithRSAEncryption",
        SHA1_WITH_RSA_OIW => "sha1WithRSA",
        RSASSA_PSS => "rsassaPss",
        SHA224_WITH_RSA => "sha224WithRSAEncryption",
        SHA256_WITH_RSA => "sha256WithRSAEncryption",
        SHA384_WITH_RSA => "sha384WithRSAEncryption",
        SHA512_WITH_RSA => "sha512WithRSAEncryption",
        DSA_WITH_SHA1 => "DSA-SHA1",
        DSA_WITH_SHA256 => "dsa_with_SHA256",
        ECDSA_WITH_SHA1 => "ecdsa-with-SHA1",
        ECDSA_WITH_SHA224 => "ecdsa-with-SHA224",
        ECDSA_WITH_SHA256 => "ecdsa-with-SHA256",
        ECDSA_WITH_SHA384 => "ecdsa-with-SHA384",
        ECDSA_WITH_SHA512 => "ecdsa-with-SHA512",
        ED25519 => "Ed25519",
        ED448 => "Ed448",

        MD2 => "md2",
        MD5 => "md5",
        SHA1 => "sha1",
        SHA224 => "sha224",
        SHA256 => "sha256",
        SHA384 => "sha384",
        SHA512 => "sha512",

        HMAC_WITH_SHA1 => "hmacWithSHA1",
        HMAC_WITH_SHA224 => "hmacWithSHA224",
        HMAC_WITH_SHA256 => "hmacWithSHA256",
        HMAC_WITH_SHA384 => "hmacWithSHA384",
        HMAC_WITH_SHA512 => "hmacWithSHA512",

        PBES2 => "PBES2",
        PBKDF2 => "PBKDF2",
        PBMAC1 => "PBMAC1",
        SCRYPT => "scrypt",
        PBE_MD5_DES_CBC => "pbeWithMD5AndDES-CBC",
        PBE_SHA1_DES_CBC => "pbeWithSHA1AndDES-CBC",
        DES_CBC => "des-cbc",
        DES_EDE3_CBC => "des-ede3-cbc",
        RC2_CBC => "rc2-cbc",
        RC4 => "rc4",
        AES_128_CBC => "aes-128-cbc",
        AES_192_CBC => "aes-192-cbc",
        AES_256_CBC => "aes-256-cbc",

        PBE_SHA1_RC4_128 => "pbeWithSHA1And128BitRC4",
        PBE_SHA1_RC4_40 => "pbeWithSHA1And40BitRC4",
        PBE_SHA1_3DES => "pbeWithSHA1And3-KeyTripleDES-CBC",
        PBE_SHA1_2DES => "pbeWithSHA1And2-KeyTripleDES-CBC",
        PBE_SHA1_RC2_128 => "pbeWithSHA1And128BitRC2-CBC",
        PBE_SHA1_RC2_40 => "pbeWithSHA1And40BitRC2-CBC",
        _ => return None,
    };
    Some(name)
}

/// [`algorithm_name`], falling back to the dotted OID.
pub fn algorithm_name_or_oid(oid: &str) -> String {
    algorithm_name(oid).map_or_else(|| oid.to_string(), str::to_string)
}
