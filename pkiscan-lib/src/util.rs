//! Shared encoding utilities.

use base64::Engine;

/// Format bytes as colon-separated uppercase hex (e.g., "AB:CD:EF").
pub fn hex_colon_upper(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Encode bytes as base64 with PEM-style 64-character line wrapping.
pub fn base64_wrap(data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    encoded
        .as_bytes()
        .chunks(64)
        .filter_map(|c| std::str::from_utf8(c).ok())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether the input looks like PEM text (has a `-----BEGIN` marker
/// after optional leading whitespace or explanatory text).
pub fn is_pem(data: &[u8]) -> bool {
    data.windows(11).any(|w| w == b"-----BEGIN ")
}

/// Return the content octets of a DER INTEGER given its full TLV encoding.
///
/// Only definite-length, single-byte-tag encodings are accepted. Leading
/// zero octets are kept; see [`unsigned_bit_length`].
pub fn der_integer_contents(tlv: &[u8]) -> Option<&[u8]> {
    let (&tag, rest) = tlv.split_first()?;
    if tag != 0x02 {
        return None;
    }
    let (&first, rest) = rest.split_first()?;
    let (len, rest) = if first & 0x80 == 0 {
        (usize::from(first), rest)
    } else {
        let n = usize::from(first & 0x7f);
        if n == 0 || n > 4 || rest.len() < n {
            return None;
        }
        let (len_bytes, rest) = rest.split_at(n);
        let len = len_bytes
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
        (len, rest)
    };
    rest.get(..len)
}

/// Bit length of a big-endian unsigned integer, ignoring leading zero octets.
pub fn unsigned_bit_length(bytes: &[u8]) -> u32 {
    let Some(stripped) = bytes
        .iter()
        .position(|&b| b != 0)
        .and_then(|i| bytes.get(i..))
    else {
        return 0;
    };
    let Some(&first) = stripped.first() else {
        return 0;
    };
    let full = u32::try_from(stripped.len().saturating_sub(1)).unwrap_or(u32::MAX / 8);
    full.saturating_mul(8)
        .saturating_add(8 - first.leading_zeros())
}

/// Interpret a short big-endian unsigned integer as `u64`, returning `None`
/// when it does not fit.
pub fn unsigned_to_u64(bytes: &[u8]) -> Option<u64> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    let significant = bytes.get(start..)?;
    if significant.len() > 8 {
        return None;
    }
    Some(
        significant
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn hex_colon_formats_upper() {
        assert_eq!(hex_colon_upper(&[0xab, 0x01, 0xff]), "AB:01:FF");
        assert_eq!(hex_colon_upper(&[]), "");
    }

    #[test]
    fn pem_detection_allows_leading_text() {
        assert!(is_pem(b"Bag Attributes\n-----BEGIN CERTIFICATE-----\n"));
        assert!(!is_pem(&[0x30, 0x82, 0x01, 0x00]));
    }

    #[test]
    fn integer_contents_short_and_long_form() {
        assert_eq!(der_integer_contents(&[0x02, 0x01, 0x05]), Some(&[0x05][..]));
        let mut long = vec![0x02, 0x81, 0x81, 0x00];
        long.extend(std::iter::repeat(0xff).take(128));
        let contents = der_integer_contents(&long).unwrap();
        assert_eq!(contents.len(), 129);
        assert_eq!(der_integer_contents(&[0x04, 0x01, 0x05]), None);
        assert_eq!(der_integer_contents(&[0x02, 0x05, 0x05]), None);
    }

    #[test]
    fn bit_length_ignores_sign_octet() {
        let mut modulus = vec![0x00, 0xc0];
        modulus.extend(std::iter::repeat(0).take(255));
        assert_eq!(unsigned_bit_length(&modulus), 2048);
        assert_eq!(unsigned_bit_length(&[0x01]), 1);
        assert_eq!(unsigned_bit_length(&[0x00, 0x00]), 0);
        assert_eq!(unsigned_bit_length(&[0x7f, 0xff]), 15);
    }

    #[test]
    fn small_unsigned_values() {
        assert_eq!(unsigned_to_u64(&[0x01, 0x00, 0x01]), Some(65537));
        assert_eq!(unsigned_to_u64(&[0x00; 12]), Some(0));
        assert_eq!(unsigned_to_u64(&[0x01; 9]), None);
    }
}
