//! Text codec lookup for entry encodings.
//!
//! `ascii`, `latin1` and `utf-16` keep their strict meanings: seven-bit
//! bytes, a direct byte to code point mapping, and UTF-16 with a byte
//! order mark. Every other name is resolved as a WHATWG label, so `utf-8`,
//! `utf8`, `windows-1252` and friends all work. The sentinel `binary` is
//! not a codec.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::error::{Error, Result};

/// Encoding sentinel for non-text entries.
pub const BINARY: &str = "binary";

/// Canonical UTF-8 encoding name.
pub const UTF8: &str = "utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Ascii,
    Latin1,
    /// UTF-16 with a byte order mark; little endian when it is missing.
    Utf16,
    Whatwg(&'static Encoding),
}

fn lookup(label: &str) -> Result<Codec> {
    let name = label.trim().to_ascii_lowercase().replace(['_', ' '], "-");
    let codec = match name.as_str() {
        "ascii" | "us-ascii" | "646" => Codec::Ascii,
        "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" | "l1" | "cp819" => Codec::Latin1,
        "utf-16" | "utf16" => Codec::Utf16,
        _ => Encoding::for_label(name.as_bytes())
            .map(Codec::Whatwg)
            .ok_or_else(|| Error::UnknownEncoding(label.to_string()))?,
    };
    Ok(codec)
}

/// Whether `label` names UTF-8.
#[must_use]
pub fn is_utf8(label: &str) -> bool {
    lookup(label).is_ok_and(|codec| codec == Codec::Whatwg(UTF_8))
}

/// Whether `label` names a codec this crate can use.
#[must_use]
pub fn is_known(label: &str) -> bool {
    lookup(label).is_ok()
}

fn decode_strict<'a>(enc: &'static Encoding, bytes: &'a [u8], label: &str) -> Result<Cow<'a, str>> {
    enc.decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| Error::UndecodableText(label.to_string()))
}

/// Strictly decode `bytes` with the codec named `label`.
///
/// # Errors
///
/// Returns `UnknownEncoding` for unrecognised labels and `UndecodableText`
/// when the bytes are malformed for the codec.
pub fn decode<'a>(bytes: &'a [u8], label: &str) -> Result<Cow<'a, str>> {
    match lookup(label)? {
        Codec::Ascii => {
            if !bytes.is_ascii() {
                return Err(Error::UndecodableText(label.to_string()));
            }
            std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|_| Error::UndecodableText(label.to_string()))
        }
        Codec::Latin1 => Ok(Cow::Owned(bytes.iter().copied().map(char::from).collect())),
        Codec::Utf16 => match bytes {
            [0xFF, 0xFE, rest @ ..] => decode_strict(UTF_16LE, rest, label),
            [0xFE, 0xFF, rest @ ..] => decode_strict(UTF_16BE, rest, label),
            _ => decode_strict(UTF_16LE, bytes, label),
        },
        Codec::Whatwg(enc) => decode_strict(enc, bytes, label),
    }
}

/// Strictly encode `text` with the codec named `label`.
///
/// # Errors
///
/// Returns `UnknownEncoding` for unrecognised labels and `UndecodableText`
/// when the text contains characters the codec cannot represent.
pub fn encode(text: &str, label: &str) -> Result<Vec<u8>> {
    let unmappable = || Error::UndecodableText(label.to_string());
    match lookup(label)? {
        Codec::Ascii => {
            if text.is_ascii() {
                Ok(text.as_bytes().to_vec())
            } else {
                Err(unmappable())
            }
        }
        Codec::Latin1 => text
            .chars()
            .map(|c| u8::try_from(c).map_err(|_| unmappable()))
            .collect(),
        Codec::Utf16 => Ok([0xFF, 0xFE]
            .into_iter()
            .chain(text.encode_utf16().flat_map(u16::to_le_bytes))
            .collect()),
        // encoding_rs only produces UTF-8 for the UTF-16 family
        Codec::Whatwg(enc) if enc == UTF_16LE => {
            Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect())
        }
        Codec::Whatwg(enc) if enc == UTF_16BE => {
            Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect())
        }
        Codec::Whatwg(enc) => {
            let (bytes, _, failed) = enc.encode(text);
            if failed {
                return Err(unmappable());
            }
            Ok(bytes.into_owned())
        }
    }
}

/// Whether `bytes` decode with `label` and encode back to identical bytes.
#[must_use]
pub fn round_trips(bytes: &[u8], label: &str) -> bool {
    decode(bytes, label)
        .and_then(|text| encode(&text, label))
        .is_ok_and(|again| again == bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_labels() {
        assert!(is_utf8("utf-8"));
        assert!(is_utf8("UTF8"));
        assert!(!is_utf8("latin1"));
        assert!(!is_utf8(BINARY));
    }

    #[test]
    fn test_decode_strict() {
        assert_eq!(decode(b"caf\xc3\xa9", "utf-8").unwrap(), "café");
        assert!(matches!(
            decode(b"\xff\xfe\xfd", "utf-8"),
            Err(Error::UndecodableText(_))
        ));
        assert!(matches!(
            decode(b"abc", "no-such-codec"),
            Err(Error::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_utf16_encode_decode() {
        let bytes = encode("hi", "utf-16le").unwrap();
        assert_eq!(bytes, vec![b'h', 0, b'i', 0]);
        assert_eq!(decode(&bytes, "utf-16le").unwrap(), "hi");
    }

    #[test]
    fn test_round_trips() {
        assert!(round_trips("héllo".as_bytes(), "utf-8"));
        assert!(round_trips(b"caf\xe9", "latin1"));
        assert!(!round_trips(b"\xc3", "utf-8"));
    }

    #[test]
    fn test_ascii_is_seven_bit() {
        assert_eq!(decode(b"abc", "ascii").unwrap(), "abc");
        assert!(matches!(encode("é", "ascii"), Err(Error::UndecodableText(_))));
        assert!(matches!(decode(b"\xe9", "US-ASCII"), Err(Error::UndecodableText(_))));
    }

    #[test]
    fn test_latin1_maps_bytes_to_code_points() {
        for label in ["latin1", "latin-1", "ISO-8859-1", "iso_8859_1"] {
            assert_eq!(decode(b"\x80\xe9", label).unwrap(), "\u{80}é");
            assert_eq!(encode("\u{80}é", label).unwrap(), vec![0x80, 0xe9]);
        }
        assert!(matches!(encode("€", "latin1"), Err(Error::UndecodableText(_))));
        // windows-1252 keeps its own table
        assert_eq!(decode(b"\x80", "windows-1252").unwrap(), "€");
    }

    #[test]
    fn test_utf16_byte_order_mark() {
        let bytes = encode("hi", "utf-16").unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFE, b'h', 0, b'i', 0]);
        assert_eq!(decode(&bytes, "utf-16").unwrap(), "hi");
        assert_eq!(decode(&[0xFE, 0xFF, 0, b'h'], "UTF16").unwrap(), "h");
        assert_eq!(decode(&[b'h', 0], "utf-16").unwrap(), "h");
        assert!(round_trips(&bytes, "utf-16"));
        assert!(!round_trips(&[b'h', 0], "utf-16"));
    }
}
