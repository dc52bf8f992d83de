//! Transport encodings for inline binary data.
//!
//! base16 uses `hex`, base64 variants use `base64`. base32 (RFC 4648),
//! Ascii85 and base85 (RFC 1924 alphabet) are implemented here.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A `data-encoding` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataEncoding {
    Base16,
    Base32,
    #[default]
    Base64,
    Base64Url,
    Ascii85,
    Base85,
}

impl DataEncoding {
    pub const ALL: [Self; 6] = [
        Self::Base16,
        Self::Base32,
        Self::Base64,
        Self::Base64Url,
        Self::Ascii85,
        Self::Base85,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Base16 => "base16",
            Self::Base32 => "base32",
            Self::Base64 => "base64",
            Self::Base64Url => "base64_url",
            Self::Ascii85 => "ascii85",
            Self::Base85 => "base85",
        }
    }

    #[must_use]
    pub fn encode(&self, data: &[u8]) -> String {
        match self {
            Self::Base16 => hex::encode_upper(data),
            Self::Base32 => base32_encode(data),
            Self::Base64 => STANDARD.encode(data),
            Self::Base64Url => URL_SAFE.encode(data),
            Self::Ascii85 => base85_encode(data, ASCII85_ALPHABET, true),
            Self::Base85 => base85_encode(data, BASE85_ALPHABET, false),
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidTransportData` if `text` is malformed.
    pub fn decode(&self, text: &str) -> Result<Vec<u8>> {
        let invalid = |message: String| Error::InvalidTransportData {
            codec: self.as_str().to_string(),
            message,
        };
        match self {
            Self::Base16 => hex::decode(text).map_err(|e| invalid(e.to_string())),
            Self::Base32 => base32_decode(text).ok_or_else(|| invalid("malformed input".into())),
            Self::Base64 => STANDARD.decode(text).map_err(|e| invalid(e.to_string())),
            Self::Base64Url => URL_SAFE.decode(text).map_err(|e| invalid(e.to_string())),
            Self::Ascii85 => {
                let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                let expanded = expand_zero_groups(&compact).ok_or_else(|| invalid("misplaced 'z'".into()))?;
                base85_decode(&expanded, ASCII85_ALPHABET).ok_or_else(|| invalid("malformed input".into()))
            }
            Self::Base85 => {
                base85_decode(text, BASE85_ALPHABET).ok_or_else(|| invalid("malformed input".into()))
            }
        }
    }
}

impl fmt::Display for DataEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|enc| enc.as_str() == s)
            .ok_or_else(|| Error::UnknownDataEncoding(s.to_string()))
    }
}

// ── base32 ────────────────────────────────────────────────────

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(char::from(BASE32_ALPHABET[((buffer >> bits) & 31) as usize]));
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(char::from(BASE32_ALPHABET[((buffer << (5 - bits)) & 31) as usize]));
    }
    while out.len() % 8 != 0 {
        out.push('=');
    }
    out
}

fn base32_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 8 != 0 {
        return None;
    }
    let body = text.trim_end_matches('=');
    let mut out = Vec::with_capacity(body.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for byte in body.bytes() {
        let value = BASE32_ALPHABET.iter().position(|&c| c == byte)?;
        buffer = (buffer << 5) | u32::try_from(value).ok()?;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(u8::try_from((buffer >> bits) & 0xff).ok()?);
        }
        buffer &= (1 << bits) - 1;
    }
    // leftover bits must be padding, never a whole character
    if bits >= 5 {
        return None;
    }
    Some(out)
}

// ── base85 family ─────────────────────────────────────────────

const ASCII85_ALPHABET: &[u8; 85] =
    b"!\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstu";

const BASE85_ALPHABET: &[u8; 85] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";

fn base85_encode(data: &[u8], alphabet: &[u8; 85], fold_zeros: bool) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(4) * 5);
    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(word);
        if fold_zeros && chunk.len() == 4 && value == 0 {
            out.push('z');
            continue;
        }
        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = alphabet[(value % 85) as usize];
            value /= 85;
        }
        for &d in &digits[..=chunk.len()] {
            out.push(char::from(d));
        }
    }
    out
}

fn expand_zero_groups(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut group_len = 0;
    for c in text.chars() {
        if c == 'z' {
            if group_len != 0 {
                return None;
            }
            out.push_str("!!!!!");
        } else {
            out.push(c);
            group_len = (group_len + 1) % 5;
        }
    }
    Some(out)
}

fn base85_decode(text: &str, alphabet: &[u8; 85]) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 5 * 4 + 4);
    for chunk in bytes.chunks(5) {
        if chunk.len() == 1 {
            return None;
        }
        let mut value: u64 = 0;
        for i in 0..5 {
            let digit = match chunk.get(i) {
                Some(c) => alphabet.iter().position(|a| a == c)?,
                // pad with the highest digit
                None => 84,
            };
            value = value * 85 + digit as u64;
        }
        let word = u32::try_from(value).ok()?.to_be_bytes();
        out.extend_from_slice(&word[..chunk.len() - 1]);
    }
    Some(out)
}
