//! Hex text helpers shared by codecs, the dump and the binaries.

use crate::error::CodecError;

const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Uppercase hex, no separators.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push(DIGITS[(b >> 4) as usize] as char);
        s.push(DIGITS[(b & 0x0f) as usize] as char);
    }
    s
}

pub(crate) fn nibble(codec: &'static str, c: char, input: &str) -> Result<u8, CodecError> {
    c.to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| CodecError::InvalidChar {
            codec,
            found: c,
            input: input.to_string(),
        })
}

/// Parse hex text (either case, whitespace ignored). An odd digit count gets a leading `0`.
pub fn from_hex(input: &str) -> Result<Vec<u8>, CodecError> {
    let digits: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    let mut out = Vec::with_capacity(digits.len() / 2 + 1);
    let mut chunks: &[char] = &digits;
    if digits.len() % 2 == 1 {
        out.push(nibble("hex", digits[0], input)?);
        chunks = &digits[1..];
    }
    for pair in chunks.chunks(2) {
        let hi = nibble("hex", pair[0], input)?;
        let lo = nibble("hex", pair[1], input)?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

/// Hex shortened to `first8...last8` when longer than 20 characters.
pub fn abbreviate(hex: &str) -> String {
    let chars: Vec<char> = hex.chars().collect();
    if chars.len() > 20 {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        hex.to_string()
    }
}
