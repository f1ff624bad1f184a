//! Packed decimal (BCD) nibble packing.
//!
//! Digits `0`-`9` map to nibbles `0`-`9`, the track-2 separator `=` maps to nibble `D`, and the
//! padding character `F` maps to nibble `F`.

use crate::error::CodecError;

fn digit_nibble(codec: &'static str, c: char, input: &str) -> Result<u8, CodecError> {
    match c {
        '0'..='9' => Ok(c as u8 - b'0'),
        '=' => Ok(0x0d),
        'F' | 'f' => Ok(0x0f),
        _ => Err(CodecError::InvalidChar {
            codec,
            found: c,
            input: input.to_string(),
        }),
    }
}

fn nibble_char(n: u8) -> char {
    match n {
        0..=9 => (b'0' + n) as char,
        0x0d => '=',
        _ => char::from_digit(n as u32, 16)
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?'),
    }
}

/// Pack a digit string that already has an even length (padding applied by the caller).
pub(crate) fn pack_even(codec: &'static str, digits: &str) -> Result<Vec<u8>, CodecError> {
    let chars: Vec<char> = digits.chars().collect();
    if chars.len() % 2 != 0 {
        return Err(CodecError::Malformed {
            codec,
            message: format!("odd digit count in {:?}", digits),
        });
    }
    let mut out = Vec::with_capacity(chars.len() / 2);
    for pair in chars.chunks(2) {
        let hi = digit_nibble(codec, pair[0], digits)?;
        let lo = digit_nibble(codec, pair[1], digits)?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

/// Every nibble of `bytes`, high first, as characters.
pub(crate) fn unpack_nibbles(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push(nibble_char(b >> 4));
        s.push(nibble_char(b & 0x0f));
    }
    s
}

/// Reject anything but decimal digits; used where padding nibbles make no sense.
pub(crate) fn require_decimal(codec: &'static str, digits: &str) -> Result<(), CodecError> {
    match digits.chars().find(|c| !c.is_ascii_digit()) {
        Some(c) => Err(CodecError::InvalidChar {
            codec,
            found: c,
            input: digits.to_string(),
        }),
        None => Ok(()),
    }
}
