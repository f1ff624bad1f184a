//! Body codecs: turn a decoded [`Value`] into body bytes and back.
//!
//! | Codec | Value | Wire |
//! |-------|-------|------|
//! | `Bcd(LeftZero)` | digits | packed decimal, odd count padded with a leading `0` nibble |
//! | `Bcd(LeftF)` | digits | odd count padded with a leading `F` nibble |
//! | `Bcd(RightF)` | digits | odd count padded with a trailing `F` nibble |
//! | `Bcd(NoPadding)` | digits | even count only |
//! | `BcdInt(n)` | integer | `n` bytes of packed decimal, zero filled |
//! | `Hex` | hex text | raw bytes (uppercase text on decode) |
//! | `Ascii` | text | ISO-8859-1, one byte per char |
//! | `Ebcdic` | text | IBM037, one byte per char |
//! | `Literal` | bytes | unchanged |
//!
//! Unpacking `Bcd(LeftZero)` always drops one leading `0`, so an even-length value that starts
//! with `0` does not survive a round trip. `Bcd(LeftF)` and `Bcd(RightF)` are lossless.

use crate::error::CodecError;
use crate::packer::{bcd, ebcdic, hex};
use crate::value::Value;

/// Where a BCD body puts its padding nibble when the digit count is odd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcdPadding {
    LeftZero,
    LeftF,
    RightF,
    NoPadding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyCodec {
    Bcd(BcdPadding),
    /// Unsigned integer in a fixed number of BCD bytes.
    BcdInt(usize),
    /// Hex text of either case. Unpacking yields uppercase and an odd digit count comes back
    /// with a leading `0`, so `"abc"` packs and unpacks to `"0ABC"`.
    Hex,
    Ascii,
    Ebcdic,
    Literal,
}

impl BodyCodec {
    /// Name shown in dumps.
    pub fn name(&self) -> String {
        match self {
            BodyCodec::Bcd(p) => format!("BcdBody({:?})", p),
            BodyCodec::BcdInt(n) => format!("BcdIntBody({})", n),
            BodyCodec::Hex => "HexBody".to_string(),
            BodyCodec::Ascii => "AsciiBody".to_string(),
            BodyCodec::Ebcdic => "EbcdicBody".to_string(),
            BodyCodec::Literal => "LiteralBody".to_string(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            BodyCodec::Bcd(_) => "bcd body",
            BodyCodec::BcdInt(_) => "bcd int body",
            BodyCodec::Hex => "hex body",
            BodyCodec::Ascii => "ascii body",
            BodyCodec::Ebcdic => "ebcdic body",
            BodyCodec::Literal => "literal body",
        }
    }

    fn text<'v>(&self, value: &'v Value) -> Result<&'v str, CodecError> {
        value.as_str().ok_or(CodecError::WrongKind {
            codec: self.label(),
            expected: "text",
            found: value.kind(),
        })
    }

    /// Encode `value` into a fresh buffer.
    pub fn pack(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let codec = self.label();
        match self {
            BodyCodec::Bcd(padding) => {
                let digits = self.text(value)?;
                if let Some(c) = digits.chars().find(|c| !c.is_ascii_digit() && *c != '=') {
                    return Err(CodecError::InvalidChar {
                        codec,
                        found: c,
                        input: digits.to_string(),
                    });
                }
                let even = digits.chars().count() % 2 == 0;
                let padded = match (padding, even) {
                    (_, true) => digits.to_string(),
                    (BcdPadding::LeftZero, false) => format!("0{}", digits),
                    (BcdPadding::LeftF, false) => format!("F{}", digits),
                    (BcdPadding::RightF, false) => format!("{}F", digits),
                    (BcdPadding::NoPadding, false) => {
                        return Err(CodecError::Malformed {
                            codec,
                            message: format!("odd digit count in {:?} needs padding", digits),
                        })
                    }
                };
                bcd::pack_even(codec, &padded)
            }
            BodyCodec::BcdInt(width) => {
                let n = match value {
                    Value::Int(n) => *n,
                    other => other.as_u64().ok_or(CodecError::WrongKind {
                        codec,
                        expected: "integer",
                        found: other.kind(),
                    })?,
                };
                let digits = format!("{:0>w$}", n, w = width * 2);
                if digits.len() > width * 2 {
                    return Err(CodecError::Overflow {
                        codec,
                        value: n.to_string(),
                        width: *width,
                    });
                }
                bcd::pack_even(codec, &digits)
            }
            BodyCodec::Hex => hex::from_hex(self.text(value)?),
            BodyCodec::Ascii => {
                let text = self.text(value)?;
                text.chars()
                    .map(|c| {
                        u8::try_from(c as u32).map_err(|_| CodecError::InvalidChar {
                            codec,
                            found: c,
                            input: text.to_string(),
                        })
                    })
                    .collect()
            }
            BodyCodec::Ebcdic => ebcdic::encode(codec, self.text(value)?),
            BodyCodec::Literal => match value {
                Value::Bytes(b) => Ok(b.clone()),
                other => Err(CodecError::WrongKind {
                    codec,
                    expected: "bytes",
                    found: other.kind(),
                }),
            },
        }
    }

    /// Encode `value` into `buffer` starting at `offset`; returns the number of bytes written.
    pub fn pack_into(
        &self,
        value: &Value,
        buffer: &mut [u8],
        offset: usize,
    ) -> Result<usize, CodecError> {
        let bytes = self.pack(value)?;
        let end = offset + bytes.len();
        if end > buffer.len() {
            return Err(CodecError::Truncated {
                codec: self.label(),
                offset,
                needed: bytes.len(),
                available: buffer.len().saturating_sub(offset),
            });
        }
        buffer[offset..end].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    /// Decode `length` bytes at `offset`.
    pub fn unpack(&self, bytes: &[u8], offset: usize, length: usize) -> Result<Value, CodecError> {
        let codec = self.label();
        CodecError::check_available(codec, bytes, offset, length)?;
        let raw = &bytes[offset..offset + length];
        match self {
            BodyCodec::Bcd(padding) => {
                let mut digits = bcd::unpack_nibbles(raw);
                match padding {
                    BcdPadding::LeftZero => {
                        if digits.starts_with('0') {
                            digits.remove(0);
                        }
                    }
                    BcdPadding::LeftF => {
                        if digits.starts_with('F') {
                            digits.remove(0);
                        }
                    }
                    BcdPadding::RightF => {
                        if digits.ends_with('F') {
                            digits.pop();
                        }
                    }
                    BcdPadding::NoPadding => {}
                }
                Ok(Value::Text(digits))
            }
            BodyCodec::BcdInt(_) => {
                let digits = bcd::unpack_nibbles(raw);
                bcd::require_decimal(codec, &digits)?;
                let n = digits.parse::<u64>().map_err(|e| CodecError::Malformed {
                    codec,
                    message: format!("{:?}: {}", digits, e),
                })?;
                Ok(Value::Int(n))
            }
            BodyCodec::Hex => Ok(Value::Text(hex::to_hex(raw))),
            BodyCodec::Ascii => Ok(Value::Text(raw.iter().map(|b| *b as char).collect())),
            BodyCodec::Ebcdic => Ok(Value::Text(ebcdic::decode(raw))),
            BodyCodec::Literal => Ok(Value::Bytes(raw.to_vec())),
        }
    }

    /// Number of bytes `pack` would produce.
    pub fn packed_length(&self, value: &Value) -> Result<usize, CodecError> {
        match self {
            BodyCodec::Bcd(_) => Ok((self.text(value)?.chars().count() + 1) / 2),
            BodyCodec::BcdInt(n) => Ok(*n),
            BodyCodec::Hex => Ok((self.text(value)?.chars().count() + 1) / 2),
            BodyCodec::Ascii | BodyCodec::Ebcdic => Ok(self.text(value)?.chars().count()),
            BodyCodec::Literal => self.pack(value).map(|b| b.len()),
        }
    }
}
