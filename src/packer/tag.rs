//! Tag codecs. A parent definition owns one tag codec and a tag width that apply to all of its
//! tagged children.

use byteorder::{BigEndian, ByteOrder};

use crate::error::CodecError;
use crate::packer::{bcd, ebcdic, hex};
use crate::value::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCodec {
    /// Numeric tag as a big-endian integer.
    Hex,
    /// Tag given as hex text (`9F26`), written as the raw bytes it spells.
    Literal,
    /// Numeric tag as packed decimal.
    Bcd,
    /// Numeric tag as EBCDIC digits (`F1F2`).
    EbcdicDecimal,
    /// Numeric tag as ASCII digits.
    AsciiDecimal,
    /// Text tag as ASCII characters.
    AsciiText,
}

impl TagCodec {
    pub fn name(&self) -> &'static str {
        match self {
            TagCodec::Hex => "HexTag",
            TagCodec::Literal => "LiteralTag",
            TagCodec::Bcd => "BcdTag",
            TagCodec::EbcdicDecimal => "EbcdicDecimalTag",
            TagCodec::AsciiDecimal => "AsciiDecimalTag",
            TagCodec::AsciiText => "AsciiTextTag",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TagCodec::Hex => "hex tag",
            TagCodec::Literal => "literal tag",
            TagCodec::Bcd => "bcd tag",
            TagCodec::EbcdicDecimal => "ebcdic decimal tag",
            TagCodec::AsciiDecimal => "ascii decimal tag",
            TagCodec::AsciiText => "ascii text tag",
        }
    }

    fn number(&self, tag: &Tag) -> Result<u64, CodecError> {
        match tag {
            Tag::Num(n) => Ok(*n),
            Tag::Text(_) => Err(CodecError::WrongKind {
                codec: self.label(),
                expected: "numeric tag",
                found: "text tag",
            }),
        }
    }

    fn text<'t>(&self, tag: &'t Tag) -> Result<&'t str, CodecError> {
        match tag {
            Tag::Text(s) => Ok(s),
            Tag::Num(_) => Err(CodecError::WrongKind {
                codec: self.label(),
                expected: "text tag",
                found: "numeric tag",
            }),
        }
    }

    fn overflow(&self, tag: &Tag, width: usize) -> CodecError {
        CodecError::Overflow {
            codec: self.label(),
            value: tag.to_string(),
            width,
        }
    }

    fn zero_filled(&self, tag: &Tag, n: u64, digits: usize, width: usize) -> Result<String, CodecError> {
        let s = format!("{:0>w$}", n, w = digits);
        if s.len() > digits {
            return Err(self.overflow(tag, width));
        }
        Ok(s)
    }

    /// Encode `tag` into exactly `width` bytes.
    pub fn pack(&self, tag: &Tag, width: usize) -> Result<Vec<u8>, CodecError> {
        let codec = self.label();
        if width == 0 || (*self == TagCodec::Hex && width > 8) {
            return Err(CodecError::InvalidWidth { codec, width });
        }
        match self {
            TagCodec::Hex => {
                let n = self.number(tag)?;
                if width < 8 && n >> (8 * width) != 0 {
                    return Err(self.overflow(tag, width));
                }
                let mut buf = vec![0u8; width];
                BigEndian::write_uint(&mut buf, n, width);
                Ok(buf)
            }
            TagCodec::Literal => {
                let text = self.text(tag)?;
                if text.chars().count() > width * 2 {
                    return Err(self.overflow(tag, width));
                }
                hex::from_hex(&format!("{:0>w$}", text, w = width * 2))
            }
            TagCodec::Bcd => {
                let n = self.number(tag)?;
                let digits = self.zero_filled(tag, n, width * 2, width)?;
                bcd::pack_even(codec, &digits)
            }
            TagCodec::EbcdicDecimal => {
                let n = self.number(tag)?;
                let digits = self.zero_filled(tag, n, width, width)?;
                Ok(digits.bytes().map(|d| 0xf0 | (d - b'0')).collect())
            }
            TagCodec::AsciiDecimal => {
                let n = self.number(tag)?;
                Ok(self.zero_filled(tag, n, width, width)?.into_bytes())
            }
            TagCodec::AsciiText => {
                let text = self.text(tag)?;
                if text.chars().count() != width || !text.is_ascii() {
                    return Err(CodecError::Malformed {
                        codec,
                        message: format!("tag {:?} must be {} ASCII character(s)", text, width),
                    });
                }
                Ok(text.as_bytes().to_vec())
            }
        }
    }

    /// Decode a `width` byte tag at `offset`.
    pub fn unpack(&self, bytes: &[u8], offset: usize, width: usize) -> Result<Tag, CodecError> {
        let codec = self.label();
        if width == 0 || (*self == TagCodec::Hex && width > 8) {
            return Err(CodecError::InvalidWidth { codec, width });
        }
        CodecError::check_available(codec, bytes, offset, width)?;
        let raw = &bytes[offset..offset + width];
        let decimal = |digits: String| -> Result<Tag, CodecError> {
            bcd::require_decimal(codec, &digits)?;
            digits
                .parse::<u64>()
                .map(Tag::Num)
                .map_err(|e| CodecError::Malformed {
                    codec,
                    message: format!("{:?}: {}", digits, e),
                })
        };
        match self {
            TagCodec::Hex => Ok(Tag::Num(BigEndian::read_uint(raw, width))),
            TagCodec::Literal => Ok(Tag::Text(hex::to_hex(raw))),
            TagCodec::Bcd => decimal(bcd::unpack_nibbles(raw)),
            TagCodec::EbcdicDecimal => {
                if let Some(b) = raw.iter().find(|b| !(0xf0..=0xf9).contains(*b)) {
                    return Err(CodecError::Malformed {
                        codec,
                        message: format!("byte {:02X} is not an EBCDIC digit", b),
                    });
                }
                decimal(ebcdic::decode(raw))
            }
            TagCodec::AsciiDecimal => decimal(raw.iter().map(|b| *b as char).collect()),
            TagCodec::AsciiText => Ok(Tag::Text(raw.iter().map(|b| *b as char).collect())),
        }
    }
}
