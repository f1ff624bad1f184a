//! Length codecs: the length prefix of `LEN_VAL`, `TAG_LEN_VAL` and `LEN_TAG_VAL` fields.
//!
//! All codecs except [`LengthCodec::Hex`] have a fixed width. `Hex` is self-describing in the
//! BER style: lengths below 128 take one byte, up to 255 take `81 xx`, up to 65535 take
//! `82 xx xx`. Anything that does not fit is an error, never a truncation.

use byteorder::{BigEndian, ByteOrder};

use crate::error::CodecError;
use crate::packer::bcd;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LengthCodec {
    /// Decimal, zero filled to `2n` digits, packed as BCD.
    Bcd(usize),
    /// Unsigned big-endian integer of `n` bytes.
    Binary(usize),
    /// Zero filled ASCII decimal of `n` digits.
    Ascii(usize),
    /// `n` digits, each written as `0xF0 | digit`.
    EbcdicDecimal(usize),
    /// Self-describing one to three byte encoding.
    Hex,
}

impl LengthCodec {
    pub fn name(&self) -> String {
        match self {
            LengthCodec::Bcd(n) => format!("BcdLength({})", n),
            LengthCodec::Binary(n) => format!("BinaryLength({})", n),
            LengthCodec::Ascii(n) => format!("AsciiLength({})", n),
            LengthCodec::EbcdicDecimal(n) => format!("EbcdicDecimalLength({})", n),
            LengthCodec::Hex => "HexLength".to_string(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LengthCodec::Bcd(_) => "bcd length",
            LengthCodec::Binary(_) => "binary length",
            LengthCodec::Ascii(_) => "ascii length",
            LengthCodec::EbcdicDecimal(_) => "ebcdic decimal length",
            LengthCodec::Hex => "hex length",
        }
    }

    /// Width in bytes when it does not depend on the value.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            LengthCodec::Bcd(n)
            | LengthCodec::Binary(n)
            | LengthCodec::Ascii(n)
            | LengthCodec::EbcdicDecimal(n) => Some(*n),
            LengthCodec::Hex => None,
        }
    }

    /// Largest length this codec can represent.
    pub fn max_length(&self) -> u64 {
        fn decimal_max(digits: usize) -> u64 {
            if digits >= 19 {
                u64::MAX
            } else {
                10u64.pow(digits as u32) - 1
            }
        }
        match self {
            LengthCodec::Bcd(n) => decimal_max(n * 2),
            LengthCodec::Ascii(n) | LengthCodec::EbcdicDecimal(n) => decimal_max(*n),
            LengthCodec::Binary(n) => {
                if *n >= 8 {
                    u64::MAX
                } else {
                    (1u64 << (8 * n)) - 1
                }
            }
            LengthCodec::Hex => 0xffff,
        }
    }

    /// Width needed to encode `len`.
    pub fn width_for(&self, len: usize) -> Result<usize, CodecError> {
        match self.fixed_width() {
            Some(w) => Ok(w),
            None => match len {
                0..=0x7f => Ok(1),
                0x80..=0xff => Ok(2),
                0x100..=0xffff => Ok(3),
                _ => Err(self.overflow(len, 3)),
            },
        }
    }

    /// Width of the length field that starts at `offset`.
    pub fn field_width(&self, bytes: &[u8], offset: usize) -> Result<usize, CodecError> {
        if let Some(w) = self.fixed_width() {
            return Ok(w);
        }
        CodecError::check_available(self.label(), bytes, offset, 1)?;
        match bytes[offset] {
            0x81 => Ok(2),
            0x82 => Ok(3),
            b if b < 0x80 => Ok(1),
            b => Err(CodecError::Malformed {
                codec: self.label(),
                message: format!("unsupported first length byte {:02X}", b),
            }),
        }
    }

    fn overflow(&self, len: usize, width: usize) -> CodecError {
        CodecError::Overflow {
            codec: self.label(),
            value: len.to_string(),
            width,
        }
    }

    fn check_width(&self, width: usize) -> Result<(), CodecError> {
        let ok = match self.fixed_width() {
            Some(w) => w == width && w > 0 && !(matches!(self, LengthCodec::Binary(_)) && w > 8),
            None => (1..=3).contains(&width),
        };
        if ok {
            Ok(())
        } else {
            Err(CodecError::InvalidWidth {
                codec: self.label(),
                width,
            })
        }
    }

    /// Encode `len` in a field of `width` bytes.
    pub fn pack(&self, len: usize, width: usize) -> Result<Vec<u8>, CodecError> {
        self.check_width(width)?;
        let codec = self.label();
        match self {
            LengthCodec::Bcd(n) => {
                let digits = format!("{:0>w$}", len, w = n * 2);
                if digits.len() > n * 2 {
                    return Err(self.overflow(len, width));
                }
                bcd::pack_even(codec, &digits)
            }
            LengthCodec::Binary(n) => {
                if len as u64 > self.max_length() {
                    return Err(self.overflow(len, width));
                }
                let mut buf = vec![0u8; *n];
                BigEndian::write_uint(&mut buf, len as u64, *n);
                Ok(buf)
            }
            LengthCodec::Ascii(n) => {
                let digits = format!("{:0>w$}", len, w = *n);
                if digits.len() > *n {
                    return Err(self.overflow(len, width));
                }
                Ok(digits.into_bytes())
            }
            LengthCodec::EbcdicDecimal(n) => {
                let digits = format!("{:0>w$}", len, w = *n);
                if digits.len() > *n {
                    return Err(self.overflow(len, width));
                }
                Ok(digits.bytes().map(|d| 0xf0 | (d - b'0')).collect())
            }
            LengthCodec::Hex => match width {
                1 if len < 0x80 => Ok(vec![len as u8]),
                2 if len <= 0xff => Ok(vec![0x81, len as u8]),
                3 if len <= 0xffff => {
                    let mut buf = vec![0x82, 0, 0];
                    BigEndian::write_u16(&mut buf[1..], len as u16);
                    Ok(buf)
                }
                _ => Err(self.overflow(len, width)),
            },
        }
    }

    /// Encode `len` with the width it needs.
    pub fn encode(&self, len: usize) -> Result<Vec<u8>, CodecError> {
        self.pack(len, self.width_for(len)?)
    }

    /// Decode a `width` byte length at `offset`.
    pub fn unpack(&self, bytes: &[u8], offset: usize, width: usize) -> Result<usize, CodecError> {
        self.check_width(width)?;
        let codec = self.label();
        CodecError::check_available(codec, bytes, offset, width)?;
        let raw = &bytes[offset..offset + width];
        let value: u64 = match self {
            LengthCodec::Bcd(_) => {
                let digits = bcd::unpack_nibbles(raw);
                bcd::require_decimal(codec, &digits)?;
                parse_decimal(codec, &digits)?
            }
            LengthCodec::Binary(n) => BigEndian::read_uint(raw, *n),
            LengthCodec::Ascii(_) => {
                let digits: String = raw.iter().map(|b| *b as char).collect();
                bcd::require_decimal(codec, &digits)?;
                parse_decimal(codec, &digits)?
            }
            LengthCodec::EbcdicDecimal(_) => {
                let mut digits = String::with_capacity(width);
                for b in raw {
                    if !(0xf0..=0xf9).contains(b) {
                        return Err(CodecError::Malformed {
                            codec,
                            message: format!("byte {:02X} is not an EBCDIC digit", b),
                        });
                    }
                    digits.push((b'0' + (b & 0x0f)) as char);
                }
                parse_decimal(codec, &digits)?
            }
            LengthCodec::Hex => match (width, raw[0]) {
                (1, b) if b < 0x80 => b as u64,
                (2, 0x81) => raw[1] as u64,
                (3, 0x82) => BigEndian::read_u16(&raw[1..]) as u64,
                (_, b) => {
                    return Err(CodecError::Malformed {
                        codec,
                        message: format!("first byte {:02X} does not describe width {}", b, width),
                    })
                }
            },
        };
        usize::try_from(value).map_err(|_| CodecError::Overflow {
            codec,
            value: value.to_string(),
            width,
        })
    }
}

fn parse_decimal(codec: &'static str, digits: &str) -> Result<u64, CodecError> {
    digits.parse::<u64>().map_err(|e| CodecError::Malformed {
        codec,
        message: format!("{:?}: {}", digits, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::hex::{from_hex, to_hex};
    use proptest::prelude::*;

    #[test]
    fn known_vectors() {
        assert_eq!(to_hex(&LengthCodec::Bcd(1).encode(12).unwrap()), "12");
        assert_eq!(to_hex(&LengthCodec::Bcd(2).encode(2).unwrap()), "0002");
        assert_eq!(LengthCodec::Bcd(2).unpack(&from_hex("0123").unwrap(), 0, 2).unwrap(), 123);
        assert_eq!(to_hex(&LengthCodec::Binary(1).encode(12).unwrap()), "0C");
        assert_eq!(LengthCodec::Binary(2).unpack(&from_hex("0123").unwrap(), 0, 2).unwrap(), 291);
        assert_eq!(to_hex(&LengthCodec::Ascii(2).encode(12).unwrap()), "3132");
        assert_eq!(to_hex(&LengthCodec::Ascii(2).encode(3).unwrap()), "3033");
        assert_eq!(LengthCodec::Ascii(3).unpack(b"123", 0, 3).unwrap(), 123);
        assert_eq!(to_hex(&LengthCodec::EbcdicDecimal(2).encode(12).unwrap()), "F1F2");
        assert_eq!(
            LengthCodec::EbcdicDecimal(3).unpack(&from_hex("F1F2F3").unwrap(), 0, 3).unwrap(),
            123
        );
        assert_eq!(to_hex(&LengthCodec::Hex.encode(12).unwrap()), "0C");
        assert_eq!(to_hex(&LengthCodec::Hex.encode(200).unwrap()), "81C8");
        assert_eq!(to_hex(&LengthCodec::Hex.encode(65535).unwrap()), "82FFFF");
    }

    #[test]
    fn hex_width_from_first_byte() {
        let bytes = from_hex("82FFFF").unwrap();
        let width = LengthCodec::Hex.field_width(&bytes, 0).unwrap();
        assert_eq!(width, 3);
        assert_eq!(LengthCodec::Hex.unpack(&bytes, 0, width).unwrap(), 65535);
        assert_eq!(LengthCodec::Hex.field_width(&[0x05], 0).unwrap(), 1);
        assert!(LengthCodec::Hex.field_width(&[0x90], 0).is_err());
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(matches!(
            LengthCodec::Bcd(1).encode(100),
            Err(CodecError::Overflow { .. })
        ));
        assert!(LengthCodec::Binary(1).encode(256).is_err());
        assert!(LengthCodec::Ascii(2).encode(100).is_err());
        assert!(LengthCodec::EbcdicDecimal(1).encode(10).is_err());
        assert!(LengthCodec::Hex.encode(65536).is_err());
        assert!(LengthCodec::Hex.pack(200, 1).is_err());
    }

    #[test]
    fn width_mismatch_is_rejected() {
        assert!(matches!(
            LengthCodec::Ascii(2).pack(1, 3),
            Err(CodecError::InvalidWidth { width: 3, .. })
        ));
        assert!(LengthCodec::Binary(9).encode(1).is_err());
    }

    #[test]
    fn truncated_input() {
        assert!(matches!(
            LengthCodec::Ascii(3).unpack(b"12", 0, 3),
            Err(CodecError::Truncated { .. })
        ));
    }

    fn codecs() -> impl Strategy<Value = LengthCodec> {
        prop_oneof![
            (1usize..=4).prop_map(LengthCodec::Bcd),
            (1usize..=4).prop_map(LengthCodec::Binary),
            (1usize..=6).prop_map(LengthCodec::Ascii),
            (1usize..=6).prop_map(LengthCodec::EbcdicDecimal),
            Just(LengthCodec::Hex),
        ]
    }

    proptest! {
        #[test]
        fn length_round_trip(codec in codecs(), seed in any::<u64>()) {
            let len = (seed % (codec.max_length() + 1)) as usize;
            let width = codec.width_for(len).unwrap();
            let bytes = codec.pack(len, width).unwrap();
            prop_assert_eq!(bytes.len(), width);
            prop_assert_eq!(codec.field_width(&bytes, 0).unwrap(), width);
            prop_assert_eq!(codec.unpack(&bytes, 0, width).unwrap(), len);
        }
    }
}
