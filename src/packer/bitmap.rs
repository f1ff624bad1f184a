//! Presence bitmap codecs for `BIT_SET` fields (ISO 8583 "IFB" binary and "IFA" ASCII-hex).
//!
//! ## Bit numbering
//!
//! Field numbers are 1-based. Field `i` lives in byte `(i - 1) / 8` under mask
//! `0x80 >> ((i - 1) % 8)`, so field 1 is the most significant bit of the first byte.
//!
//! ## Layouts
//!
//! | Layout | Bytes (IFB) | Fields |
//! |--------|-------------|--------|
//! | `Fixed(n)`, `n` in 1..=8 | `n` | 1..=8n, no extension |
//! | `Extended { min_blocks }` | 8, 16 or 24 | 2..=192 except 65 |
//!
//! In the extended layout field 1 flags that a secondary 8-byte block follows and field 65
//! flags a tertiary block. Both are reserved: pack sets them as needed and unpack never reports
//! them as present fields.
//!
//! IFA renders each IFB byte as two uppercase ASCII hex characters, doubling the size on the wire.
//!
//! ## Examples
//!
//! - `Ifb(Extended { min_blocks: 2 })`, fields {2, 4}: `D0` then 15 zero bytes.
//! - `Ifa(Fixed(1))`, fields {2, 4}: `35 30` (ASCII `"50"`).

use std::collections::BTreeSet;

use crate::error::CodecError;
use crate::packer::hex;

const BLOCK: usize = 8;
const SECONDARY_FLAG: u32 = 1;
const TERTIARY_FLAG: u32 = 65;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapLayout {
    Fixed(usize),
    Extended { min_blocks: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapCodec {
    Ifb(BitmapLayout),
    Ifa(BitmapLayout),
}

fn set_bit(bytes: &mut [u8], field: u32) {
    let i = (field - 1) as usize;
    bytes[i / 8] |= 0x80 >> (i % 8);
}

fn get_bit(bytes: &[u8], field: u32) -> bool {
    let i = (field - 1) as usize;
    i / 8 < bytes.len() && bytes[i / 8] & (0x80 >> (i % 8)) != 0
}

impl BitmapCodec {
    pub fn name(&self) -> String {
        match self {
            BitmapCodec::Ifb(layout) => format!("IfbBitmap({})", layout_name(layout)),
            BitmapCodec::Ifa(layout) => format!("IfaBitmap({})", layout_name(layout)),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            BitmapCodec::Ifb(_) => "ifb bitmap",
            BitmapCodec::Ifa(_) => "ifa bitmap",
        }
    }

    fn layout(&self) -> BitmapLayout {
        match self {
            BitmapCodec::Ifb(l) | BitmapCodec::Ifa(l) => *l,
        }
    }

    /// Wire bytes per bitmap byte.
    fn factor(&self) -> usize {
        match self {
            BitmapCodec::Ifb(_) => 1,
            BitmapCodec::Ifa(_) => 2,
        }
    }

    fn check_layout(&self) -> Result<(), CodecError> {
        let (ok, width) = match self.layout() {
            BitmapLayout::Fixed(n) => ((1..=8).contains(&n), n),
            BitmapLayout::Extended { min_blocks } => ((1..=3).contains(&min_blocks), min_blocks),
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

    /// Inclusive range of field numbers this codec can flag.
    pub fn field_range(&self) -> (u32, u32) {
        match self.layout() {
            BitmapLayout::Fixed(n) => (1, (n * 8) as u32),
            BitmapLayout::Extended { .. } => (2, (3 * BLOCK * 8) as u32),
        }
    }

    /// True when `field` can be flagged present by this codec.
    pub fn supports(&self, field: u32) -> bool {
        let (min, max) = self.field_range();
        let reserved =
            matches!(self.layout(), BitmapLayout::Extended { .. }) && field == TERTIARY_FLAG;
        (min..=max).contains(&field) && !reserved
    }

    /// Encode the set of present field numbers.
    pub fn pack(&self, fields: &BTreeSet<u32>) -> Result<Vec<u8>, CodecError> {
        self.check_layout()?;
        if let Some(bad) = fields.iter().find(|f| !self.supports(**f)) {
            let (min, max) = self.field_range();
            return Err(CodecError::FieldOutOfRange {
                codec: self.label(),
                field: *bad,
                min,
                max,
            });
        }
        let bitmap = match self.layout() {
            BitmapLayout::Fixed(n) => {
                let mut bytes = vec![0u8; n];
                for f in fields {
                    set_bit(&mut bytes, *f);
                }
                bytes
            }
            BitmapLayout::Extended { min_blocks } => {
                let highest = fields.iter().next_back().copied().unwrap_or(0) as usize;
                let needed = (highest + BLOCK * 8 - 1) / (BLOCK * 8);
                let blocks = needed.max(min_blocks).max(1);
                let mut bytes = vec![0u8; blocks * BLOCK];
                for f in fields {
                    set_bit(&mut bytes, *f);
                }
                if blocks >= 2 {
                    set_bit(&mut bytes, SECONDARY_FLAG);
                }
                if blocks >= 3 {
                    set_bit(&mut bytes, TERTIARY_FLAG);
                }
                bytes
            }
        };
        Ok(match self {
            BitmapCodec::Ifb(_) => bitmap,
            BitmapCodec::Ifa(_) => hex::to_hex(&bitmap).into_bytes(),
        })
    }

    /// Read `count` bitmap bytes starting at wire offset `offset`.
    fn read(&self, bytes: &[u8], offset: usize, count: usize) -> Result<Vec<u8>, CodecError> {
        let wire = count * self.factor();
        CodecError::check_available(self.label(), bytes, offset, wire)?;
        let raw = &bytes[offset..offset + wire];
        match self {
            BitmapCodec::Ifb(_) => Ok(raw.to_vec()),
            BitmapCodec::Ifa(_) => raw
                .chunks(2)
                .map(|pair| {
                    let digit = |b: u8| (b as char).to_digit(16);
                    match (digit(pair[0]), digit(pair[1])) {
                        (Some(hi), Some(lo)) => Ok((hi << 4 | lo) as u8),
                        _ => Err(CodecError::Malformed {
                            codec: self.label(),
                            message: format!(
                                "{:?} is not {} ASCII hex digits",
                                String::from_utf8_lossy(raw),
                                wire
                            ),
                        }),
                    }
                })
                .collect(),
        }
    }

    /// Decode a bitmap at `offset`; returns the present field numbers and the bytes consumed.
    pub fn unpack(&self, bytes: &[u8], offset: usize) -> Result<(BTreeSet<u32>, usize), CodecError> {
        self.check_layout()?;
        let factor = self.factor();
        let bitmap = match self.layout() {
            BitmapLayout::Fixed(n) => self.read(bytes, offset, n)?,
            BitmapLayout::Extended { .. } => {
                let mut bitmap = self.read(bytes, offset, BLOCK)?;
                if get_bit(&bitmap, SECONDARY_FLAG) {
                    let next = self.read(bytes, offset + BLOCK * factor, BLOCK)?;
                    bitmap.extend_from_slice(&next);
                    if get_bit(&bitmap, TERTIARY_FLAG) {
                        let next = self.read(bytes, offset + 2 * BLOCK * factor, BLOCK)?;
                        bitmap.extend_from_slice(&next);
                    }
                }
                bitmap
            }
        };
        let fields = (1..=(bitmap.len() * 8) as u32)
            .filter(|f| get_bit(&bitmap, *f) && self.supports(*f))
            .collect();
        Ok((fields, bitmap.len() * factor))
    }
}

fn layout_name(layout: &BitmapLayout) -> String {
    match layout {
        BitmapLayout::Fixed(n) => n.to_string(),
        BitmapLayout::Extended { min_blocks } => format!("extended, {} block(s) min", min_blocks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::hex::{from_hex, to_hex};
    use proptest::prelude::*;

    fn set(fields: &[u32]) -> BTreeSet<u32> {
        fields.iter().copied().collect()
    }

    #[test]
    fn ifb_two_blocks() {
        let codec = BitmapCodec::Ifb(BitmapLayout::Extended { min_blocks: 2 });
        let bytes = codec.pack(&set(&[2, 4])).unwrap();
        assert_eq!(to_hex(&bytes), format!("D0{}", "0".repeat(30)));
        let (fields, consumed) = codec.unpack(&bytes, 0).unwrap();
        assert_eq!(fields, set(&[2, 4]));
        assert_eq!(consumed, 16);
    }

    #[test]
    fn ifb_extends_when_needed() {
        let codec = BitmapCodec::Ifb(BitmapLayout::Extended { min_blocks: 1 });
        assert_eq!(codec.pack(&set(&[3])).unwrap().len(), 8);
        assert_eq!(codec.pack(&set(&[3, 70])).unwrap().len(), 16);
        let bytes = codec.pack(&set(&[3, 130])).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[0], 0xa0);
        assert_eq!(bytes[8], 0x80);
        let (fields, consumed) = codec.unpack(&bytes, 0).unwrap();
        assert_eq!(fields, set(&[3, 130]));
        assert_eq!(consumed, 24);
    }

    #[test]
    fn ifb_reserved_fields_rejected() {
        let codec = BitmapCodec::Ifb(BitmapLayout::Extended { min_blocks: 1 });
        assert!(matches!(
            codec.pack(&set(&[1])),
            Err(CodecError::FieldOutOfRange { field: 1, .. })
        ));
        assert!(codec.pack(&set(&[65])).is_err());
        assert!(codec.pack(&set(&[193])).is_err());
    }

    #[test]
    fn ifb_fixed() {
        let codec = BitmapCodec::Ifb(BitmapLayout::Fixed(2));
        let bytes = codec.pack(&set(&[1, 16])).unwrap();
        assert_eq!(bytes, vec![0x80, 0x01]);
        assert_eq!(codec.unpack(&bytes, 0).unwrap(), (set(&[1, 16]), 2));
        assert!(codec.pack(&set(&[17])).is_err());
        assert!(BitmapCodec::Ifb(BitmapLayout::Fixed(9)).pack(&set(&[1])).is_err());
    }

    #[test]
    fn ifa_vectors() {
        let one = BitmapCodec::Ifa(BitmapLayout::Fixed(1));
        assert_eq!(to_hex(&one.pack(&set(&[2, 4])).unwrap()), "3530");
        assert_eq!(one.unpack(&from_hex("3530").unwrap(), 0).unwrap(), (set(&[2, 4]), 2));

        let eight = BitmapCodec::Ifa(BitmapLayout::Fixed(8));
        assert_eq!(
            to_hex(&eight.pack(&set(&[2, 4])).unwrap()),
            format!("3530{}", "30".repeat(14))
        );

        let extended = BitmapCodec::Ifa(BitmapLayout::Extended { min_blocks: 1 });
        let bytes = extended.pack(&set(&[2, 4, 66])).unwrap();
        assert_eq!(bytes, b"D0000000000000004000000000000000".to_vec());
        assert_eq!(extended.unpack(&bytes, 0).unwrap(), (set(&[2, 4, 66]), 32));
    }

    #[test]
    fn ifa_rejects_non_hex_digits() {
        let codec = BitmapCodec::Ifa(BitmapLayout::Fixed(2));
        assert!(matches!(
            codec.unpack(b"5 0A", 0),
            Err(CodecError::Malformed { .. })
        ));
        assert!(codec.unpack(b"500A", 0).is_ok());
    }

    #[test]
    fn truncated_secondary_block() {
        let codec = BitmapCodec::Ifb(BitmapLayout::Extended { min_blocks: 1 });
        let mut bytes = vec![0u8; 12];
        bytes[0] = 0x80;
        assert!(matches!(
            codec.unpack(&bytes, 0),
            Err(CodecError::Truncated { .. })
        ));
    }

    fn codecs() -> impl Strategy<Value = BitmapCodec> {
        let layouts = prop_oneof![
            (1usize..=8).prop_map(BitmapLayout::Fixed),
            (1usize..=3).prop_map(|min_blocks| BitmapLayout::Extended { min_blocks }),
        ];
        (layouts, any::<bool>()).prop_map(|(layout, ascii)| {
            if ascii {
                BitmapCodec::Ifa(layout)
            } else {
                BitmapCodec::Ifb(layout)
            }
        })
    }

    proptest! {
        #[test]
        fn bitmap_round_trip(codec in codecs(), raw in proptest::collection::btree_set(1u32..=192, 0..40)) {
            let fields: BTreeSet<u32> = raw.into_iter().filter(|f| codec.supports(*f)).collect();
            let bytes = codec.pack(&fields).unwrap();
            let (decoded, consumed) = codec.unpack(&bytes, 0).unwrap();
            prop_assert_eq!(decoded, fields);
            prop_assert_eq!(consumed, bytes.len());
        }
    }
}
