//! Textual layout format, parsed with PEST into a [`FieldDef`] through the [`FieldBuilder`].
//!
//! ```text
//! # EBCDIC TLV container
//! MSG "msg" {
//!     children_length = ebcdic_decimal(2);
//!     children_tag = ebcdic_decimal(2);
//!     TAG_LEN_VAL "tag-1" { tag = 1; body = ebcdic; }
//!     TAG_LEN_VAL "tag-3" { tag = 3; body = ebcdic; }
//! }
//! ```
//!
//! A field is an optional type, an optional quoted name and a braced body of properties and
//! child fields. Properties:
//!
//! | Property          | Value                                                                  |
//! |-------------------|------------------------------------------------------------------------|
//! | `tag`             | number, or quoted text for literal/text tag codecs                     |
//! | `field_num`       | number (children of `BIT_SET`)                                         |
//! | `len`, `max_len`  | number                                                                 |
//! | `exact_len`       | number                                                                 |
//! | `body`            | `bcd_left_zero`, `bcd_left_f`, `bcd_right_f`, `bcd_no_padding`, `bcd_int(n)`, `hex`, `ascii`, `ebcdic`, `literal` |
//! | `length`, `children_length` | `bcd(n)`, `binary(n)`, `ascii(n)`, `ebcdic_decimal(n)`, `hex` |
//! | `children_tag`    | `hex(w)`, `literal(w)`, `bcd(w)`, `ebcdic_decimal(w)`, `ascii_decimal(w)`, `ascii_text(w)` |
//! | `bitmap`          | `ifb(n)`, `ifb_extended(min)`, `ifa(n)`, `ifa_extended(min)`           |
//! | `masker`          | `pan`                                                                  |
//! | `stringer`        | `display`, `hex`                                                       |
//!
//! `#` starts a comment that runs to the end of the line.

use std::path::Path;
use std::sync::Arc;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

use crate::builder::FieldBuilder;
use crate::dump::{DisplayStringer, HexStringer, PanMasker};
use crate::error::{PackError, Result};
use crate::field::{FieldDef, FieldNode, FieldType};
use crate::packer::{BcdPadding, BitmapCodec, BitmapLayout, BodyCodec, LengthCodec, TagCodec};
use crate::validator;

#[derive(PestParser)]
#[grammar = "layout.pest"]
struct LayoutParser;

/// Parse and validate a layout.
pub fn parse_layout(source: &str) -> Result<FieldDef> {
    let def = build_layout(source)?;
    validator::validate(&def)?;
    Ok(def)
}

/// Parse a layout without running the structural validator.
pub fn build_layout(source: &str) -> Result<FieldDef> {
    let layout = LayoutParser::parse(Rule::layout, source)
        .map_err(|e| PackError::Layout(format!("parse error: {}", e)))?
        .next()
        .ok_or_else(|| PackError::Layout("empty layout".to_string()))?;
    let root = layout
        .into_inner()
        .find(|p| p.as_rule() == Rule::field)
        .ok_or_else(|| PackError::Layout("layout has no root field".to_string()))?;
    let (kind, name) = field_head(&root)?;
    let mut b = FieldBuilder::with_root(FieldNode::default()).set_kind(kind);
    if let Some(name) = name {
        b = b.name(name);
    }
    Ok(build_field(b, root)?.build())
}

/// Read, parse and validate a layout file.
pub fn load_layout(path: impl AsRef<Path>) -> Result<FieldDef> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .map_err(|e| PackError::Layout(format!("{}: {}", path.display(), e)))?;
    parse_layout(&source)
}

fn layout_error(pair: &Pair<Rule>, message: impl std::fmt::Display) -> PackError {
    let (line, col) = pair.as_span().start_pos().line_col();
    PackError::Layout(format!("line {}, column {}: {}", line, col, message))
}

fn text_of(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|t| t.as_str().to_string())
        .unwrap_or_default()
}

fn field_head(pair: &Pair<Rule>) -> Result<(Option<FieldType>, Option<String>)> {
    let mut kind = None;
    let mut name = None;
    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::field_type => {
                kind = Some(
                    inner
                        .as_str()
                        .parse::<FieldType>()
                        .map_err(|e| layout_error(&inner, e))?,
                )
            }
            Rule::string => name = Some(text_of(inner)),
            _ => {}
        }
    }
    Ok((kind, name))
}

fn build_field(mut b: FieldBuilder, pair: Pair<Rule>) -> Result<FieldBuilder> {
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::property => b = apply_property(b, inner)?,
            Rule::field => {
                let (kind, name) = field_head(&inner)?;
                b = b.create_child_node(FieldNode::default()).set_kind(kind);
                if let Some(name) = name {
                    b = b.name(name);
                }
                b = build_field(b, inner)?.jump_to_parent()?;
            }
            _ => {}
        }
    }
    Ok(b)
}

enum Setting {
    Number(u64),
    Text(String),
    Codec { name: String, arg: Option<usize> },
}

fn parse_number(pair: &Pair<Rule>) -> Result<u64> {
    pair.as_str()
        .parse::<u64>()
        .map_err(|e| layout_error(pair, e))
}

fn setting(pair: Pair<Rule>) -> Result<Setting> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| PackError::Layout("property without value".to_string()))?;
    match inner.as_rule() {
        Rule::number => Ok(Setting::Number(parse_number(&inner)?)),
        Rule::string => Ok(Setting::Text(text_of(inner))),
        Rule::codec => {
            let mut parts = inner.into_inner();
            let name = parts
                .next()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default();
            let arg = match parts.next() {
                Some(n) => Some(parse_number(&n)? as usize),
                None => None,
            };
            Ok(Setting::Codec { name, arg })
        }
        _ => Err(layout_error(&inner, "unexpected property value")),
    }
}

fn apply_property(b: FieldBuilder, pair: Pair<Rule>) -> Result<FieldBuilder> {
    let mut parts = pair.clone().into_inner();
    let key = parts
        .next()
        .ok_or_else(|| layout_error(&pair, "property without key"))?;
    let value = parts
        .next()
        .ok_or_else(|| layout_error(&pair, "property without value"))?;
    let value = setting(value)?;
    let err = |message: String| layout_error(&pair, message);

    let number = |v: &Setting| match v {
        Setting::Number(n) => Ok(*n),
        _ => Err(err(format!("'{}' takes a number", key.as_str()))),
    };
    let size = |v: &Setting| number(v).map(|n| n as usize);

    match key.as_str() {
        "tag" => match &value {
            Setting::Number(n) => b.tag(*n),
            Setting::Text(s) => b.tag(s.as_str()),
            Setting::Codec { .. } => Err(err("'tag' takes a number or a quoted string".into())),
        },
        "field_num" => {
            let n = number(&value)?;
            let n = u32::try_from(n).map_err(|_| err(format!("field number {} is too large", n)))?;
            b.field_num(n)
        }
        "len" => Ok(b.len(size(&value)?)),
        "max_len" => Ok(b.max_len(size(&value)?)),
        "exact_len" => Ok(b.exact_len(size(&value)?)),
        "body" => Ok(b.body_codec(body_codec(&value).map_err(err)?)),
        "length" => b.length_codec(length_codec(&value).map_err(err)?),
        "children_length" => b.children_length_codec(length_codec(&value).map_err(err)?),
        "children_tag" => {
            let (codec, width) = tag_codec(&value).map_err(err)?;
            Ok(b.children_tag_codec(codec, width))
        }
        "bitmap" => Ok(b.bitmap_codec(bitmap_codec(&value).map_err(err)?)),
        "masker" => match codec_name(&value) {
            Some(("pan", None)) => Ok(b.masker(Arc::new(PanMasker))),
            _ => Err(err("unknown masker; expected 'pan'".into())),
        },
        "stringer" => match codec_name(&value) {
            Some(("display", None)) => Ok(b.stringer(Arc::new(DisplayStringer))),
            Some(("hex", None)) => Ok(b.stringer(Arc::new(HexStringer))),
            _ => Err(err("unknown stringer; expected 'display' or 'hex'".into())),
        },
        other => Err(layout_error(&key, format!("unknown property '{}'", other))),
    }
}

fn codec_name(value: &Setting) -> Option<(&str, Option<usize>)> {
    match value {
        Setting::Codec { name, arg } => Some((name.as_str(), *arg)),
        _ => None,
    }
}

fn body_codec(value: &Setting) -> std::result::Result<BodyCodec, String> {
    Ok(match codec_name(value) {
        Some(("bcd_left_zero", None)) => BodyCodec::Bcd(BcdPadding::LeftZero),
        Some(("bcd_left_f", None)) => BodyCodec::Bcd(BcdPadding::LeftF),
        Some(("bcd_right_f", None)) => BodyCodec::Bcd(BcdPadding::RightF),
        Some(("bcd_no_padding", None)) => BodyCodec::Bcd(BcdPadding::NoPadding),
        Some(("bcd_int", Some(n))) => BodyCodec::BcdInt(n),
        Some(("hex", None)) => BodyCodec::Hex,
        Some(("ascii", None)) => BodyCodec::Ascii,
        Some(("ebcdic", None)) => BodyCodec::Ebcdic,
        Some(("literal", None)) => BodyCodec::Literal,
        _ => return Err("unknown body codec".to_string()),
    })
}

fn length_codec(value: &Setting) -> std::result::Result<LengthCodec, String> {
    Ok(match codec_name(value) {
        Some(("bcd", Some(n))) => LengthCodec::Bcd(n),
        Some(("binary", Some(n))) => LengthCodec::Binary(n),
        Some(("ascii", Some(n))) => LengthCodec::Ascii(n),
        Some(("ebcdic_decimal", Some(n))) => LengthCodec::EbcdicDecimal(n),
        Some(("hex", None)) => LengthCodec::Hex,
        _ => return Err("unknown length codec".to_string()),
    })
}

fn tag_codec(value: &Setting) -> std::result::Result<(TagCodec, usize), String> {
    let (name, width) = match codec_name(value) {
        Some((name, Some(width))) => (name, width),
        _ => return Err("children_tag takes a codec with its width, e.g. hex(1)".to_string()),
    };
    let codec = match name {
        "hex" => TagCodec::Hex,
        "literal" => TagCodec::Literal,
        "bcd" => TagCodec::Bcd,
        "ebcdic_decimal" => TagCodec::EbcdicDecimal,
        "ascii_decimal" => TagCodec::AsciiDecimal,
        "ascii_text" => TagCodec::AsciiText,
        other => return Err(format!("unknown tag codec '{}'", other)),
    };
    Ok((codec, width))
}

fn bitmap_codec(value: &Setting) -> std::result::Result<BitmapCodec, String> {
    Ok(match codec_name(value) {
        Some(("ifb", Some(n))) => BitmapCodec::Ifb(BitmapLayout::Fixed(n)),
        Some(("ifb_extended", Some(min))) => BitmapCodec::Ifb(BitmapLayout::Extended { min_blocks: min }),
        Some(("ifa", Some(n))) => BitmapCodec::Ifa(BitmapLayout::Fixed(n)),
        Some(("ifa_extended", Some(min))) => BitmapCodec::Ifa(BitmapLayout::Extended { min_blocks: min }),
        _ => return Err("unknown bitmap codec".to_string()),
    })
}
