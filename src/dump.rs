//! Diagnostic rendering of definition and value trees, plus the masking and text-conversion
//! strategies attached to field definitions.
//!
//! Output is an indented, XML-like listing meant for logs and error messages, not for parsing:
//!
//! ```text
//! <f type="MSG" name="msg" childTagCodec="EbcdicDecimalTag" childTagLen="2">
//!     <f type="LEN_TAG_VAL" tag="1" name="tag-1" bodyCodec="EbcdicBody"/>
//! </f>
//! ```
//!
//! Value dumps show the decoded value and the raw tag/length/body hex; hex longer than 20
//! characters is shortened to `first8...last8`. With `mask_private` set, fields that carry a
//! [`Masker`] show its output for both the value and the hex.

use std::fmt::{self, Write};

use crate::field::{FieldDef, FieldId, FieldType};
use crate::message::{ValueId, ValueTree};
use crate::packer::hex::{abbreviate, to_hex};
use crate::value::Value;

/// Hides private data (card numbers, keys) in dumps.
pub trait Masker: fmt::Debug + Send + Sync {
    fn mask_value(&self, value: &Value) -> String;
    fn mask_hex(&self, hex: &str) -> String;
}

/// Keeps the first four characters and replaces the rest with `*`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanMasker;

fn keep_prefix(text: &str, keep: usize) -> String {
    text.chars()
        .enumerate()
        .map(|(i, c)| if i < keep { c } else { '*' })
        .collect()
}

impl Masker for PanMasker {
    fn mask_value(&self, value: &Value) -> String {
        keep_prefix(&value.to_string(), 4)
    }

    fn mask_hex(&self, hex: &str) -> String {
        keep_prefix(hex, 4)
    }
}

/// Converts a decoded value to display text.
pub trait Stringer: fmt::Debug + Send + Sync {
    fn to_text(&self, value: &Value) -> String;
}

/// `Display` of the value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayStringer;

impl Stringer for DisplayStringer {
    fn to_text(&self, value: &Value) -> String {
        value.to_string()
    }
}

/// Uppercase hex of the value's bytes (text as ISO-8859-1, integers in base 16).
#[derive(Debug, Clone, Copy, Default)]
pub struct HexStringer;

impl Stringer for HexStringer {
    fn to_text(&self, value: &Value) -> String {
        match value {
            Value::Bytes(b) => to_hex(b),
            Value::Text(s) => to_hex(&s.chars().map(|c| c as u32 as u8).collect::<Vec<_>>()),
            Value::Int(n) => format!("{:X}", n),
        }
    }
}

/// Renders trees as text. Recursion stops at `max_depth`.
#[derive(Debug, Clone)]
pub struct Visualizer {
    pub max_depth: usize,
    pub indent: String,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            max_depth: 32,
            indent: "    ".to_string(),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;")
}

fn attr(out: &mut String, key: &str, value: impl fmt::Display) {
    let _ = write!(out, " {}=\"{}\"", key, escape(&value.to_string()));
}

impl Visualizer {
    pub fn new(max_depth: usize) -> Self {
        Visualizer {
            max_depth,
            ..Visualizer::default()
        }
    }

    fn pad(&self, depth: usize) -> String {
        self.indent.repeat(depth)
    }

    /// Dump the definition subtree rooted at `id`.
    pub fn dump_definition(&self, def: &FieldDef, id: FieldId) -> String {
        let mut out = String::new();
        self.definition_node(def, id, 0, &mut out);
        out
    }

    fn definition_node(&self, def: &FieldDef, id: FieldId, depth: usize, out: &mut String) {
        let pad = self.pad(depth);
        if depth > self.max_depth {
            let _ = writeln!(out, "{}<f truncated=\"depth limit {}\"/>", pad, self.max_depth);
            return;
        }
        let node = def.node(id);
        out.push_str(&pad);
        out.push_str("<f");
        attr(out, "type", node.kind().map_or("<undefined>", FieldType::name));
        if let Some(n) = node.field_num() {
            attr(out, "fieldNum", n);
        }
        if let Some(tag) = node.tag() {
            attr(out, "tag", tag);
        }
        if let Some(name) = node.name() {
            attr(out, "name", name);
        }
        if let Some(c) = node.length_codec() {
            attr(out, "lengthCodec", c.name());
        }
        if let Some(c) = node.bitmap_codec() {
            attr(out, "bitmapCodec", c.name());
        }
        if let Some(c) = node.body_codec() {
            attr(out, "bodyCodec", c.name());
        }
        if let Some(n) = node.max_len() {
            attr(out, "maxLen", n);
        }
        if let Some(n) = node.len() {
            attr(out, if node.exact_len() { "exactLen" } else { "len" }, n);
        }
        if let Some(c) = node.children_tag_codec() {
            attr(out, "childTagCodec", c.name());
        }
        if let Some(n) = node.children_tag_len() {
            attr(out, "childTagLen", n);
        }
        if let Some(c) = node.children_length_codec() {
            attr(out, "childLengthCodec", c.name());
        }
        if node.masker().is_some() {
            attr(out, "masked", true);
        }
        if node.is_leaf() {
            out.push_str("/>\n");
            return;
        }
        out.push_str(">\n");
        for child in node.children() {
            self.definition_node(def, *child, depth + 1, out);
        }
        let _ = writeln!(out, "{}</f>", pad);
    }

    /// Dump the value subtree rooted at `id`.
    pub fn dump_value(
        &self,
        def: &FieldDef,
        tree: &ValueTree,
        id: ValueId,
        mask_private: bool,
    ) -> String {
        let mut out = String::new();
        self.value_node(def, tree, id, mask_private, 0, &mut out);
        out
    }

    fn value_node(
        &self,
        def: &FieldDef,
        tree: &ValueTree,
        id: ValueId,
        mask: bool,
        depth: usize,
        out: &mut String,
    ) {
        let pad = self.pad(depth);
        if depth > self.max_depth {
            let _ = writeln!(out, "{}<f truncated=\"depth limit {}\"/>", pad, self.max_depth);
            return;
        }
        let node = tree.node(id);
        let field = def.node(node.field());
        let masker = if mask { field.masker() } else { None };
        out.push_str(&pad);
        out.push_str("<f");
        if let Some(name) = node.name() {
            attr(out, "name", name);
        }
        if let Some(n) = node.field_num() {
            attr(out, "fieldNum", n);
        }
        if let Some(tag) = node.tag() {
            attr(out, "tag", tag);
        }
        if let Some(value) = node.value() {
            let text = match (masker, field.stringer()) {
                (Some(m), _) => m.mask_value(value),
                (None, Some(s)) => s.to_text(value),
                (None, None) => DisplayStringer.to_text(value),
            };
            attr(out, "val", text);
        }
        if let Some(bits) = node.bitmap() {
            let list: Vec<String> = bits.iter().map(|b| b.to_string()).collect();
            attr(out, "bitmap", list.join(","));
        }
        let len_hex = node.length_bytes().map(to_hex);
        let tag_hex = node.tag_bytes().map(to_hex);
        let headers = if field.kind().map_or(false, FieldType::length_first) {
            [("lenHex", len_hex), ("tagHex", tag_hex)]
        } else {
            [("tagHex", tag_hex), ("lenHex", len_hex)]
        };
        for (key, hex) in headers.iter() {
            if let Some(hex) = hex {
                attr(out, key, abbreviate(hex));
            }
        }
        if node.is_leaf() {
            if let Some(body) = node.body_bytes() {
                let hex = to_hex(body);
                let hex = match masker {
                    Some(m) => m.mask_hex(&hex),
                    None => hex,
                };
                attr(out, "valHex", abbreviate(&hex));
            }
            out.push_str("/>\n");
            return;
        }
        out.push_str(">\n");
        for child in node.children() {
            self.value_node(def, tree, *child, mask, depth + 1, out);
        }
        let _ = writeln!(out, "{}</f>", pad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FieldBuilder;
    use crate::packer::BodyCodec;

    #[test]
    fn pan_masker() {
        let value = Value::from("4567890123456789");
        assert_eq!(PanMasker.mask_value(&value), "4567************");
        assert_eq!(PanMasker.mask_hex("4567890123"), "4567******");
        assert_eq!(PanMasker.mask_hex("45"), "45");
    }

    #[test]
    fn hex_stringer() {
        assert_eq!(HexStringer.to_text(&Value::from("ab")), "6162");
        assert_eq!(HexStringer.to_text(&Value::Bytes(vec![0x0f])), "0F");
        assert_eq!(HexStringer.to_text(&Value::Int(255)), "FF");
    }

    #[test]
    fn definition_dump_nests() {
        let def = FieldBuilder::new(FieldType::Val)
            .name("parent")
            .len(2)
            .create_child(FieldType::Val)
            .name("child")
            .len(2)
            .body_codec(BodyCodec::Hex)
            .build();
        let text = Visualizer::default().dump_definition(&def, def.root());
        assert_eq!(
            text,
            "<f type=\"VAL\" name=\"parent\" len=\"2\">\n    \
             <f type=\"VAL\" name=\"child\" bodyCodec=\"HexBody\" len=\"2\"/>\n</f>\n"
        );
    }

    #[test]
    fn depth_limit_truncates() {
        let mut b = FieldBuilder::new(FieldType::Msg).name("l0");
        for i in 1..6 {
            b = b.create_child(FieldType::Msg).name(format!("l{}", i));
        }
        let def = b.build();
        let text = Visualizer::new(2).dump_definition(&def, def.root());
        assert!(text.contains("name=\"l2\""));
        assert!(!text.contains("name=\"l3\""));
        assert!(text.contains("truncated=\"depth limit 2\""));
    }
}
