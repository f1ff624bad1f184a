//! Pack and unpack a [`ValueTree`] against a [`FieldDef`].
//!
//! Each field contributes up to three parts, in the order fixed by its type:
//!
//! | Type          | Wire order                          | Length covers |
//! |---------------|-------------------------------------|---------------|
//! | `TAG_LEN_VAL` | tag, length, body                   | body          |
//! | `LEN_TAG_VAL` | length, tag, body                   | tag and body  |
//! | `TAG_VAL`     | tag, body (`len` bytes)             |               |
//! | `LEN_VAL`     | length, body                        | body          |
//! | `BIT_SET`     | bitmap, flagged children            |               |
//! | `VAL`         | body (`len` bytes, or the rest)     |               |
//! | `MSG`         | children up to the end of the input |               |
//!
//! The tag codec and width come from the parent; the length codec from the field itself or from
//! the parent's children length codec. For a composite the body is the concatenation of its
//! packed children. A composite whose children pack to nothing is left out entirely.
//!
//! Unpacking walks the children of a composite in declared order. The last declared child is
//! sticky, so a trailing repeated field is read as often as it occurs. A tag that does not match
//! the expected child is looked up among its siblings; positional `VAL` leaves go to the first
//! declared sibling that has no body bytes yet.

use std::collections::BTreeSet;

use crate::dump::Visualizer;
use crate::error::{PackError, Result};
use crate::field::{FieldDef, FieldId, FieldNode, FieldType};
use crate::message::{ValueId, ValueTree};
use crate::packer::hex::to_hex;
use crate::validator::ValidationRule;
use crate::value::{Tag, Value};

/// Encoded parts of one leaf, as computed when its value is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldBytes {
    pub tag: Option<Vec<u8>>,
    pub length: Option<Vec<u8>>,
    pub body: Vec<u8>,
}

fn kind_of(def: &FieldDef, field: FieldId) -> Result<FieldType> {
    def.node(field).kind().ok_or_else(|| {
        PackError::definition(def.path(field), ValidationRule::MissingType, "field type is not defined")
    })
}

/// Enforce `len`, `exact_len` and `max_len` on a packed body of `actual` bytes.
fn check_body_len(node: &FieldNode, kind: FieldType, actual: usize, path: &str) -> Result<()> {
    if let Some(len) = node.len() {
        if (node.exact_len() || kind.is_fixed_length()) && actual != len {
            return Err(PackError::data(
                path,
                format!("packed length {} differs from declared length {}", actual, len),
            ));
        }
    }
    if let Some(max) = node.max_len() {
        if actual > max {
            return Err(PackError::data(
                path,
                format!("packed length {} exceeds max_len {}", actual, max),
            ));
        }
    }
    Ok(())
}

/// Tag and length bytes of `field` for a body of `body_len` bytes.
pub(crate) fn headers(
    def: &FieldDef,
    field: FieldId,
    body_len: usize,
    path: &str,
) -> Result<(Option<Vec<u8>>, Option<Vec<u8>>)> {
    let kind = kind_of(def, field)?;
    let node = def.node(field);
    let tag = if kind.is_tagged() {
        let tag = node.tag().ok_or_else(|| {
            PackError::definition(path, ValidationRule::MissingTag, "tagged field has no tag")
        })?;
        let (codec, width) = def.resolved_tag_codec(field).ok_or_else(|| {
            PackError::definition(
                path,
                ValidationRule::MissingTag,
                "parent has no children tag codec and width",
            )
        })?;
        Some(codec.pack(tag, width).map_err(|e| PackError::field(path, e))?)
    } else {
        None
    };
    let length = if kind.has_length() {
        let codec = def.resolved_length_codec(field).ok_or_else(|| {
            PackError::definition(path, ValidationRule::LengthCodec, "no length codec")
        })?;
        let covered = match (&tag, kind) {
            (Some(t), FieldType::LenTagVal) => body_len + t.len(),
            _ => body_len,
        };
        Some(codec.encode(covered).map_err(|e| PackError::field(path, e))?)
    } else {
        None
    };
    Ok((tag, length))
}

/// Encode `value` for leaf `field`, enforcing its length constraints.
pub(crate) fn field_bytes(
    def: &FieldDef,
    field: FieldId,
    value: &Value,
    path: &str,
) -> Result<FieldBytes> {
    let kind = kind_of(def, field)?;
    let node = def.node(field);
    if !node.is_leaf() {
        return Err(PackError::data(
            path,
            format!("{} has child fields; set values on its leaves", kind),
        ));
    }
    let codec = node.body_codec().ok_or_else(|| {
        PackError::definition(path, ValidationRule::MissingBodyCodec, "leaf field has no body codec")
    })?;
    let body = codec.pack(value).map_err(|e| PackError::field(path, e))?;
    check_body_len(node, kind, body.len(), path)?;
    let (tag, length) = headers(def, field, body.len(), path)?;
    Ok(FieldBytes { tag, length, body })
}

fn assemble(kind: FieldType, tag: Option<&[u8]>, length: Option<&[u8]>, body: &[u8], out: &mut Vec<u8>) {
    let (first, second) = if kind.length_first() {
        (length, tag)
    } else {
        (tag, length)
    };
    out.extend_from_slice(first.unwrap_or_default());
    out.extend_from_slice(second.unwrap_or_default());
    out.extend_from_slice(body);
}

/// Pack/unpack engine bound to one definition. Cheap to create; holds no state between calls.
#[derive(Debug, Clone, Copy)]
pub struct Codec<'d> {
    def: &'d FieldDef,
}

impl<'d> Codec<'d> {
    pub fn new(def: &'d FieldDef) -> Self {
        Codec { def }
    }

    fn wrap(&self, err: PackError, message: &str, tree: &ValueTree) -> PackError {
        let vis = Visualizer::default();
        err.with_dumps(
            message,
            vis.dump_value(self.def, tree, tree.root(), true),
            vis.dump_definition(self.def, self.def.root()),
        )
    }

    /// Pack a whole value tree.
    pub fn encode(&self, tree: &ValueTree) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_node(tree, tree.root(), &mut out)
            .map_err(|e| self.wrap(e, "pack failed", tree))?;
        Ok(out)
    }

    fn encode_node(&self, tree: &ValueTree, id: ValueId, out: &mut Vec<u8>) -> Result<()> {
        let value = tree.node(id);
        let field = value.field();
        let node = self.def.node(field);
        let kind = kind_of(self.def, field)?;
        let path = tree.path(id);

        if node.is_leaf() {
            let body = match value.body_bytes() {
                Some(b) => b,
                None => return Ok(()),
            };
            let computed;
            let (tag, length) = match (value.tag_bytes(), value.length_bytes()) {
                (t, l) if t.is_some() == kind.is_tagged() && l.is_some() == kind.has_length() => {
                    (t, l)
                }
                _ => {
                    computed = headers(self.def, field, body.len(), &path)?;
                    (computed.0.as_deref(), computed.1.as_deref())
                }
            };
            log::debug!("pack {} ({} body byte(s))", path, body.len());
            assemble(kind, tag, length, body, out);
            return Ok(());
        }

        let mut content = Vec::new();
        if kind == FieldType::BitSet {
            let codec = node.bitmap_codec().ok_or_else(|| {
                PackError::definition(&path, ValidationRule::BitmapDefinition, "BIT_SET has no bitmap codec")
            })?;
            let mut present = BTreeSet::new();
            let mut children = Vec::new();
            for child in node.children() {
                let mut packed = Vec::new();
                for v in tree.children_for(id, *child) {
                    self.encode_node(tree, v, &mut packed)?;
                }
                if packed.is_empty() {
                    continue;
                }
                let n = self.def.node(*child).field_num().ok_or_else(|| {
                    PackError::definition(
                        self.def.path(*child),
                        ValidationRule::BitmapChild,
                        "child of a BIT_SET needs a field number",
                    )
                })?;
                present.insert(n);
                children.extend(packed);
            }
            if present.is_empty() {
                return Ok(());
            }
            content = codec.pack(&present).map_err(|e| PackError::field(&path, e))?;
            log::trace!("{} bitmap {:?}", path, present);
            content.extend(children);
        } else {
            for child in node.children() {
                for v in tree.children_for(id, *child) {
                    self.encode_node(tree, v, &mut content)?;
                }
            }
        }
        if content.is_empty() {
            return Ok(());
        }
        check_body_len(node, kind, content.len(), &path)?;
        let (tag, length) = headers(self.def, field, content.len(), &path)?;
        log::debug!("pack {} ({} content byte(s))", path, content.len());
        assemble(kind, tag.as_deref(), length.as_deref(), &content, out);
        Ok(())
    }

    /// Unpack `bytes`; every byte must belong to the message.
    pub fn decode(&self, bytes: &[u8]) -> Result<ValueTree> {
        let (tree, used) = self.decode_at(bytes, 0)?;
        if used != bytes.len() {
            let err = PackError::data(
                tree.path(tree.root()),
                format!("{} trailing byte(s) after the message", bytes.len() - used),
            );
            return Err(self.wrap(err, "unpack failed", &tree));
        }
        Ok(tree)
    }

    /// Unpack one message starting at `offset`; returns the tree and the bytes consumed.
    pub fn decode_at(&self, bytes: &[u8], offset: usize) -> Result<(ValueTree, usize)> {
        let mut decoder = Decoder {
            def: self.def,
            bytes,
            tree: ValueTree::new(self.def),
        };
        let root = decoder.tree.root();
        if offset > bytes.len() {
            let err = PackError::data(
                decoder.tree.path(root),
                format!("offset {} is past the end of a {} byte buffer", offset, bytes.len()),
            );
            return Err(self.wrap(err, "unpack failed", &decoder.tree));
        }
        match decoder.field(root, offset, bytes.len()) {
            Ok(end) => Ok((decoder.tree, end - offset)),
            Err(e) => Err(self.wrap(e, "unpack failed", &decoder.tree)),
        }
    }
}

struct Decoder<'d, 'b> {
    def: &'d FieldDef,
    bytes: &'b [u8],
    tree: ValueTree,
}

impl<'d, 'b> Decoder<'d, 'b> {
    fn read_length(&self, field: FieldId, pos: usize, limit: usize, path: &str) -> Result<(usize, usize)> {
        let codec = self.def.resolved_length_codec(field).ok_or_else(|| {
            PackError::definition(path, ValidationRule::LengthCodec, "no length codec")
        })?;
        let window = &self.bytes[..limit];
        let width = codec
            .field_width(window, pos)
            .map_err(|e| PackError::field(path, e))?;
        let n = codec
            .unpack(window, pos, width)
            .map_err(|e| PackError::field(path, e))?;
        Ok((n, width))
    }

    fn unknown_tag(&self, id: ValueId, field: FieldId, tag: &Tag, codec_name: &str) -> PackError {
        let node = self.def.node(field);
        let parent_path = self
            .tree
            .node(id)
            .parent()
            .map_or_else(|| "<root>".to_string(), |p| self.tree.path(p));
        let order = if node.kind().map_or(false, FieldType::length_first) {
            "length before tag"
        } else {
            "tag before length"
        };
        PackError::UnknownTag {
            tag: tag.to_string(),
            path: parent_path.clone(),
            causes: vec![
                format!("{} decoded the tag bytes incorrectly", codec_name),
                format!(
                    "no sibling of '{}' declares tag '{}'; the definition may be missing it",
                    self.def.path(field),
                    tag
                ),
                "the previous field's length codec has the wrong width and shifted the offset"
                    .to_string(),
                format!(
                    "the wire uses a different tag/length order than the definition ({}); \
                     LEN_TAG_VAL bytes F0F3 F0F1 F0 read as TAG_LEN_VAL give tag 3 and length 1",
                    order
                ),
                format!("the bytes belong to a different context than '{}'", parent_path),
            ],
        }
    }

    /// Decode the field of value node `id` at `pos`; returns the offset after it.
    fn field(&mut self, id: ValueId, mut pos: usize, limit: usize) -> Result<usize> {
        let def = self.def;
        let bytes = self.bytes;
        let window = &bytes[..limit];
        let mut field = self.tree.node(id).field();
        let mut kind = kind_of(def, field)?;
        let mut path = self.tree.path(id);

        let mut declared = None;
        let mut length_bytes = None;
        let mut tag_bytes = None;
        let mut tag_width = 0;

        if kind.length_first() {
            let (n, w) = self.read_length(field, pos, limit, &path)?;
            length_bytes = Some(window[pos..pos + w].to_vec());
            declared = Some(n);
            pos += w;
        }
        if kind.is_tagged() {
            let (codec, width) = def.resolved_tag_codec(field).ok_or_else(|| {
                PackError::definition(
                    &path,
                    ValidationRule::MissingTag,
                    "parent has no children tag codec and width",
                )
            })?;
            let tag = codec
                .unpack(window, pos, width)
                .map_err(|e| PackError::field(&path, e))?;
            if def.node(field).tag() != Some(&tag) {
                let sibling = def.node(field).parent().and_then(|p| {
                    def.node(p)
                        .children()
                        .iter()
                        .copied()
                        .find(|c| def.node(*c).tag() == Some(&tag))
                });
                let sibling = match sibling {
                    Some(s) => s,
                    None => return Err(self.unknown_tag(id, field, &tag, codec.name())),
                };
                let sibling_kind = kind_of(def, sibling)?;
                if !sibling_kind.is_tagged() || sibling_kind.length_first() != kind.length_first() {
                    return Err(PackError::data(
                        &path,
                        format!(
                            "tag '{}' belongs to {} '{}' whose header order differs from {}",
                            tag,
                            sibling_kind,
                            def.path(sibling),
                            kind
                        ),
                    ));
                }
                log::warn!(
                    "{}: tag '{}' re-resolved to sibling '{}'",
                    path,
                    tag,
                    def.path(sibling)
                );
                self.tree.repoint(def, id, sibling);
                field = sibling;
                kind = sibling_kind;
                path = self.tree.path(id);
            }
            tag_bytes = Some(window[pos..pos + width].to_vec());
            tag_width = width;
            pos += width;
        }
        if kind.has_length() && !kind.length_first() {
            let (n, w) = self.read_length(field, pos, limit, &path)?;
            length_bytes = Some(window[pos..pos + w].to_vec());
            declared = Some(n);
            pos += w;
        }

        let node = def.node(field);
        let body_len = match declared {
            Some(n) if kind == FieldType::LenTagVal => n.checked_sub(tag_width).ok_or_else(|| {
                PackError::data(
                    &path,
                    format!("length {} is smaller than the {} byte tag it covers", n, tag_width),
                )
            })?,
            Some(n) => n,
            None => node.len().unwrap_or(limit.saturating_sub(pos)),
        };
        if node.exact_len() && node.len() != Some(body_len) {
            return Err(PackError::data(
                &path,
                format!(
                    "length {} read from the wire differs from exact length {}",
                    body_len,
                    node.len().unwrap_or_default()
                ),
            ));
        }
        if let Some(max) = node.max_len() {
            if body_len > max {
                return Err(PackError::data(
                    &path,
                    format!("length {} exceeds max_len {}", body_len, max),
                ));
            }
        }
        let available = limit.saturating_sub(pos);
        if kind != FieldType::BitSet && body_len > available {
            return Err(PackError::data(
                &path,
                format!("needs {} byte(s) at offset {}, only {} left", body_len, pos, available),
            ));
        }
        if let (Some(t), Some(l)) = (&tag_bytes, &length_bytes) {
            log::trace!("{} tag {} length {}", path, to_hex(t), to_hex(l));
        }
        {
            let value = self.tree.node_mut(id);
            value.tag_bytes = tag_bytes;
            value.length_bytes = length_bytes;
        }

        if node.is_leaf() {
            let codec = node.body_codec().ok_or_else(|| {
                PackError::definition(&path, ValidationRule::MissingBodyCodec, "leaf field has no body codec")
            })?;
            let value = codec
                .unpack(window, pos, body_len)
                .map_err(|e| PackError::field(&path, e))?;
            log::debug!("unpack {} = {}", path, value);
            let slot = self.tree.node_mut(id);
            slot.body_bytes = Some(window[pos..pos + body_len].to_vec());
            slot.value = Some(value);
            return Ok(pos + body_len);
        }

        if kind == FieldType::BitSet {
            return self.bitmap_children(id, field, pos, limit, &path);
        }
        let end = pos + body_len;
        let reached = self.children(id, field, pos, end, &path)?;
        if reached != end {
            return Err(PackError::data(
                &path,
                format!("children consumed {} byte(s) of {}", reached - pos, body_len),
            ));
        }
        log::debug!("unpack {} ({} byte(s))", path, body_len);
        Ok(end)
    }

    fn bitmap_children(
        &mut self,
        id: ValueId,
        field: FieldId,
        pos: usize,
        limit: usize,
        path: &str,
    ) -> Result<usize> {
        let def = self.def;
        let bytes = self.bytes;
        let node = def.node(field);
        let codec = node.bitmap_codec().ok_or_else(|| {
            PackError::definition(path, ValidationRule::BitmapDefinition, "BIT_SET has no bitmap codec")
        })?;
        let (present, used) = codec
            .unpack(&bytes[..limit], pos)
            .map_err(|e| PackError::field(path, e))?;
        log::trace!("{} bitmap {:?}", path, present);
        let mut pos = pos + used;
        for n in &present {
            let child = node
                .children()
                .iter()
                .copied()
                .find(|c| def.node(*c).field_num() == Some(*n))
                .ok_or_else(|| {
                    PackError::data(path, format!("bitmap flags field {} which is not defined", n))
                })?;
            let value = self.tree.append_child(def, id, child);
            pos = self.field(value, pos, limit)?;
        }
        self.tree.node_mut(id).bitmap = Some(present);
        Ok(pos)
    }

    /// First positional `VAL` leaf among `parent`'s children whose value has no body bytes.
    fn unfilled_val(&self, parent: ValueId, declared: &[FieldId]) -> Option<FieldId> {
        declared.iter().copied().find(|c| {
            let node = self.def.node(*c);
            node.kind() == Some(FieldType::Val)
                && node.is_leaf()
                && !self
                    .tree
                    .children_for(parent, *c)
                    .iter()
                    .any(|v| self.tree.node(*v).is_filled())
        })
    }

    /// Decode children of the composite `id` from `start` up to `end`.
    fn children(&mut self, id: ValueId, field: FieldId, start: usize, end: usize, path: &str) -> Result<usize> {
        let def = self.def;
        let declared = def.node(field).children();
        let last = match declared.len().checked_sub(1) {
            Some(l) => l,
            None => return Ok(start),
        };
        let mut next = 0;
        let mut pos = start;
        while pos < end {
            let mut candidate = declared[next.min(last)];
            let cnode = def.node(candidate);
            if cnode.kind() == Some(FieldType::Val) && cnode.is_leaf() {
                if let Some(open) = self.unfilled_val(id, declared) {
                    candidate = open;
                }
            }
            let value = self.tree.append_child(def, id, candidate);
            let after = self.field(value, pos, end)?;
            if after == pos {
                return Err(PackError::data(
                    path,
                    format!(
                        "'{}' consumed no bytes at offset {}",
                        self.tree.path(value),
                        pos
                    ),
                ));
            }
            let decoded = self.tree.node(value).field();
            next = declared.iter().position(|c| *c == decoded).map_or(next, |i| i + 1);
            pos = after;
        }
        Ok(pos)
    }
}
