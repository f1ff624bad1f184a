//! Field definition tree.
//!
//! A [`FieldDef`] is an arena of [`FieldNode`]s addressed by [`FieldId`]. Children are kept in
//! declaration order; each node holds the id of its parent. The tree is produced by the
//! [`FieldBuilder`](crate::builder::FieldBuilder) (or the [layout](crate::layout) parser),
//! checked once by the [validator](crate::validator), and then only read. Because it is never
//! mutated after that, one definition can back any number of messages on any number of threads.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::dump::{Masker, Stringer};
use crate::navigate::{self, Tree};
use crate::packer::{BitmapCodec, BodyCodec, LengthCodec, TagCodec};
use crate::value::Tag;

/// Element ordering policy of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Tag, then length, then body.
    TagLenVal,
    /// Length (covering tag and body), then tag, then body.
    LenTagVal,
    /// Tag, then a fixed-length body.
    TagVal,
    /// Length, then body.
    LenVal,
    /// Presence bitmap, then the flagged children.
    BitSet,
    /// Bare body of fixed length, or a run of contiguous children.
    Val,
    /// Grouping container without any header; consumes the rest of its input.
    Msg,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::TagLenVal,
        FieldType::LenTagVal,
        FieldType::TagVal,
        FieldType::LenVal,
        FieldType::BitSet,
        FieldType::Val,
        FieldType::Msg,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldType::TagLenVal => "TAG_LEN_VAL",
            FieldType::LenTagVal => "LEN_TAG_VAL",
            FieldType::TagVal => "TAG_VAL",
            FieldType::LenVal => "LEN_VAL",
            FieldType::BitSet => "BIT_SET",
            FieldType::Val => "VAL",
            FieldType::Msg => "MSG",
        }
    }

    /// Carries a tag written with the parent's tag codec.
    pub fn is_tagged(self) -> bool {
        matches!(
            self,
            FieldType::TagLenVal | FieldType::LenTagVal | FieldType::TagVal
        )
    }

    /// Carries a length prefix.
    pub fn has_length(self) -> bool {
        matches!(
            self,
            FieldType::TagLenVal | FieldType::LenTagVal | FieldType::LenVal
        )
    }

    /// The length prefix comes before anything else.
    pub fn length_first(self) -> bool {
        matches!(self, FieldType::LenTagVal | FieldType::LenVal)
    }

    /// Body size comes from the definition, not from the wire.
    pub fn is_fixed_length(self) -> bool {
        matches!(self, FieldType::TagVal | FieldType::Val)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown field type '{}'", s))
    }
}

/// Index of a node in its [`FieldDef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) usize);

impl FieldId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One field definition.
#[derive(Debug, Clone, Default)]
pub struct FieldNode {
    pub(crate) kind: Option<FieldType>,
    pub(crate) name: Option<String>,
    pub(crate) tag: Option<Tag>,
    pub(crate) field_num: Option<u32>,
    pub(crate) parent: Option<FieldId>,
    pub(crate) children: Vec<FieldId>,
    pub(crate) body: Option<BodyCodec>,
    pub(crate) len: Option<usize>,
    pub(crate) max_len: Option<usize>,
    pub(crate) exact_len: bool,
    pub(crate) length_codec: Option<LengthCodec>,
    pub(crate) children_length_codec: Option<LengthCodec>,
    pub(crate) children_tag_codec: Option<TagCodec>,
    pub(crate) children_tag_len: Option<usize>,
    pub(crate) bitmap_codec: Option<BitmapCodec>,
    pub(crate) masker: Option<Arc<dyn Masker>>,
    pub(crate) stringer: Option<Arc<dyn Stringer>>,
}

impl FieldNode {
    pub(crate) fn typed(kind: FieldType) -> Self {
        FieldNode {
            kind: Some(kind),
            ..FieldNode::default()
        }
    }

    /// Copy of the encoding configuration: type, codecs, length constraints, masking and text
    /// conversion. Name, tag, field number, parent and children are left empty.
    pub(crate) fn config_clone(&self) -> Self {
        FieldNode {
            kind: self.kind,
            body: self.body.clone(),
            len: self.len,
            max_len: self.max_len,
            exact_len: self.exact_len,
            length_codec: self.length_codec.clone(),
            children_length_codec: self.children_length_codec.clone(),
            children_tag_codec: self.children_tag_codec,
            children_tag_len: self.children_tag_len,
            bitmap_codec: self.bitmap_codec,
            masker: self.masker.clone(),
            stringer: self.stringer.clone(),
            ..FieldNode::default()
        }
    }

    pub fn kind(&self) -> Option<FieldType> {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn field_num(&self) -> Option<u32> {
        self.field_num
    }

    pub fn parent(&self) -> Option<FieldId> {
        self.parent
    }

    pub fn children(&self) -> &[FieldId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn body_codec(&self) -> Option<&BodyCodec> {
        self.body.as_ref()
    }

    pub fn len(&self) -> Option<usize> {
        self.len
    }

    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    pub fn exact_len(&self) -> bool {
        self.exact_len
    }

    pub fn length_codec(&self) -> Option<&LengthCodec> {
        self.length_codec.as_ref()
    }

    pub fn children_length_codec(&self) -> Option<&LengthCodec> {
        self.children_length_codec.as_ref()
    }

    pub fn children_tag_codec(&self) -> Option<TagCodec> {
        self.children_tag_codec
    }

    pub fn children_tag_len(&self) -> Option<usize> {
        self.children_tag_len
    }

    pub fn bitmap_codec(&self) -> Option<BitmapCodec> {
        self.bitmap_codec
    }

    pub fn masker(&self) -> Option<&Arc<dyn Masker>> {
        self.masker.as_ref()
    }

    pub fn stringer(&self) -> Option<&Arc<dyn Stringer>> {
        self.stringer.as_ref()
    }
}

/// A complete field definition tree.
#[derive(Debug, Clone)]
pub struct FieldDef {
    nodes: Vec<FieldNode>,
    root: FieldId,
}

impl FieldDef {
    pub(crate) fn with_root(node: FieldNode) -> Self {
        FieldDef {
            nodes: vec![node],
            root: FieldId(0),
        }
    }

    pub fn root(&self) -> FieldId {
        self.root
    }

    /// Node by id. Ids are only meaningful for the definition that issued them.
    pub fn node(&self, id: FieldId) -> &FieldNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: FieldId) -> &mut FieldNode {
        &mut self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add `node` as the last child of `parent` (or as a detached node when `parent` is `None`).
    pub(crate) fn push(&mut self, mut node: FieldNode, parent: Option<FieldId>) -> FieldId {
        let id = FieldId(self.nodes.len());
        node.parent = parent;
        self.nodes.push(node);
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }

    pub(crate) fn set_root(&mut self, root: FieldId) {
        self.nodes[root.0].parent = None;
        self.root = root;
    }

    /// Copy the subtree rooted at `other_id` of `other` under `parent`; returns the new id.
    pub(crate) fn graft(&mut self, parent: FieldId, other: &FieldDef, other_id: FieldId) -> FieldId {
        let mut node = other.node(other_id).clone();
        let children = std::mem::take(&mut node.children);
        let id = self.push(node, Some(parent));
        for child in children {
            self.graft(id, other, child);
        }
        id
    }

    /// All node ids reachable from the root, depth first, in declaration order.
    pub fn ids(&self) -> Vec<FieldId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    /// Length codec for `id`: its own, or the one its parent applies to all children.
    pub fn resolved_length_codec(&self, id: FieldId) -> Option<&LengthCodec> {
        let node = self.node(id);
        node.length_codec.as_ref().or_else(|| {
            node.parent
                .and_then(|p| self.node(p).children_length_codec.as_ref())
        })
    }

    /// Tag codec and width the parent of `id` applies to its children.
    pub fn resolved_tag_codec(&self, id: FieldId) -> Option<(TagCodec, usize)> {
        let parent = self.node(self.node(id).parent?);
        Some((parent.children_tag_codec?, parent.children_tag_len?))
    }

    /// Dotted path from the root, e.g. `msg.bitmap.PAN(2)`.
    pub fn path(&self, id: FieldId) -> String {
        navigate::path(self, id)
    }
}

impl Tree for FieldDef {
    type Id = FieldId;

    fn root_id(&self) -> FieldId {
        self.root
    }

    fn parent_of(&self, id: FieldId) -> Option<FieldId> {
        self.node(id).parent
    }

    fn children_of(&self, id: FieldId) -> &[FieldId] {
        &self.node(id).children
    }

    fn name_of(&self, id: FieldId) -> Option<&str> {
        self.node(id).name()
    }

    fn tag_of(&self, id: FieldId) -> Option<&Tag> {
        self.node(id).tag()
    }

    fn field_num_of(&self, id: FieldId) -> Option<u32> {
        self.node(id).field_num
    }

    fn kind_of(&self, id: FieldId) -> Option<FieldType> {
        self.node(id).kind
    }
}
