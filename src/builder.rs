//! Cursor-based construction of a [`FieldDef`].
//!
//! The builder owns the tree under construction and a cursor to the "current" node. Creating a
//! child or sibling moves the cursor to the new node; every `define`-style setter applies to the
//! node under the cursor. Setters that can contradict the rest of the tree return a `Result`.
//!
//! ```
//! use isopack::builder::FieldBuilder;
//! use isopack::field::FieldType;
//! use isopack::packer::{BodyCodec, LengthCodec, TagCodec};
//!
//! let def = FieldBuilder::new(FieldType::Msg)
//!     .name("msg")
//!     .children_tag_codec(TagCodec::EbcdicDecimal, 2)
//!     .children_length_codec(LengthCodec::EbcdicDecimal(2))?
//!     .create_child(FieldType::TagLenVal)
//!     .name("tag-1")
//!     .tag(1u64)?
//!     .body_codec(BodyCodec::Ebcdic)
//!     .clone_to_sibling()
//!     .name("tag-3")
//!     .tag(3u64)?
//!     .into_validated()?;
//! assert_eq!(def.node_count(), 3);
//! # Ok::<(), isopack::PackError>(())
//! ```

use std::sync::Arc;

use crate::dump::{Masker, Stringer, Visualizer};
use crate::error::{PackError, Result};
use crate::field::{FieldDef, FieldId, FieldNode, FieldType};
use crate::navigate::{self, Step};
use crate::packer::{BitmapCodec, BodyCodec, LengthCodec, TagCodec};
use crate::validator::{self, ValidationRule};
use crate::value::Tag;

#[derive(Debug, Clone)]
pub struct FieldBuilder {
    def: FieldDef,
    current: FieldId,
}

impl FieldBuilder {
    /// Start a new tree whose root has type `kind`.
    pub fn new(kind: FieldType) -> Self {
        Self::with_root(FieldNode::typed(kind))
    }

    pub(crate) fn with_root(node: FieldNode) -> Self {
        let def = FieldDef::with_root(node);
        let current = def.root();
        FieldBuilder { def, current }
    }

    /// Continue editing an existing tree; the cursor starts at its root.
    pub fn from_def(def: FieldDef) -> Self {
        let current = def.root();
        FieldBuilder { def, current }
    }

    pub fn current(&self) -> FieldId {
        self.current
    }

    pub fn current_node(&self) -> &FieldNode {
        self.def.node(self.current)
    }

    pub fn definition(&self) -> &FieldDef {
        &self.def
    }

    fn path(&self) -> String {
        self.def.path(self.current)
    }

    fn node_mut(&mut self) -> &mut FieldNode {
        self.def.node_mut(self.current)
    }

    fn parent(&self) -> Option<FieldId> {
        self.current_node().parent()
    }

    // Creation

    /// Add a child of type `kind` as the last child of the current node and move to it.
    pub fn create_child(self, kind: FieldType) -> Self {
        self.create_child_node(FieldNode::typed(kind))
    }

    pub(crate) fn create_child_node(mut self, node: FieldNode) -> Self {
        self.current = self.def.push(node, Some(self.current));
        log::debug!("created field {}", self.path());
        self
    }

    /// Parent of the current node, wrapping the root in an unnamed `MSG` when needed.
    fn parent_or_wrap(&mut self) -> FieldId {
        if let Some(p) = self.parent() {
            return p;
        }
        let old_root = self.def.root();
        let wrapper = self.def.push(FieldNode::typed(FieldType::Msg), None);
        self.def.node_mut(old_root).parent = Some(wrapper);
        self.def.node_mut(wrapper).children.push(old_root);
        self.def.set_root(wrapper);
        wrapper
    }

    /// Add a new sibling of type `kind` after the current node's siblings and move to it.
    pub fn create_sibling(mut self, kind: FieldType) -> Self {
        let parent = self.parent_or_wrap();
        self.current = parent;
        self.create_child(kind)
    }

    /// Add a sibling that copies the current node's encoding configuration (type, codecs,
    /// lengths, masker, stringer) but not its name, tag, field number or children.
    pub fn clone_to_sibling(mut self) -> Self {
        let node = self.current_node().config_clone();
        let parent = self.parent_or_wrap();
        self.current = parent;
        self.create_child_node(node)
    }

    /// Copy `sub` (its whole tree) under the current node and move to the copy's root.
    ///
    /// Fails when `sub`'s root is tagged but the current node has no children tag codec and
    /// width, or when both the current node's children length codec and `sub`'s own length codec
    /// are set.
    pub fn attach(mut self, sub: &FieldDef) -> Result<Self> {
        let child = sub.node(sub.root());
        let parent = self.current_node();
        if child.kind().map_or(false, FieldType::is_tagged)
            && (parent.children_tag_codec().is_none() || parent.children_tag_len().is_none())
        {
            return Err(PackError::definition(
                self.path(),
                ValidationRule::MissingTag,
                "cannot attach a tagged field: no children tag codec and width on the parent",
            ));
        }
        if parent.children_length_codec().is_some() && child.length_codec().is_some() {
            return Err(PackError::definition(
                self.path(),
                ValidationRule::LengthCodec,
                "cannot attach: both the parent's children length codec and the child's own \
                 length codec are set",
            ));
        }
        self.current = self.def.graft(self.current, sub, sub.root());
        Ok(self)
    }

    // Properties

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.node_mut().name = Some(name.into());
        self
    }

    /// Tag written before the current field. Only tagged types accept one.
    pub fn tag(mut self, tag: impl Into<Tag>) -> Result<Self> {
        let kind = self.current_node().kind();
        if !kind.map_or(false, FieldType::is_tagged) {
            return Err(PackError::definition(
                self.path(),
                ValidationRule::MissingTag,
                format!(
                    "type {} does not carry a tag",
                    kind.map_or("<none>", FieldType::name)
                ),
            ));
        }
        self.node_mut().tag = Some(tag.into());
        Ok(self)
    }

    /// Position of the current field in its parent's presence bitmap. The parent must be a
    /// `BIT_SET`; siblings are kept sorted by field number.
    pub fn field_num(mut self, n: u32) -> Result<Self> {
        let parent = self.parent().ok_or_else(|| {
            PackError::definition(
                self.path(),
                ValidationRule::BitmapChild,
                "the root cannot have a field number",
            )
        })?;
        if self.def.node(parent).kind() != Some(FieldType::BitSet) {
            return Err(PackError::definition(
                self.path(),
                ValidationRule::BitmapChild,
                "field numbers are only allowed under a BIT_SET",
            ));
        }
        self.node_mut().field_num = Some(n);
        let def = &self.def;
        let mut children = def.node(parent).children().to_vec();
        children.sort_by_key(|c| def.node(*c).field_num().unwrap_or(u32::MAX));
        self.def.node_mut(parent).children = children;
        Ok(self)
    }

    pub fn body_codec(mut self, codec: BodyCodec) -> Self {
        self.node_mut().body = Some(codec);
        self
    }

    /// Length codec of the current field itself.
    pub fn length_codec(mut self, codec: LengthCodec) -> Result<Self> {
        if let Some(p) = self.parent() {
            if self.def.node(p).children_length_codec().is_some() {
                return Err(PackError::definition(
                    self.path(),
                    ValidationRule::LengthCodec,
                    "the parent already defines a children length codec",
                ));
            }
        }
        self.node_mut().length_codec = Some(codec);
        Ok(self)
    }

    /// Length codec applied to every child of the current field.
    pub fn children_length_codec(mut self, codec: LengthCodec) -> Result<Self> {
        let def = &self.def;
        if let Some(child) = self
            .current_node()
            .children()
            .iter()
            .find(|c| def.node(**c).length_codec().is_some())
        {
            return Err(PackError::definition(
                def.path(*child),
                ValidationRule::LengthCodec,
                "child already defines its own length codec",
            ));
        }
        self.node_mut().children_length_codec = Some(codec);
        Ok(self)
    }

    /// Tag codec and tag width applied to every child of the current field.
    pub fn children_tag_codec(mut self, codec: TagCodec, width: usize) -> Self {
        let node = self.node_mut();
        node.children_tag_codec = Some(codec);
        node.children_tag_len = Some(width);
        self
    }

    pub fn bitmap_codec(mut self, codec: BitmapCodec) -> Self {
        self.node_mut().bitmap_codec = Some(codec);
        self
    }

    /// Fixed body length in bytes (or total children length for a `VAL` composite).
    pub fn len(mut self, len: usize) -> Self {
        self.node_mut().len = Some(len);
        self
    }

    pub fn max_len(mut self, max_len: usize) -> Self {
        self.node_mut().max_len = Some(max_len);
        self
    }

    /// Require the packed body to be exactly `len` bytes.
    pub fn exact_len(mut self, len: usize) -> Self {
        let node = self.node_mut();
        node.len = Some(len);
        node.exact_len = true;
        self
    }

    pub fn masker(mut self, masker: Arc<dyn Masker>) -> Self {
        self.node_mut().masker = Some(masker);
        self
    }

    pub fn stringer(mut self, stringer: Arc<dyn Stringer>) -> Self {
        self.node_mut().stringer = Some(stringer);
        self
    }

    pub(crate) fn set_kind(mut self, kind: Option<FieldType>) -> Self {
        self.node_mut().kind = kind;
        self
    }

    // Cursor movement

    pub fn jump_to_parent(mut self) -> Result<Self> {
        self.current = self
            .parent()
            .ok_or_else(|| PackError::navigation(self.path(), "the root has no parent"))?;
        Ok(self)
    }

    pub fn jump_to_root(mut self) -> Self {
        self.current = self.def.root();
        self
    }

    pub fn jump_to_child(mut self, name: &str) -> Result<Self> {
        self.current = navigate::find_child(&self.def, self.current, &Step::from(name))
            .ok_or_else(|| {
                PackError::navigation(self.path(), format!("no child named '{}'", name))
            })?;
        Ok(self)
    }

    pub fn jump_to_sibling(mut self, name: &str) -> Result<Self> {
        self.current = navigate::find_sibling(&self.def, self.current, &Step::from(name))
            .ok_or_else(|| {
                PackError::navigation(self.path(), format!("no sibling named '{}'", name))
            })?;
        Ok(self)
    }

    // Output

    /// Definition dump of the whole tree, also logged at info level.
    pub fn dump(&self) -> String {
        let text = Visualizer::default().dump_definition(&self.def, self.def.root());
        log::info!("field definition:\n{}", text);
        text
    }

    /// Run the structural validator on the tree built so far.
    pub fn validate(&self) -> Result<()> {
        validator::validate(&self.def)
    }

    /// Finish without validation.
    pub fn build(self) -> FieldDef {
        self.def
    }

    /// Finish after a successful validation.
    pub fn into_validated(self) -> Result<FieldDef> {
        self.validate()?;
        Ok(self.def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::{BcdPadding, BitmapLayout};

    #[test]
    fn clone_to_sibling_copies_configuration_only() {
        let b = FieldBuilder::new(FieldType::Msg)
            .children_tag_codec(TagCodec::Hex, 1)
            .create_child(FieldType::TagLenVal)
            .name("a")
            .tag(1u64)
            .unwrap()
            .length_codec(LengthCodec::Binary(1))
            .unwrap()
            .body_codec(BodyCodec::Ascii)
            .max_len(10)
            .clone_to_sibling();
        let node = b.current_node();
        assert_eq!(node.kind(), Some(FieldType::TagLenVal));
        assert_eq!(node.name(), None);
        assert_eq!(node.tag(), None);
        assert_eq!(node.length_codec(), Some(&LengthCodec::Binary(1)));
        assert_eq!(node.body_codec(), Some(&BodyCodec::Ascii));
        assert_eq!(node.max_len(), Some(10));
        let def = b.build();
        assert_eq!(def.node(def.root()).children().len(), 2);
    }

    #[test]
    fn sibling_of_root_wraps_in_msg() {
        let def = FieldBuilder::new(FieldType::Val)
            .name("first")
            .len(2)
            .body_codec(BodyCodec::Bcd(BcdPadding::NoPadding))
            .create_sibling(FieldType::Val)
            .name("second")
            .build();
        let root = def.node(def.root());
        assert_eq!(root.kind(), Some(FieldType::Msg));
        assert_eq!(root.children().len(), 2);
        assert_eq!(def.path(root.children()[1]), "MSG.second");
    }

    #[test]
    fn tag_requires_tagged_type() {
        let err = FieldBuilder::new(FieldType::Msg)
            .create_child(FieldType::LenVal)
            .tag(1u64)
            .unwrap_err();
        assert!(err.is_definition_error());
    }

    #[test]
    fn field_num_sorts_siblings() {
        let def = FieldBuilder::new(FieldType::BitSet)
            .bitmap_codec(BitmapCodec::Ifb(BitmapLayout::Fixed(1)))
            .create_child(FieldType::LenVal)
            .name("three")
            .field_num(3)
            .unwrap()
            .clone_to_sibling()
            .name("one")
            .field_num(1)
            .unwrap()
            .build();
        let names: Vec<_> = def
            .node(def.root())
            .children()
            .iter()
            .map(|c| def.node(*c).name().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["one", "three"]);
    }

    #[test]
    fn field_num_requires_bitset_parent() {
        let err = FieldBuilder::new(FieldType::Msg)
            .create_child(FieldType::LenVal)
            .field_num(2)
            .unwrap_err();
        assert_eq!(err.rule(), Some(ValidationRule::BitmapChild));
    }

    #[test]
    fn length_codec_conflicts() {
        let err = FieldBuilder::new(FieldType::Msg)
            .children_length_codec(LengthCodec::Ascii(2))
            .unwrap()
            .create_child(FieldType::LenVal)
            .length_codec(LengthCodec::Ascii(3))
            .unwrap_err();
        assert_eq!(err.rule(), Some(ValidationRule::LengthCodec));

        let err = FieldBuilder::new(FieldType::Msg)
            .create_child(FieldType::LenVal)
            .length_codec(LengthCodec::Ascii(3))
            .unwrap()
            .jump_to_parent()
            .unwrap()
            .children_length_codec(LengthCodec::Ascii(2))
            .unwrap_err();
        assert_eq!(err.path(), Some("MSG.LEN_VAL"));
    }

    #[test]
    fn attach_checks_parent() {
        let tagged = FieldBuilder::new(FieldType::TagVal)
            .name("t")
            .tag(5u64)
            .unwrap()
            .len(1)
            .body_codec(BodyCodec::Literal)
            .build();
        let err = FieldBuilder::new(FieldType::Msg).attach(&tagged).unwrap_err();
        assert_eq!(err.rule(), Some(ValidationRule::MissingTag));

        let b = FieldBuilder::new(FieldType::Msg)
            .name("m")
            .children_tag_codec(TagCodec::Hex, 1)
            .attach(&tagged)
            .unwrap();
        assert_eq!(b.current_node().name(), Some("t"));
        assert_eq!(b.definition().path(b.current()), "m.t(5)");
    }

    #[test]
    fn jumps() {
        let b = FieldBuilder::new(FieldType::Msg)
            .name("root")
            .create_child(FieldType::Val)
            .name("a")
            .create_sibling(FieldType::Val)
            .name("b")
            .jump_to_sibling("a")
            .unwrap();
        assert_eq!(b.current_node().name(), Some("a"));
        let b = b.jump_to_root().jump_to_child("b").unwrap();
        assert_eq!(b.current_node().name(), Some("b"));
        assert!(b.clone().jump_to_child("zzz").is_err());
        assert!(b.jump_to_root().jump_to_parent().is_err());
    }
}
