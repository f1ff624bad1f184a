//! Value tree and the [`Message`] cursor used to fill, read, pack and unpack it.
//!
//! A [`ValueTree`] mirrors a [`FieldDef`]: each [`ValueNode`] points at the definition node it
//! was created for and copies its name, tag and field number. Value nodes are created lazily,
//! either by cursor navigation ([`Message::jump_to_child`], [`Message::jump_to_sibling`]) or by
//! unpacking bytes.
//!
//! Navigation keeps siblings in definition order: a value created for the third declared child
//! is inserted before an existing value of the fourth, whatever the order of the calls.
//! Repeated values of one definition ([`Message::clone_sibling`]) stay in insertion order.
//!
//! Positional `VAL` fields are matched during unpack by looking for the first sibling whose value
//! has no body bytes yet. An empty value is therefore indistinguishable from an unset one.

use std::collections::BTreeSet;

use crate::codec::{self, Codec};
use crate::dump::Visualizer;
use crate::error::{PackError, Result};
use crate::field::{FieldDef, FieldId, FieldType};
use crate::navigate::{self, Step, Tree};
use crate::value::{Tag, Value};

/// Index of a node in its [`ValueTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) usize);

/// Per-message data for one field.
#[derive(Debug, Clone)]
pub struct ValueNode {
    pub(crate) field: FieldId,
    pub(crate) name: Option<String>,
    pub(crate) tag: Option<Tag>,
    pub(crate) field_num: Option<u32>,
    pub(crate) tag_bytes: Option<Vec<u8>>,
    pub(crate) length_bytes: Option<Vec<u8>>,
    pub(crate) body_bytes: Option<Vec<u8>>,
    pub(crate) value: Option<Value>,
    pub(crate) bitmap: Option<BTreeSet<u32>>,
    pub(crate) parent: Option<ValueId>,
    pub(crate) children: Vec<ValueId>,
}

impl ValueNode {
    fn for_field(def: &FieldDef, field: FieldId, parent: Option<ValueId>) -> Self {
        let f = def.node(field);
        ValueNode {
            field,
            name: f.name().map(str::to_string),
            tag: f.tag().cloned(),
            field_num: f.field_num(),
            tag_bytes: None,
            length_bytes: None,
            body_bytes: None,
            value: None,
            bitmap: None,
            parent,
            children: Vec::new(),
        }
    }

    /// Definition node this value belongs to.
    pub fn field(&self) -> FieldId {
        self.field
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

    pub fn tag_bytes(&self) -> Option<&[u8]> {
        self.tag_bytes.as_deref()
    }

    pub fn length_bytes(&self) -> Option<&[u8]> {
        self.length_bytes.as_deref()
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body_bytes.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Present field numbers of a `BIT_SET` after unpacking.
    pub fn bitmap(&self) -> Option<&BTreeSet<u32>> {
        self.bitmap.as_ref()
    }

    pub fn parent(&self) -> Option<ValueId> {
        self.parent
    }

    pub fn children(&self) -> &[ValueId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Has body bytes, either set or unpacked.
    pub fn is_filled(&self) -> bool {
        self.body_bytes.is_some()
    }
}

/// Arena of [`ValueNode`]s for one message.
#[derive(Debug, Clone)]
pub struct ValueTree {
    nodes: Vec<ValueNode>,
    root: ValueId,
}

impl ValueTree {
    /// Empty tree holding only the value for the definition root.
    pub fn new(def: &FieldDef) -> Self {
        ValueTree {
            nodes: vec![ValueNode::for_field(def, def.root(), None)],
            root: ValueId(0),
        }
    }

    pub fn root(&self) -> ValueId {
        self.root
    }

    pub fn node(&self, id: ValueId) -> &ValueNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: ValueId) -> &mut ValueNode {
        &mut self.nodes[id.0]
    }

    pub fn path(&self, id: ValueId) -> String {
        navigate::path(self, id)
    }

    /// Value children of `parent` created for definition `field`, in order.
    pub fn children_for(&self, parent: ValueId, field: FieldId) -> Vec<ValueId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .filter(|c| self.node(*c).field == field)
            .collect()
    }

    /// Append a value for `field` as the last child of `parent` (wire order during unpack).
    pub(crate) fn append_child(&mut self, def: &FieldDef, parent: ValueId, field: FieldId) -> ValueId {
        let id = ValueId(self.nodes.len());
        self.nodes.push(ValueNode::for_field(def, field, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Insert a value for `field` under `parent`, after every existing child whose definition
    /// is declared no later than `field`.
    pub(crate) fn insert_child(&mut self, def: &FieldDef, parent: ValueId, field: FieldId) -> ValueId {
        let parent_field = self.node(parent).field;
        let declared = def.node(parent_field).children();
        let rank = |f: FieldId| declared.iter().position(|d| *d == f).unwrap_or(usize::MAX);
        let new_rank = rank(field);
        let pos = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| rank(self.nodes[c.0].field) > new_rank)
            .unwrap_or(self.nodes[parent.0].children.len());
        let id = ValueId(self.nodes.len());
        self.nodes.push(ValueNode::for_field(def, field, Some(parent)));
        self.nodes[parent.0].children.insert(pos, id);
        id
    }

    /// Insert a value for the same definition as `after`, right behind it.
    pub(crate) fn insert_after(&mut self, def: &FieldDef, after: ValueId) -> Option<ValueId> {
        let parent = self.node(after).parent?;
        let field = self.node(after).field;
        let pos = self.nodes[parent.0].children.iter().position(|c| *c == after)?;
        let id = ValueId(self.nodes.len());
        self.nodes.push(ValueNode::for_field(def, field, Some(parent)));
        self.nodes[parent.0].children.insert(pos + 1, id);
        Some(id)
    }

    /// Make `id` the value of a different definition (sibling re-resolution during unpack).
    pub(crate) fn repoint(&mut self, def: &FieldDef, id: ValueId, field: FieldId) {
        let f = def.node(field);
        let node = &mut self.nodes[id.0];
        node.field = field;
        node.name = f.name().map(str::to_string);
        node.tag = f.tag().cloned();
        node.field_num = f.field_num();
    }
}

impl Tree for ValueTree {
    type Id = ValueId;

    fn root_id(&self) -> ValueId {
        self.root
    }

    fn parent_of(&self, id: ValueId) -> Option<ValueId> {
        self.node(id).parent
    }

    fn children_of(&self, id: ValueId) -> &[ValueId] {
        &self.node(id).children
    }

    fn name_of(&self, id: ValueId) -> Option<&str> {
        self.node(id).name()
    }

    fn tag_of(&self, id: ValueId) -> Option<&Tag> {
        self.node(id).tag()
    }

    fn field_num_of(&self, id: ValueId) -> Option<u32> {
        self.node(id).field_num
    }

    fn kind_of(&self, _id: ValueId) -> Option<FieldType> {
        None
    }
}

/// One message: a definition, its value tree and a cursor into the tree.
#[derive(Debug, Clone)]
pub struct Message<'d> {
    def: &'d FieldDef,
    tree: ValueTree,
    current: ValueId,
}

impl<'d> Message<'d> {
    /// Empty message; the cursor is on the root value.
    pub fn new(def: &'d FieldDef) -> Self {
        let tree = ValueTree::new(def);
        let current = tree.root();
        Message { def, tree, current }
    }

    /// Unpack a whole buffer.
    pub fn unpack(def: &'d FieldDef, bytes: &[u8]) -> Result<Self> {
        let tree = Codec::new(def).decode(bytes)?;
        let current = tree.root();
        Ok(Message { def, tree, current })
    }

    /// Unpack starting at `offset`; returns the message and the number of bytes consumed.
    pub fn unpack_at(def: &'d FieldDef, bytes: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (tree, used) = Codec::new(def).decode_at(bytes, offset)?;
        let current = tree.root();
        Ok((Message { def, tree, current }, used))
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        Codec::new(self.def).encode(&self.tree)
    }

    pub fn definition(&self) -> &'d FieldDef {
        self.def
    }

    pub fn tree(&self) -> &ValueTree {
        &self.tree
    }

    pub fn into_tree(self) -> ValueTree {
        self.tree
    }

    pub fn current(&self) -> ValueId {
        self.current
    }

    pub fn current_node(&self) -> &ValueNode {
        self.tree.node(self.current)
    }

    /// Value dump of the whole message.
    pub fn dump(&self, mask_private: bool) -> String {
        Visualizer::default().dump_value(self.def, &self.tree, self.tree.root(), mask_private)
    }

    fn path(&self) -> String {
        self.tree.path(self.current)
    }

    fn with_dumps(&self, err: PackError, what: &str) -> PackError {
        let vis = Visualizer::default();
        err.with_dumps(
            what,
            vis.dump_value(self.def, &self.tree, self.tree.root(), true),
            vis.dump_definition(self.def, self.def.root()),
        )
    }

    fn missing(&self, what: String) -> PackError {
        self.with_dumps(PackError::navigation(self.path(), what), "navigation failed")
    }

    // Navigation

    /// Move to the value of the child definition addressed by `step`, creating it on first visit.
    pub fn jump_to(&mut self, step: &Step) -> Result<&mut Self> {
        let field = self.tree.node(self.current).field;
        let child_field = navigate::find_child(self.def, field, step)
            .ok_or_else(|| self.missing(format!("no child definition {:?}", step)))?;
        self.current = match self.tree.children_for(self.current, child_field).first() {
            Some(existing) => *existing,
            None => self.tree.insert_child(self.def, self.current, child_field),
        };
        Ok(self)
    }

    pub fn jump_to_child(&mut self, name: &str) -> Result<&mut Self> {
        self.jump_to(&Step::from(name))
    }

    /// Move to the child flagged by bit `n` of the current `BIT_SET`.
    pub fn jump_to_field_num(&mut self, n: u32) -> Result<&mut Self> {
        self.jump_to(&Step::FieldNum(n))
    }

    /// Move to the value of a sibling definition, creating it in definition order if needed.
    pub fn jump_to_sibling(&mut self, name: &str) -> Result<&mut Self> {
        let parent = self
            .current_node()
            .parent
            .ok_or_else(|| self.missing("the root has no siblings".to_string()))?;
        self.current = parent;
        self.jump_to_child(name)
    }

    pub fn jump_to_parent(&mut self) -> Result<&mut Self> {
        self.current = self
            .current_node()
            .parent
            .ok_or_else(|| self.missing("the root has no parent".to_string()))?;
        Ok(self)
    }

    pub fn jump_to_root(&mut self) -> &mut Self {
        self.current = self.tree.root();
        self
    }

    /// Navigate from the root; the first step addresses the root itself. On failure the cursor
    /// is left where it was.
    pub fn jump_path(&mut self, steps: &[Step]) -> Result<&mut Self> {
        let saved = self.current;
        let (first, rest) = steps
            .split_first()
            .ok_or_else(|| self.missing("empty path".to_string()))?;
        if !navigate::matches(&self.tree, self.tree.root(), first) {
            return Err(self.missing(format!("root is not {:?}", first)));
        }
        self.current = self.tree.root();
        for step in rest {
            let moved = self.jump_to(step).map(|_| ());
            if let Err(e) = moved {
                self.current = saved;
                return Err(e);
            }
        }
        Ok(self)
    }

    pub fn jump_absolute(&mut self, names: &[&str]) -> Result<&mut Self> {
        let steps: Vec<Step> = names.iter().map(|n| Step::from(*n)).collect();
        self.jump_path(&steps)
    }

    /// Add another value for the current definition right after the current one (a repeated
    /// field) and move to it.
    pub fn clone_sibling(&mut self) -> Result<&mut Self> {
        self.current = self
            .tree
            .insert_after(self.def, self.current)
            .ok_or_else(|| self.missing("the root cannot be repeated".to_string()))?;
        Ok(self)
    }

    // Values

    /// Set the current leaf's value; computes its body, tag and length bytes.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        let field = self.current_node().field;
        let path = self.path();
        let bytes = codec::field_bytes(self.def, field, &value, &path)
            .map_err(|e| self.with_dumps(e, "cannot set value"))?;
        let node = self.tree.node_mut(self.current);
        node.tag_bytes = bytes.tag;
        node.length_bytes = bytes.length;
        node.body_bytes = Some(bytes.body);
        node.value = Some(value);
        log::trace!("set {}", path);
        Ok(self)
    }

    /// Forget the current leaf's value; it is left out when packing.
    pub fn clear_value(&mut self) -> &mut Self {
        let node = self.tree.node_mut(self.current);
        node.tag_bytes = None;
        node.length_bytes = None;
        node.body_bytes = None;
        node.value = None;
        self
    }

    /// Decoded value of the current node.
    pub fn value(&self) -> Option<&Value> {
        self.current_node().value()
    }

    /// Set a leaf addressed from the root; the cursor is restored afterwards.
    pub fn set_value_at(&mut self, value: impl Into<Value>, names: &[&str]) -> Result<&mut Self> {
        let saved = self.current;
        let result = self
            .jump_absolute(names)
            .and_then(|m| m.set_value(value).map(|_| ()));
        self.current = saved;
        result.map(|_| self)
    }

    /// Value of an existing leaf addressed from the root. Does not create nodes.
    pub fn get_value_at(&self, names: &[&str]) -> Option<&Value> {
        let steps: Vec<Step> = names.iter().map(|n| Step::from(*n)).collect();
        let id = navigate::resolve(&self.tree, &steps)?;
        self.tree.node(id).value()
    }

    /// Like [`get_value_at`](Self::get_value_at) with mixed name and field-number steps.
    pub fn get_value_path(&self, steps: &[Step]) -> Option<&Value> {
        let id = navigate::resolve(&self.tree, steps)?;
        self.tree.node(id).value()
    }
}
