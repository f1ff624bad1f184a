//! Addressing shared by the definition tree and the value tree.
//!
//! Both trees implement [`Tree`], so path rendering and child lookup are written once. A path
//! segment is the node name followed by its tag (or field number) in parentheses, e.g.
//! `msg.bitmap.PAN(2)`. A node without name or identifier is shown by its type.

use crate::field::FieldType;
use crate::value::Tag;

/// Read-only view of an arena tree.
pub trait Tree {
    type Id: Copy + Eq;

    fn root_id(&self) -> Self::Id;
    fn parent_of(&self, id: Self::Id) -> Option<Self::Id>;
    fn children_of(&self, id: Self::Id) -> &[Self::Id];
    fn name_of(&self, id: Self::Id) -> Option<&str>;
    fn tag_of(&self, id: Self::Id) -> Option<&Tag>;
    fn field_num_of(&self, id: Self::Id) -> Option<u32>;
    fn kind_of(&self, id: Self::Id) -> Option<FieldType>;
}

/// One step of an addressing path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Name(String),
    FieldNum(u32),
    Tag(Tag),
}

impl From<&str> for Step {
    fn from(s: &str) -> Self {
        Step::Name(s.to_string())
    }
}

impl From<u32> for Step {
    fn from(n: u32) -> Self {
        Step::FieldNum(n)
    }
}

impl From<Tag> for Step {
    fn from(t: Tag) -> Self {
        Step::Tag(t)
    }
}

/// Path segment for a single node.
pub fn segment<T: Tree + ?Sized>(tree: &T, id: T::Id) -> String {
    let ident = match (tree.tag_of(id), tree.field_num_of(id)) {
        (Some(tag), _) => Some(tag.to_string()),
        (None, Some(n)) => Some(n.to_string()),
        (None, None) => None,
    };
    match (tree.name_of(id), ident) {
        (Some(name), Some(ident)) => format!("{}({})", name, ident),
        (None, Some(ident)) => ident,
        (Some(name), None) => name.to_string(),
        (None, None) => tree
            .kind_of(id)
            .map(|k| k.name().to_string())
            .unwrap_or_else(|| "?".to_string()),
    }
}

/// Dotted path from the root to `id`.
pub fn path<T: Tree + ?Sized>(tree: &T, id: T::Id) -> String {
    let mut segments = vec![segment(tree, id)];
    let mut cur = id;
    while let Some(p) = tree.parent_of(cur) {
        segments.push(segment(tree, p));
        cur = p;
    }
    segments.reverse();
    segments.join(".")
}

/// Whether `id` is addressed by `step`.
pub fn matches<T: Tree + ?Sized>(tree: &T, id: T::Id, step: &Step) -> bool {
    match step {
        Step::Name(name) => tree.name_of(id) == Some(name.as_str()),
        Step::FieldNum(n) => tree.field_num_of(id) == Some(*n),
        Step::Tag(tag) => tree.tag_of(id) == Some(tag),
    }
}

/// First child of `parent` addressed by `step`.
pub fn find_child<T: Tree + ?Sized>(tree: &T, parent: T::Id, step: &Step) -> Option<T::Id> {
    tree.children_of(parent)
        .iter()
        .copied()
        .find(|c| matches(tree, *c, step))
}

/// Sibling of `id` (excluding `id` itself) addressed by `step`.
pub fn find_sibling<T: Tree + ?Sized>(tree: &T, id: T::Id, step: &Step) -> Option<T::Id> {
    let parent = tree.parent_of(id)?;
    tree.children_of(parent)
        .iter()
        .copied()
        .find(|c| *c != id && matches(tree, *c, step))
}

/// Root of the tree containing `id`.
pub fn find_root<T: Tree + ?Sized>(tree: &T, id: T::Id) -> T::Id {
    let mut cur = id;
    while let Some(p) = tree.parent_of(cur) {
        cur = p;
    }
    cur
}

/// Resolve `steps` starting at the root; the first step must address the root itself.
pub fn resolve<T: Tree + ?Sized>(tree: &T, steps: &[Step]) -> Option<T::Id> {
    let (first, rest) = steps.split_first()?;
    let root = tree.root_id();
    if !matches(tree, root, first) {
        return None;
    }
    rest.iter()
        .try_fold(root, |cur, step| find_child(tree, cur, step))
}
