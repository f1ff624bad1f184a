//! Structural validator for field definition trees.
//!
//! Checks a finished [`FieldDef`] before any data flows through it. [`check`] returns every
//! violation in document order (depth first, declaration order); [`validate`] fails on the
//! first one and wraps it with a dump of the whole tree.
//!
//! ## Rules
//!
//! | Rule | Violation |
//! |------|-----------|
//! | `missing-type` | node has no type |
//! | `missing-identifier` | neither name, tag nor field number (`VAL` exempt) |
//! | `missing-body-codec` | leaf other than `BIT_SET`/`MSG` without body codec |
//! | `unexpected-body-codec` | node with children carries a body codec |
//! | `missing-tag` | tagged type without tag, or parent without children tag codec/width |
//! | `tag-round-trip` | tag does not survive pack then unpack with the parent's tag codec |
//! | `length-codec` | length type without a resolvable length codec, or with both its own and the parent's |
//! | `missing-fixed-length` | `TAG_VAL`, or a `VAL` that is not the last child, without `len` |
//! | `unexpected-fixed-length` | `MSG`, or a length type without `exact_len`, with `len` |
//! | `children-length-sum` | every child has `len` but they do not add up to the parent's `len` |
//! | `bitmap-definition` | `BIT_SET` without bitmap codec or without children |
//! | `bitmap-child` | child of a `BIT_SET` without a usable, unique field number |
//! | `unexpected-bitmap-codec` | non-`BIT_SET` node carries a bitmap codec |
//! | `len-tag-val-parent` | `LEN_TAG_VAL` whose parent has no children length codec |

use std::collections::BTreeSet;
use std::fmt;

use crate::dump::Visualizer;
use crate::error::{PackError, Result};
use crate::field::{FieldDef, FieldId, FieldType};

/// Identifies which rule a definition error violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationRule {
    MissingType,
    MissingIdentifier,
    MissingBodyCodec,
    UnexpectedBodyCodec,
    MissingTag,
    TagRoundTrip,
    LengthCodec,
    MissingFixedLength,
    UnexpectedFixedLength,
    ChildrenLengthSum,
    BitmapDefinition,
    BitmapChild,
    UnexpectedBitmapCodec,
    LenTagValParent,
}

impl ValidationRule {
    pub fn id(self) -> &'static str {
        match self {
            ValidationRule::MissingType => "missing-type",
            ValidationRule::MissingIdentifier => "missing-identifier",
            ValidationRule::MissingBodyCodec => "missing-body-codec",
            ValidationRule::UnexpectedBodyCodec => "unexpected-body-codec",
            ValidationRule::MissingTag => "missing-tag",
            ValidationRule::TagRoundTrip => "tag-round-trip",
            ValidationRule::LengthCodec => "length-codec",
            ValidationRule::MissingFixedLength => "missing-fixed-length",
            ValidationRule::UnexpectedFixedLength => "unexpected-fixed-length",
            ValidationRule::ChildrenLengthSum => "children-length-sum",
            ValidationRule::BitmapDefinition => "bitmap-definition",
            ValidationRule::BitmapChild => "bitmap-child",
            ValidationRule::UnexpectedBitmapCodec => "unexpected-bitmap-codec",
            ValidationRule::LenTagValParent => "len-tag-val-parent",
        }
    }
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A single violation with the path of the offending node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub rule: ValidationRule,
    pub message: String,
}

impl Violation {
    pub fn into_error(self) -> PackError {
        PackError::definition(self.path, self.rule, self.message)
    }
}

struct Checker<'d> {
    def: &'d FieldDef,
    out: Vec<Violation>,
}

impl<'d> Checker<'d> {
    fn report(&mut self, id: FieldId, rule: ValidationRule, message: impl Into<String>) {
        self.out.push(Violation {
            path: self.def.path(id),
            rule,
            message: message.into(),
        });
    }

    fn is_last_child(&self, id: FieldId) -> bool {
        match self.def.node(id).parent() {
            Some(p) => self.def.node(p).children().last() == Some(&id),
            None => true,
        }
    }

    fn check_node(&mut self, id: FieldId) {
        let def = self.def;
        let node = def.node(id);
        let kind = match node.kind() {
            Some(k) => k,
            None => {
                self.report(id, ValidationRule::MissingType, "field type is not defined");
                return;
            }
        };

        if kind != FieldType::Val
            && node.name().is_none()
            && node.tag().is_none()
            && node.field_num().is_none()
        {
            self.report(
                id,
                ValidationRule::MissingIdentifier,
                format!("{} field needs a name, tag or field number", kind),
            );
        }

        if node.is_leaf() {
            if !matches!(kind, FieldType::BitSet | FieldType::Msg) && node.body_codec().is_none() {
                self.report(
                    id,
                    ValidationRule::MissingBodyCodec,
                    "leaf field has no body codec",
                );
            }
        } else if node.body_codec().is_some() {
            self.report(
                id,
                ValidationRule::UnexpectedBodyCodec,
                "field with children must not have a body codec",
            );
        }

        if kind.is_tagged() {
            self.check_tag(id);
        }

        if kind.has_length() {
            let own = node.length_codec().is_some();
            let inherited = node
                .parent()
                .map_or(false, |p| def.node(p).children_length_codec().is_some());
            if !own && !inherited {
                self.report(
                    id,
                    ValidationRule::LengthCodec,
                    format!(
                        "{} needs a length codec on itself or a children length codec on its parent",
                        kind
                    ),
                );
            } else if own && inherited {
                self.report(
                    id,
                    ValidationRule::LengthCodec,
                    "both the field's own length codec and the parent's children length codec are set",
                );
            }
            if node.len().is_some() && !node.exact_len() {
                self.report(
                    id,
                    ValidationRule::UnexpectedFixedLength,
                    format!("{} reads its length from the wire; use exact_len instead of len", kind),
                );
            }
        }

        match kind {
            FieldType::TagVal if node.len().is_none() => self.report(
                id,
                ValidationRule::MissingFixedLength,
                "TAG_VAL needs a fixed length",
            ),
            FieldType::Val if node.len().is_none() && !self.is_last_child(id) => self.report(
                id,
                ValidationRule::MissingFixedLength,
                "VAL needs a fixed length unless it is the last child",
            ),
            FieldType::Msg if node.len().is_some() => self.report(
                id,
                ValidationRule::UnexpectedFixedLength,
                "MSG consumes the rest of its input and cannot have a fixed length",
            ),
            _ => {}
        }

        if let Some(total) = node.len() {
            let lens: Option<Vec<usize>> =
                node.children().iter().map(|c| def.node(*c).len()).collect();
            if let Some(lens) = lens.filter(|l| !l.is_empty()) {
                let sum: usize = lens.iter().sum();
                if sum != total {
                    self.report(
                        id,
                        ValidationRule::ChildrenLengthSum,
                        format!("children lengths add up to {} but len is {}", sum, total),
                    );
                }
            }
        }

        if kind == FieldType::BitSet {
            self.check_bitmap(id);
        } else if node.bitmap_codec().is_some() {
            self.report(
                id,
                ValidationRule::UnexpectedBitmapCodec,
                format!("{} must not have a bitmap codec", kind),
            );
        }

        if kind == FieldType::LenTagVal {
            let parent_ok = node
                .parent()
                .map_or(false, |p| def.node(p).children_length_codec().is_some());
            if !parent_ok {
                self.report(
                    id,
                    ValidationRule::LenTagValParent,
                    "LEN_TAG_VAL length covers the tag, so the parent must define the children length codec",
                );
            }
        }
    }

    fn check_tag(&mut self, id: FieldId) {
        let def = self.def;
        let node = def.node(id);
        let tag = match node.tag() {
            Some(t) => t,
            None => {
                self.report(id, ValidationRule::MissingTag, "tagged field has no tag");
                return;
            }
        };
        let (codec, width) = match def.resolved_tag_codec(id) {
            Some(cw) => cw,
            None => {
                self.report(
                    id,
                    ValidationRule::MissingTag,
                    "parent has no children tag codec and width",
                );
                return;
            }
        };
        let round_trip = codec
            .pack(tag, width)
            .and_then(|bytes| codec.unpack(&bytes, 0, width));
        match round_trip {
            Ok(back) if &back == tag => {}
            Ok(back) => self.report(
                id,
                ValidationRule::TagRoundTrip,
                format!("tag '{}' unpacks as '{}' with {}", tag, back, codec.name()),
            ),
            Err(e) => self.report(id, ValidationRule::TagRoundTrip, e.to_string()),
        }
    }

    fn check_bitmap(&mut self, id: FieldId) {
        let def = self.def;
        let node = def.node(id);
        let codec = node.bitmap_codec();
        if codec.is_none() {
            self.report(id, ValidationRule::BitmapDefinition, "BIT_SET has no bitmap codec");
        }
        if node.is_leaf() {
            self.report(id, ValidationRule::BitmapDefinition, "BIT_SET has no children");
        }
        let mut seen = BTreeSet::new();
        for child in node.children() {
            match def.node(*child).field_num() {
                None => self.report(
                    *child,
                    ValidationRule::BitmapChild,
                    "child of a BIT_SET needs a field number",
                ),
                Some(n) if !seen.insert(n) => self.report(
                    *child,
                    ValidationRule::BitmapChild,
                    format!("field number {} is used twice", n),
                ),
                Some(n) => {
                    if let Some(codec) = codec.filter(|c| !c.supports(n)) {
                        self.report(
                            *child,
                            ValidationRule::BitmapChild,
                            format!("field number {} is not supported by {}", n, codec.name()),
                        );
                    }
                }
            }
        }
    }
}

/// Every violation in document order.
pub fn check(def: &FieldDef) -> Vec<Violation> {
    let mut checker = Checker {
        def,
        out: Vec::new(),
    };
    for id in def.ids() {
        checker.check_node(id);
    }
    checker.out
}

/// Fail on the first violation, wrapped with the definition dump.
pub fn validate(def: &FieldDef) -> Result<()> {
    match check(def).into_iter().next() {
        None => Ok(()),
        Some(v) => {
            log::debug!("structure validation failed: {} at {}", v.rule, v.path);
            Err(v.into_error().with_dumps(
                "structure validation failed",
                String::new(),
                Visualizer::default().dump_definition(def, def.root()),
            ))
        }
    }
}
