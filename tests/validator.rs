//! Structural validation: every rule violated in isolation is reported once, with its rule and
//! the path of the offending field; well-formed layouts pass with no violations.

use isopack::layout::build_layout;
use isopack::packer::{BitmapCodec, BitmapLayout, BodyCodec, LengthCodec, TagCodec};
use isopack::validator::{self, ValidationRule, Violation};
use isopack::{FieldBuilder, FieldDef, FieldType};

fn only_violation(def: &FieldDef) -> Violation {
    let violations = validator::check(def);
    assert_eq!(violations.len(), 1, "{:#?}", violations);
    violations.into_iter().next().expect("one violation")
}

fn expect_rule(def: &FieldDef, rule: ValidationRule, path: &str) {
    let v = only_violation(def);
    assert_eq!(v.rule, rule, "{}", v.message);
    assert_eq!(v.path, path);

    let err = validator::validate(def).unwrap_err();
    assert!(err.is_definition_error());
    assert_eq!(err.rule(), Some(rule));
    assert_eq!(err.path(), Some(path));
    assert!(err.to_string().contains("definition dump"));
}

fn msg() -> FieldBuilder {
    FieldBuilder::new(FieldType::Msg).name("m")
}

#[test]
fn missing_type() {
    let def = build_layout(r#"MSG "m" { "x" { len = 1; body = hex; } }"#).expect("parse");
    expect_rule(&def, ValidationRule::MissingType, "m.x");
}

#[test]
fn missing_identifier() {
    let def = msg()
        .create_child(FieldType::LenVal)
        .length_codec(LengthCodec::Ascii(2))
        .unwrap()
        .body_codec(BodyCodec::Ascii)
        .build();
    expect_rule(&def, ValidationRule::MissingIdentifier, "m.LEN_VAL");
}

#[test]
fn unnamed_val_is_allowed() {
    let def = msg()
        .create_child(FieldType::Val)
        .len(1)
        .body_codec(BodyCodec::Hex)
        .build();
    assert!(validator::check(&def).is_empty());
}

#[test]
fn missing_body_codec() {
    let def = msg().create_child(FieldType::Val).name("v").len(1).build();
    expect_rule(&def, ValidationRule::MissingBodyCodec, "m.v");
}

#[test]
fn body_codec_on_composite() {
    let def = msg()
        .body_codec(BodyCodec::Hex)
        .create_child(FieldType::Val)
        .name("v")
        .len(1)
        .body_codec(BodyCodec::Hex)
        .build();
    expect_rule(&def, ValidationRule::UnexpectedBodyCodec, "m");
}

#[test]
fn tagged_field_without_tag() {
    let def = msg()
        .children_tag_codec(TagCodec::Hex, 1)
        .create_child(FieldType::TagVal)
        .name("t")
        .len(1)
        .body_codec(BodyCodec::Hex)
        .build();
    expect_rule(&def, ValidationRule::MissingTag, "m.t");
}

#[test]
fn tagged_field_without_parent_tag_codec() {
    let def = msg()
        .create_child(FieldType::TagVal)
        .name("t")
        .tag(1u64)
        .unwrap()
        .len(1)
        .body_codec(BodyCodec::Hex)
        .build();
    expect_rule(&def, ValidationRule::MissingTag, "m.t(1)");
}

#[test]
fn tag_does_not_fit_codec() {
    let def = msg()
        .children_tag_codec(TagCodec::Hex, 1)
        .create_child(FieldType::TagVal)
        .name("t")
        .tag(300u64)
        .unwrap()
        .len(1)
        .body_codec(BodyCodec::Hex)
        .build();
    expect_rule(&def, ValidationRule::TagRoundTrip, "m.t(300)");
}

#[test]
fn length_type_without_length_codec() {
    let def = msg()
        .create_child(FieldType::LenVal)
        .name("l")
        .body_codec(BodyCodec::Ascii)
        .build();
    expect_rule(&def, ValidationRule::LengthCodec, "m.l");
}

#[test]
fn fixed_length_type_without_len() {
    let def = msg()
        .children_tag_codec(TagCodec::Hex, 1)
        .create_child(FieldType::TagVal)
        .name("t")
        .tag(1u64)
        .unwrap()
        .body_codec(BodyCodec::Hex)
        .build();
    expect_rule(&def, ValidationRule::MissingFixedLength, "m.t(1)");

    let def = msg()
        .create_child(FieldType::Val)
        .name("a")
        .body_codec(BodyCodec::Hex)
        .clone_to_sibling()
        .name("b")
        .len(1)
        .build();
    expect_rule(&def, ValidationRule::MissingFixedLength, "m.a");
}

#[test]
fn wire_length_type_with_plain_len() {
    let def = msg()
        .create_child(FieldType::LenVal)
        .name("l")
        .length_codec(LengthCodec::Ascii(2))
        .unwrap()
        .len(4)
        .body_codec(BodyCodec::Ascii)
        .build();
    expect_rule(&def, ValidationRule::UnexpectedFixedLength, "m.l");
}

#[test]
fn msg_with_len() {
    let def = msg()
        .len(1)
        .create_child(FieldType::Val)
        .name("v")
        .len(1)
        .body_codec(BodyCodec::Hex)
        .build();
    expect_rule(&def, ValidationRule::UnexpectedFixedLength, "m");
}

#[test]
fn children_lengths_must_add_up() {
    let def = FieldBuilder::new(FieldType::Val)
        .name("p")
        .len(5)
        .create_child(FieldType::Val)
        .name("a")
        .len(2)
        .body_codec(BodyCodec::Hex)
        .clone_to_sibling()
        .name("b")
        .build();
    expect_rule(&def, ValidationRule::ChildrenLengthSum, "p");
}

#[test]
fn bitmap_without_codec() {
    let def = FieldBuilder::new(FieldType::BitSet)
        .name("b")
        .create_child(FieldType::Val)
        .name("two")
        .field_num(2)
        .unwrap()
        .len(1)
        .body_codec(BodyCodec::Hex)
        .build();
    expect_rule(&def, ValidationRule::BitmapDefinition, "b");
}

#[test]
fn bitmap_without_children() {
    let def = msg()
        .create_child(FieldType::BitSet)
        .name("b")
        .bitmap_codec(BitmapCodec::Ifb(BitmapLayout::Fixed(8)))
        .build();
    expect_rule(&def, ValidationRule::BitmapDefinition, "m.b");
}

#[test]
fn bitmap_children_need_distinct_supported_numbers() {
    let base = || {
        FieldBuilder::new(FieldType::BitSet)
            .name("b")
            .bitmap_codec(BitmapCodec::Ifb(BitmapLayout::Fixed(1)))
            .create_child(FieldType::Val)
            .name("x")
            .len(1)
            .body_codec(BodyCodec::Hex)
    };
    let def = base().build();
    expect_rule(&def, ValidationRule::BitmapChild, "b.x");

    let def = base().field_num(9).unwrap().build();
    expect_rule(&def, ValidationRule::BitmapChild, "b.x(9)");

    let def = base()
        .field_num(2)
        .unwrap()
        .clone_to_sibling()
        .name("y")
        .field_num(2)
        .unwrap()
        .build();
    expect_rule(&def, ValidationRule::BitmapChild, "b.y(2)");
}

#[test]
fn bitmap_codec_on_other_type() {
    let def = msg()
        .bitmap_codec(BitmapCodec::Ifb(BitmapLayout::Fixed(1)))
        .create_child(FieldType::Val)
        .name("v")
        .len(1)
        .body_codec(BodyCodec::Hex)
        .build();
    expect_rule(&def, ValidationRule::UnexpectedBitmapCodec, "m");
}

#[test]
fn len_tag_val_needs_parent_length_codec() {
    let def = msg()
        .children_tag_codec(TagCodec::EbcdicDecimal, 2)
        .create_child(FieldType::LenTagVal)
        .name("x")
        .tag(1u64)
        .unwrap()
        .length_codec(LengthCodec::EbcdicDecimal(2))
        .unwrap()
        .body_codec(BodyCodec::Ebcdic)
        .build();
    expect_rule(&def, ValidationRule::LenTagValParent, "m.x(1)");
}

#[test]
fn first_violation_in_document_order() {
    let def = msg()
        .create_child(FieldType::Val)
        .name("first")
        .len(1)
        .create_sibling(FieldType::LenVal)
        .name("second")
        .body_codec(BodyCodec::Hex)
        .build();
    assert_eq!(validator::check(&def).len(), 2);
    let err = validator::validate(&def).unwrap_err();
    assert_eq!(err.path(), Some("m.first"));
}

#[test]
fn well_formed_layout_passes() {
    let def = build_layout(
        r#"
        MSG "iso" {
            VAL "mti" { len = 2; body = bcd_right_f; }
            BIT_SET "fields" {
                bitmap = ifb_extended(1);
                LEN_VAL "pan" { field_num = 2; length = bcd(1); body = bcd_right_f; masker = pan; }
                VAL "amount" { field_num = 4; len = 6; body = bcd_left_zero; }
                LEN_VAL "private" {
                    field_num = 48;
                    length = ascii(3);
                    children_tag = ascii_text(2);
                    children_length = ascii(2);
                    TAG_LEN_VAL "ref" { tag = "RF"; body = ascii; }
                    LEN_TAG_VAL "note" { tag = "NT"; body = ascii; stringer = hex; }
                }
            }
        }
        "#,
    )
    .expect("parse");
    assert_eq!(validator::check(&def), Vec::new());
}
