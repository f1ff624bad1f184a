//! End-to-end behaviour of the pack/unpack engine: fixed BCD fields, positional `VAL` siblings,
//! length-before-tag versus tag-before-length, and sibling re-resolution by tag.

use isopack::packer::hex::{from_hex, to_hex};
use isopack::packer::{BcdPadding, BodyCodec, LengthCodec, TagCodec};
use isopack::{FieldBuilder, FieldDef, FieldType, Message, PackError, Value};

fn text(s: &str) -> Value {
    Value::from(s)
}

// Fixed BCD, left-zero padding

fn bcd_left_zero() -> FieldDef {
    FieldBuilder::new(FieldType::Val)
        .name("amount")
        .len(2)
        .body_codec(BodyCodec::Bcd(BcdPadding::LeftZero))
        .into_validated()
        .expect("valid definition")
}

#[test]
fn fixed_bcd_left_zero_packs_padded() {
    let def = bcd_left_zero();
    let mut msg = Message::new(&def);
    msg.set_value("123").expect("set");
    assert_eq!(to_hex(&msg.pack().expect("pack")), "0123");
}

#[test]
fn fixed_bcd_left_zero_unpacks_stripped() {
    let def = bcd_left_zero();
    let msg = Message::unpack(&def, &from_hex("0456").unwrap()).expect("unpack");
    assert_eq!(msg.value(), Some(&text("456")));
}

#[test]
fn fixed_bcd_rejects_wrong_length() {
    let def = bcd_left_zero();
    let mut msg = Message::new(&def);
    let err = msg.set_value("12345").unwrap_err();
    assert!(!err.is_definition_error());
    assert!(err.root_cause().to_string().contains("declared length 2"));
}

// Positional VAL siblings

fn positional() -> FieldDef {
    FieldBuilder::new(FieldType::Val)
        .name("parent")
        .len(6)
        .create_child(FieldType::Val)
        .name("Child1")
        .len(2)
        .body_codec(BodyCodec::Bcd(BcdPadding::NoPadding))
        .clone_to_sibling()
        .name("Child2")
        .clone_to_sibling()
        .name("Child3")
        .into_validated()
        .expect("valid definition")
}

#[test]
fn positional_siblings_pack_in_definition_order() {
    let def = positional();
    let mut msg = Message::new(&def);
    msg.jump_to_child("Child1").unwrap().set_value("1111").unwrap();
    msg.jump_to_sibling("Child3").unwrap().set_value("3333").unwrap();
    msg.jump_to_sibling("Child2").unwrap().set_value("2222").unwrap();
    let bytes = msg.pack().expect("pack");
    assert_eq!(to_hex(&bytes), "111122223333");

    let back = Message::unpack(&def, &bytes).expect("unpack");
    assert_eq!(back.get_value_at(&["parent", "Child1"]), Some(&text("1111")));
    assert_eq!(back.get_value_at(&["parent", "Child2"]), Some(&text("2222")));
    assert_eq!(back.get_value_at(&["parent", "Child3"]), Some(&text("3333")));
}

#[test]
fn positional_parent_length_must_match() {
    let def = positional();
    let mut msg = Message::new(&def);
    msg.set_value_at("1111", &["parent", "Child1"]).unwrap();
    let err = msg.pack().unwrap_err();
    assert!(err.root_cause().to_string().contains("declared length 6"));

    assert!(Message::unpack(&def, &from_hex("11112222").unwrap()).is_err());
}

// Length before tag versus tag before length

fn container(kind: FieldType) -> FieldDef {
    FieldBuilder::new(FieldType::Msg)
        .name("msg")
        .children_tag_codec(TagCodec::EbcdicDecimal, 2)
        .children_length_codec(LengthCodec::EbcdicDecimal(2))
        .unwrap()
        .create_child(kind)
        .name("tag-1")
        .tag(1u64)
        .unwrap()
        .body_codec(BodyCodec::Ebcdic)
        .clone_to_sibling()
        .name("tag-2")
        .tag(2u64)
        .unwrap()
        .clone_to_sibling()
        .name("tag-3")
        .tag(3u64)
        .unwrap()
        .into_validated()
        .expect("valid definition")
}

fn pack_one(def: &FieldDef, value: &str) -> Vec<u8> {
    let mut msg = Message::new(def);
    msg.set_value_at(value, &["msg", "tag-1"]).expect("set");
    msg.pack().expect("pack")
}

#[test]
fn len_tag_val_puts_length_first() {
    let def = container(FieldType::LenTagVal);
    let bytes = pack_one(&def, "11");
    // length 4 covers the 2 byte tag and the 2 byte body
    assert_eq!(to_hex(&bytes), "F0F4F0F1F1F1");
    let back = Message::unpack(&def, &bytes).expect("unpack");
    assert_eq!(back.get_value_at(&["msg", "tag-1"]), Some(&text("11")));
}

#[test]
fn tag_len_val_puts_tag_first() {
    let def = container(FieldType::TagLenVal);
    let bytes = pack_one(&def, "11");
    assert_eq!(to_hex(&bytes), "F0F1F0F2F1F1");
    let back = Message::unpack(&def, &bytes).expect("unpack");
    assert_eq!(back.get_value_at(&["msg", "tag-1"]), Some(&text("11")));
}

#[test]
fn both_orders_decode_to_same_value() {
    let ltv = container(FieldType::LenTagVal);
    let tlv = container(FieldType::TagLenVal);
    let a = Message::unpack(&ltv, &pack_one(&ltv, "hello")).unwrap();
    let b = Message::unpack(&tlv, &pack_one(&tlv, "hello")).unwrap();
    assert_eq!(
        a.get_value_at(&["msg", "tag-1"]),
        b.get_value_at(&["msg", "tag-1"])
    );
}

// Sibling re-resolution on tag mismatch

#[test]
fn mismatched_tag_resolves_to_sibling() {
    let def = container(FieldType::TagLenVal);
    // tag 3 arrives where tag 1 is expected, then tag 1
    let bytes = from_hex("F0F3F0F2F3F3 F0F1F0F1F1").unwrap();
    let msg = Message::unpack(&def, &bytes).expect("unpack");
    assert_eq!(msg.get_value_at(&["msg", "tag-3"]), Some(&text("33")));
    assert_eq!(msg.get_value_at(&["msg", "tag-1"]), Some(&text("1")));
    assert_eq!(msg.get_value_at(&["msg", "tag-2"]), None);
}

#[test]
fn mismatched_tag_resolves_to_sibling_after_length() {
    let def = container(FieldType::LenTagVal);
    // length, then tag 3 where tag 1 is expected, then tag 1
    let bytes = from_hex("F0F3F0F3F3 F0F3F0F1F1").unwrap();
    let msg = Message::unpack(&def, &bytes).expect("unpack");
    assert_eq!(msg.get_value_at(&["msg", "tag-3"]), Some(&text("3")));
    assert_eq!(msg.get_value_at(&["msg", "tag-1"]), Some(&text("1")));
    assert_eq!(msg.get_value_at(&["msg", "tag-2"]), None);
    assert_eq!(to_hex(&msg.pack().unwrap()), "F0F3F0F1F1F0F3F0F3F3");
}

#[test]
fn unknown_tag_after_length_is_rejected() {
    let def = container(FieldType::LenTagVal);
    let bytes = from_hex("F0F3F0F1F1 F0F3F0F9F9").unwrap();
    let err = Message::unpack(&def, &bytes).unwrap_err();
    assert!(!err.is_definition_error());
    match err.root_cause() {
        PackError::UnknownTag { tag, path, causes } => {
            assert_eq!(tag, "9");
            assert_eq!(path, "msg");
            assert_eq!(causes.len(), 5);
        }
        other => panic!("expected UnknownTag, got {:?}", other),
    }
}

#[test]
fn unknown_tag_enumerates_causes() {
    let def = container(FieldType::TagLenVal);
    let bytes = from_hex("F0F1F0F1F1 F0F9F0F1F9").unwrap();
    let err = Message::unpack(&def, &bytes).unwrap_err();
    match err.root_cause() {
        PackError::UnknownTag { tag, path, causes } => {
            assert_eq!(tag, "9");
            assert_eq!(path, "msg");
            assert_eq!(causes.len(), 5);
        }
        other => panic!("expected UnknownTag, got {:?}", other),
    }
    let text = err.to_string();
    assert!(text.contains("Possible causes"));
    assert!(text.contains("value dump"));
    assert!(text.contains("definition dump"));
}

// Round trip and repeats

#[test]
fn round_trip_is_byte_exact() {
    let def = container(FieldType::TagLenVal);
    let mut msg = Message::new(&def);
    msg.jump_to_child("tag-2").unwrap().set_value("two").unwrap();
    msg.jump_to_sibling("tag-1").unwrap().set_value("one").unwrap();
    msg.jump_to_sibling("tag-3").unwrap().set_value("three").unwrap();
    let bytes = msg.pack().unwrap();

    let back = Message::unpack(&def, &bytes).unwrap();
    for (name, value) in [("tag-1", "one"), ("tag-2", "two"), ("tag-3", "three")] {
        assert_eq!(back.get_value_at(&["msg", name]), Some(&text(value)));
    }
    assert_eq!(back.pack().unwrap(), bytes);
}

#[test]
fn repeated_last_child_round_trips() {
    let def = container(FieldType::TagLenVal);
    let mut msg = Message::new(&def);
    msg.jump_to_child("tag-3").unwrap().set_value("a").unwrap();
    msg.clone_sibling().unwrap().set_value("b").unwrap();
    let bytes = msg.pack().unwrap();
    assert_eq!(to_hex(&bytes), "F0F3F0F181F0F3F0F182");

    let back = Message::unpack(&def, &bytes).unwrap();
    assert_eq!(back.pack().unwrap(), bytes);
    assert!(back.dump(false).contains("val=\"b\""));
}

#[test]
fn cleared_value_is_omitted() {
    let def = container(FieldType::TagLenVal);
    let mut msg = Message::new(&def);
    msg.jump_to_child("tag-1").unwrap().set_value("x").unwrap();
    msg.jump_to_sibling("tag-2").unwrap().set_value("y").unwrap();
    msg.clear_value();
    assert_eq!(to_hex(&msg.pack().unwrap()), "F0F1F0F1A7");
}

// Unpacking at an offset

#[test]
fn unpack_at_past_the_end_is_an_error() {
    let def = FieldBuilder::new(FieldType::Val)
        .name("text")
        .body_codec(BodyCodec::Ascii)
        .into_validated()
        .expect("valid definition");
    let err = Message::unpack_at(&def, &[0x31, 0x32], 5).unwrap_err();
    assert!(!err.is_definition_error());
    assert_eq!(err.path(), Some("text"));
    assert!(err.root_cause().to_string().contains("past the end"));

    let (msg, used) = Message::unpack_at(&def, &[0x31, 0x32], 1).expect("unpack");
    assert_eq!(msg.value(), Some(&text("2")));
    assert_eq!(used, 1);
}
