//! Benchmark: pack and unpack an ISO-8583 style authorization request (MTI, extended bitmap,
//! BCD and ASCII fields, an LLVAR PAN and an EMV TLV block in field 55), plus the layout parse.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use isopack::layout::parse_layout;
use isopack::{FieldDef, Message};

const LAYOUT: &str = r#"
MSG "iso" {
    VAL "mti" { len = 2; body = bcd_right_f; }
    BIT_SET "fields" {
        bitmap = ifb_extended(1);
        LEN_VAL "pan" { field_num = 2; length = bcd(1); body = bcd_right_f; masker = pan; }
        VAL "processing-code" { field_num = 3; len = 3; body = bcd_no_padding; }
        VAL "amount" { field_num = 4; len = 6; body = bcd_left_zero; }
        VAL "stan" { field_num = 11; len = 3; body = bcd_no_padding; }
        LEN_VAL "track2" { field_num = 35; length = bcd(1); body = bcd_right_f; masker = pan; }
        VAL "terminal-id" { field_num = 41; len = 8; body = ascii; }
        LEN_VAL "icc" {
            field_num = 55;
            length = binary(2);
            children_tag = literal(2);
            children_length = hex;
            TAG_LEN_VAL "cryptogram" { tag = "9F26"; body = hex; }
            TAG_LEN_VAL "cid" { tag = "9F27"; body = hex; }
            TAG_LEN_VAL "issuer-data" { tag = "9F10"; body = hex; }
        }
        VAL "network-code" { field_num = 70; len = 2; body = bcd_no_padding; }
    }
}
"#;

fn request(def: &FieldDef) -> Message<'_> {
    let mut msg = Message::new(def);
    let values: [(&str, &[&str]); 10] = [
        ("0100", &["iso", "mti"]),
        ("4567890123456789", &["iso", "fields", "pan"]),
        ("000000", &["iso", "fields", "processing-code"]),
        ("000000001000", &["iso", "fields", "amount"]),
        ("000123", &["iso", "fields", "stan"]),
        ("4567890123456789=2512", &["iso", "fields", "track2"]),
        ("TERM0001", &["iso", "fields", "terminal-id"]),
        ("1122334455667788", &["iso", "fields", "icc", "cryptogram"]),
        ("80", &["iso", "fields", "icc", "cid"]),
        ("0110A00003220000", &["iso", "fields", "icc", "issuer-data"]),
    ];
    for (value, path) in values {
        msg.set_value_at(value, path).expect("set value");
    }
    msg
}

fn bench_pack_unpack(c: &mut Criterion) {
    let def = parse_layout(LAYOUT).expect("parse layout");
    let bytes = request(&def).pack().expect("pack");
    eprintln!("pack_unpack: {} byte request", bytes.len());

    c.bench_function("parse_layout", |b| {
        b.iter(|| parse_layout(black_box(LAYOUT)).expect("parse layout"))
    });

    c.bench_function("build_and_pack", |b| {
        b.iter(|| request(black_box(&def)).pack().expect("pack"))
    });

    let msg = request(&def);
    c.bench_function("pack", |b| b.iter(|| black_box(&msg).pack().expect("pack")));

    c.bench_function("unpack", |b| {
        b.iter(|| Message::unpack(&def, black_box(&bytes)).expect("unpack"))
    });

    c.bench_function("unpack_pack", |b| {
        b.iter(|| {
            let msg = Message::unpack(&def, black_box(&bytes)).expect("unpack");
            black_box(msg.pack().expect("pack"))
        })
    });

    c.bench_function("dump_masked", |b| b.iter(|| black_box(&msg).dump(true)));
}

criterion_group!(benches, bench_pack_unpack);
criterion_main!(benches);
