//! Unpack fuzz target: feed arbitrary bytes to `Message::unpack` against an ISO-8583 layout with
//! an EMV TLV block. Unpacking must not panic; it returns the message or a `PackError`.
//! Successfully unpacked messages are packed again and unpacked once more.
//! Build with: cargo fuzz run unpack_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const LAYOUT: &str = r#"
MSG "iso" {
    VAL "mti" { len = 2; body = bcd_right_f; }
    BIT_SET "fields" {
        bitmap = ifb_extended(1);
        LEN_VAL "pan" { field_num = 2; length = bcd(1); body = bcd_right_f; }
        VAL "amount" { field_num = 4; len = 6; body = bcd_left_zero; }
        LEN_VAL "track2" { field_num = 35; length = bcd(1); body = bcd_right_f; }
        VAL "terminal-id" { field_num = 41; len = 8; body = ascii; }
        LEN_VAL "private" {
            field_num = 48;
            length = ascii(3);
            children_tag = ebcdic_decimal(2);
            children_length = ebcdic_decimal(2);
            LEN_TAG_VAL "ref" { tag = 1; body = ebcdic; }
            LEN_TAG_VAL "note" { tag = 2; body = ebcdic; }
        }
        LEN_VAL "icc" {
            field_num = 55;
            length = binary(2);
            children_tag = literal(2);
            children_length = hex;
            TAG_LEN_VAL "cryptogram" { tag = "9F26"; body = hex; }
            TAG_VAL "priority" { tag = "0087"; len = 1; body = hex; }
        }
    }
}
"#;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let def = match isopack::parse_layout(LAYOUT) {
        Ok(def) => def,
        Err(_) => return,
    };
    if let Ok(msg) = isopack::Message::unpack(&def, data) {
        let _ = msg.dump(true);
        if let Ok(bytes) = msg.pack() {
            let _ = isopack::Message::unpack(&def, &bytes);
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run unpack_fuzz");
}
