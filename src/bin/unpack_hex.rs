//! Unpack a hex-encoded message with a layout file and print the value dump.
//!
//! Usage:
//!   unpack_hex [OPTIONS] LAYOUT HEX
//!   unpack_hex [OPTIONS] LAYOUT < message.hex
//!
//! Whitespace in the hex input is ignored.
//!
//! Options:
//!   --mask, -m    Mask private fields (those with a masker) in the dump
//!   --repack      Pack the unpacked message again and check it reproduces the input

use isopack::layout::load_layout;
use isopack::packer::hex::{from_hex, to_hex};
use isopack::Message;
use std::io::{self, Read};

fn take_flag(args: &mut Vec<String>, long: &str, short: Option<&str>) -> bool {
    match args
        .iter()
        .position(|a| a == long || Some(a.as_str()) == short)
    {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mask = take_flag(&mut args, "--mask", Some("-m"));
    let repack = take_flag(&mut args, "--repack", None);

    let (layout_path, hex) = match args.as_slice() {
        [layout] => {
            let mut src = String::new();
            io::stdin().read_to_string(&mut src)?;
            (layout.clone(), src)
        }
        [layout, hex] => (layout.clone(), hex.clone()),
        _ => {
            eprintln!("usage: unpack_hex [--mask] [--repack] LAYOUT [HEX]");
            std::process::exit(2);
        }
    };

    let def = load_layout(&layout_path)?;
    let bytes = from_hex(&hex)?;
    let msg = match Message::unpack(&def, &bytes) {
        Ok(msg) => msg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    print!("{}", msg.dump(mask));

    if repack {
        let packed = msg.pack()?;
        if packed != bytes {
            eprintln!("repack differs:\n  input  {}\n  packed {}", to_hex(&bytes), to_hex(&packed));
            std::process::exit(1);
        }
        eprintln!("repack: {} byte(s) identical", packed.len());
    }
    Ok(())
}
