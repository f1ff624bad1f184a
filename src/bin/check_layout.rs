//! Parse and validate layout files.
//!
//! Usage:
//!   check_layout [OPTIONS] FILE.layout ...
//!
//! Each file is parsed and run through the structural validator. A valid layout prints its
//! definition dump; an invalid one prints one line per violation. Exits with 1 if any file fails.
//!
//! Options:
//!   --quiet, -q   Do not print the definition dump of valid layouts
//!
//! Set `RUST_LOG=debug` to see each field as it is created.

use isopack::dump::Visualizer;
use isopack::layout::build_layout;
use isopack::validator;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let quiet = if let Some(pos) = args.iter().position(|a| a == "--quiet" || a == "-q") {
        args.remove(pos);
        true
    } else {
        false
    };
    if args.is_empty() {
        eprintln!("usage: check_layout [--quiet] FILE.layout ...");
        std::process::exit(2);
    }

    let mut failed = 0usize;
    for path in &args {
        let path = Path::new(path);
        let display_path = path.display().to_string();
        let src = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{}: {}", display_path, e);
                failed += 1;
                continue;
            }
        };
        let def = match build_layout(&src) {
            Ok(def) => def,
            Err(e) => {
                println!("{}: error: {}", display_path, e);
                failed += 1;
                continue;
            }
        };
        let violations = validator::check(&def);
        if violations.is_empty() {
            if !quiet {
                println!("{}: ok", display_path);
                print!("{}", Visualizer::default().dump_definition(&def, def.root()));
            }
            continue;
        }
        failed += 1;
        for v in &violations {
            println!("{}: {}: {} [{}]", display_path, v.path, v.message, v.rule);
        }
    }

    if failed > 0 {
        eprintln!("check_layout: {} of {} file(s) failed", failed, args.len());
        std::process::exit(1);
    }
    Ok(())
}
