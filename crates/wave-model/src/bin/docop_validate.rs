//! `docop-validate`: validate a DocOp against a document (stdin) and print
//! the resulting document (stdout).
//!
//! Usage:
//!   docop-validate '<docop-json>' [schema.json]
//!
//! The document is read from stdin as XML.  Set `RUST_LOG=debug` to see the
//! validation trail.

use std::io::{self, Read};

use wave_model::cli::validate_and_apply;

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args: Vec<String> = std::env::args().collect();
    let op_json = match args.get(1) {
        Some(op) => op,
        None => {
            eprintln!("Usage: docop-validate '<docop-json>' [schema.json]");
            std::process::exit(1);
        }
    };

    let schema = match args.get(2) {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(s) => Some(s),
            Err(e) => {
                eprintln!("{path}: {e}");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let mut xml = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut xml) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    match validate_and_apply(xml.trim(), op_json, schema.as_deref()) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
