//! rmdb-harness entry point
//!
//! Parses arguments, dispatches, prints errors to stderr and exits
//! non-zero on failure. Everything else lives in the library.

use rmdb_harness::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
