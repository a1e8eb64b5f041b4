//! cnode-state-machine entry point
//!
//! Parses arguments and dispatches through `cli::run`. Errors go to
//! stderr and exit non-zero; everything else lives in the library.

use cnode_state_machine::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
