//! cassandra-ops entry point
//!
//! Parses arguments and dispatches through `cli::run`. The operation's
//! JSON result is already on stdout when an error comes back here.

use cassandra_ops::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
