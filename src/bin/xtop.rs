//! `xtop` — non-interactive CLI testing façade for `xtop_engine` (§6.2).
//!
//! Everything beyond argument parsing and output formatting lives in the
//! library: this binary owns no SQL and makes no navigation decisions.

use clap::Parser;

use xtop_engine::cli::{self, CliArgs};

fn main() {
    let args = CliArgs::parse();
    cli::init_logging(&args);

    let result = cli::run(&args);
    if let Err(e) = &result {
        eprintln!("error: {e}");
    }
    std::process::exit(cli::exit_code(&result));
}
