use std::process::ExitCode;

use clap::Parser;
use whats_next::cli::{self, Cli};

fn main() -> ExitCode {
    match cli::run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // The agent reads stdout, so failures go there too.
            println!("{error:#}");
            ExitCode::FAILURE
        }
    }
}
