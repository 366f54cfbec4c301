use std::process::ExitCode;

use clap::Parser;
use gitmcp_cli::Cli;

fn main() -> ExitCode {
    // Usage errors exit with status 2 from inside `parse`.
    gitmcp_cli::run(Cli::parse())
}
