//! tbk - command-line tool for inspecting legacy tile-graphics assets

use std::process::ExitCode;

use tilebank::cli;

fn main() -> ExitCode {
    cli::run()
}
