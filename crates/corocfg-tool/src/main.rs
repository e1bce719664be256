//! Entry point for the `corocfg-tool` operator binary.
//!
//! All behaviour lives in [`corocfg_tool::run`] so tests can drive it with
//! captured output streams.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    corocfg_tool::run(std::env::args_os(), &mut stdout, &mut stderr)
}
