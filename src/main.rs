//! Thin program driver (SPEC_FULL.md §4.5): reads source text from standard
//! input, runs the full pipeline via [`subsetc::compile_to_ir`], and prints the
//! module's serialization to standard output. A well-formed-but-rejected
//! program or an internal error prints a single line to standard error and
//! exits non-zero; nothing is written to standard output on failure.
//!
//! Logger setup follows the teacher's own `--debug` flag plus `simplelog`
//! pattern in `mm0-rs/src/server.rs::main`.

use std::io::{self, Read, Write};
use std::process::ExitCode;

use subsetc::error::{CompileError, Result};

fn init_logger() {
    if std::env::args().any(|a| a == "--debug") {
        use simplelog::*;
        let _ = TermLogger::init(
            LevelFilter::Debug,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        );
    }
}

fn run() -> Result<()> {
    init_logger();

    let mut source = String::new();
    io::stdin()
        .read_to_string(&mut source)
        .map_err(|e| CompileError::internal(format!("failed to read stdin: {e}")))?;

    let ir_text = subsetc::compile_to_ir(&source)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(ir_text.as_bytes())
        .map_err(|e| CompileError::internal(format!("failed to write stdout: {e}")))?;
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
