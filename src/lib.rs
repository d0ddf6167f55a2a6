//! Front-end and mid-end of a compiler for a Rust-subset source language
//! (SPEC_FULL.md §1-§2): lexer -> parser -> four-pass semantic analyzer -> type
//! lowering -> global pre-declaration -> IR generator -> textual IR.
//!
//! [`compile_to_ir`] is the single public entry point; `src/main.rs` is a thin
//! stdin/stdout wrapper around it, and `tests/end_to_end.rs` drives it directly
//! for the §8.3 scenarios.

pub mod error;
pub mod irgen;
pub mod lexer;
pub mod lowering;
pub mod parser;
pub mod semantic;
pub mod symbol;
pub mod types;

use error::Result;
use irgen::{IrBuilder, IrGenerator};
use lowering::{GlobalLoweringDriver, TypeLowering};
use types::ir::IrModule;

/// Runs the full pipeline over `source` and returns the serialized IR module
/// text. A `CompileError::Syntax`/`Semantic` means the input was rejected;
/// `CompileError::Internal` means a pipeline invariant was violated.
pub fn compile_to_ir(source: &str) -> Result<String> {
    log::debug!("parsing {} bytes of source", source.len());
    let (items, _ids) = parser::parse_program(source)?;

    log::debug!("running semantic analysis over {} top-level items", items.len());
    let prog = semantic::analyze(items)?;

    log::debug!("lowering types and pre-declaring globals");
    let mut module = IrModule::new();
    let mut tl = TypeLowering::new(&mut module);
    let mut driver = GlobalLoweringDriver::new();
    driver.run(&mut module, &mut tl, &prog)?;

    log::debug!("generating IR for {} functions", prog.fns.len());
    let builder = IrBuilder::new(module);
    let mut gen = IrGenerator::new(&prog, tl, driver, builder);
    gen.generate(&prog.items)?;

    Ok(gen.into_module().to_string())
}
