pub mod ast;
pub mod descriptor;
pub mod diagnostics;
pub mod driver;
pub mod lexer;
pub mod parser;
pub mod resolver;
mod rules;
pub mod shape;
pub mod store;
pub mod types;

pub use descriptor::{DescriptorError, parse_shape};
pub use diagnostics::{Diagnostic, Severity, diagnostics_to_json, format_diagnostics};
pub use driver::CheckOutcome;
pub use lexer::Lexer;
pub use parser::Parser;

use crate::config::CheckConfig;
use std::fs;
use std::path::Path;

/// Parse and check the given source code.
///
/// Invalid configuration and lexing or parsing failures are returned as
/// errors; everything the checker finds is reported through the outcome's
/// diagnostics.
pub fn check_source(filename: &str, source: &str, config: &CheckConfig) -> Result<CheckOutcome, String> {
    config.validate().map_err(|e| format!("error: {}", e))?;

    // Lexing
    let mut lexer = Lexer::new(filename, source);
    let tokens = lexer.scan_tokens()?;

    // Parsing
    let mut parser = Parser::new(filename, tokens);
    let program = parser.parse()?;

    // Scope resolution
    let resolution = resolver::resolve(&program);

    tracing::debug!(
        nodes = program.node_count,
        functions = program.function_count,
        bindings = resolution.bindings.len(),
        "checking {}",
        filename
    );

    Ok(driver::run(&program, &resolution, config))
}

/// Check a file on disk.
pub fn check_file(path: &Path, config: &CheckConfig) -> Result<CheckOutcome, String> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let filename = path.to_string_lossy().to_string();
    check_source(&filename, &source, config)
}
