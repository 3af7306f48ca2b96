//! Typtag - static type checking for type-tagged programs
//!
//! This library provides the checker (front end, rule set and fixpoint
//! driver) and the value-level validators behind each type tag.

pub mod checker;
pub mod config;
pub mod runtime;

// Re-export commonly used types
pub use checker::{CheckOutcome, Diagnostic, Severity, check_file, check_source};
pub use config::{CheckConfig, OutputFormat};
