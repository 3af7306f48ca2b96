//! Multi-pass fixpoint driver.
//!
//! The rule set runs over the whole program once per pass. Another pass is
//! needed when something read as unknown during a pass became known later in
//! that same pass.

use super::ast::Program;
use super::diagnostics::{Code, Diagnostic, Reporter, Severity};
use super::resolver::{Binding, BindingId, Resolution};
use super::rules::Walker;
use super::shape::Shape;
use super::store::Store;
use super::types::Type;
use crate::config::CheckConfig;

/// Result of checking one program.
#[derive(Debug)]
pub struct CheckOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub passes: u32,
    pub converged: bool,
    pub store: Store,
    pub bindings: Vec<Binding>,
}

impl CheckOutcome {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    fn binding_index(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|b| b.name == name)
    }

    /// Type of the first binding declared with this name.
    pub fn binding_type(&self, name: &str) -> Option<Type> {
        let idx = self.binding_index(name)?;
        self.store.ty(BindingId(idx as u32)).copied()
    }

    /// Shape of the first binding declared with this name, described.
    pub fn binding_shape(&self, name: &str) -> Option<String> {
        let idx = self.binding_index(name)?;
        let shape: Option<&Shape> = self.store.shape(BindingId(idx as u32));
        shape.map(|shape| self.store.funcs.describe(Some(shape)))
    }
}

pub fn run(program: &Program, resolution: &Resolution<'_>, config: &CheckConfig) -> CheckOutcome {
    let mut store = Store::new(
        program.node_count,
        resolution.bindings.len(),
        program.function_count,
    );
    let mut reporter = Reporter::new();
    let mut converged = false;
    let mut passes = 0;

    let pass_limit = config.pass_limit.max(1);
    for _ in 0..pass_limit {
        store.begin_pass();
        passes = store.pass();
        reporter.begin_pass(passes);
        tracing::debug!(pass = passes, "starting pass");

        Walker::new(resolution, &mut store, &mut reporter, config.strict_equality).walk(program);

        tracing::debug!(
            pass = passes,
            unknown = store.state.unknown_touched.len(),
            known = store.state.became_known.len(),
            errors = reporter.error_count(),
            "finished pass"
        );

        if !store.needs_another_pass() {
            converged = true;
            break;
        }
    }

    if !converged {
        tracing::warn!(limit = pass_limit, "type inference did not converge");
        reporter.emit(
            Severity::Error,
            Code::TooManyPasses,
            format!("needed too many passes (limit: {})", pass_limit),
            None,
        );
    }

    CheckOutcome {
        diagnostics: reporter.finish(),
        passes,
        converged,
        store,
        bindings: resolution.bindings.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::lexer::Lexer;
    use crate::checker::parser::Parser;
    use crate::checker::resolver;

    fn run_source(source: &str, config: &CheckConfig) -> CheckOutcome {
        let tokens = Lexer::new("test.js", source).scan_tokens().unwrap();
        let program = Parser::new("test.js", tokens).parse().unwrap();
        let resolution = resolver::resolve(&program);
        run(&program, &resolution, config)
    }

    #[test]
    fn test_zero_pass_limit_still_walks_once() {
        let config = CheckConfig {
            pass_limit: 0,
            ..CheckConfig::default()
        };
        let outcome = run_source("var a = 1;", &config);
        assert_eq!(outcome.passes, 1);
        assert!(outcome.converged);
        assert_eq!(outcome.error_count(), 0);
    }

    #[test]
    fn test_non_convergence_reported_once() {
        let config = CheckConfig {
            pass_limit: 4,
            ..CheckConfig::default()
        };
        let outcome = run_source("function f() { var x = f(); return 1; }", &config);
        assert_eq!(outcome.passes, 4);
        let too_many: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|d| d.code == Code::TooManyPasses)
            .collect();
        assert_eq!(too_many.len(), 1);
        assert_eq!(too_many[0].message, "needed too many passes (limit: 4)");
    }
}
