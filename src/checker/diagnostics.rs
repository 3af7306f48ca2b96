use serde::{Deserialize, Serialize, Serializer};

use super::lexer::Span;
use super::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

impl Severity {
    fn prefix(self) -> char {
        match self {
            Severity::Info => 'I',
            Severity::Error => 'E',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Error => "error",
        }
    }
}

/// Stable diagnostic codes. Numbers never change once released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    FuncShape,
    ArrayShape,
    ObjectShape,
    ReimplyUndefTagged,
    ReimplyUndefInferred,
    ImplyParamFromArgTagged,
    ImplyParamFromArgInferred,
    ImplyVarTagged,
    ImplyVarInferred,
    RestUndeclared,
    RestType,
    AssignmentUndeclared,
    AssignmentType,
    AssignmentShape,
    CallArgCount,
    CallArgCountUnverifiable,
    CallArgSpread,
    CallArgType,
    CallArgShape,
    CallNoShape,
    BinaryPlusMixedTypes,
    RelationalMixedTypes,
    RelationalBothTypes,
    RelationalType,
    LooseEqualityUnknownType,
    LooseEqualityMixedTypes,
    StrictEqualityKnownMixedTypes,
    StrictEqualityKnownMatchingTypes,
    UnaryNumericType,
    ModulusBothTypes,
    ModulusType,
    BinaryNumericType,
    ReturnType,
    ReturnShape,
    TernaryCondType,
    SpreadUnknownType,
    SpreadType,
    LogicalCondType,
    InOpType,
    InstanceofOpType,
    IfConditional,
    WhileConditional,
    DoWhileConditional,
    TaggedLiteralType,
    TaggedLiteralShape,
    TaggedInvalidLiteral,
    TaggedExprType,
    TaggedExprShape,
    TooManyPasses,
}

impl Code {
    pub fn number(self) -> u16 {
        match self {
            Code::FuncShape => 101,
            Code::ArrayShape => 102,
            Code::ObjectShape => 103,
            Code::ReimplyUndefTagged => 104,
            Code::ReimplyUndefInferred => 105,
            Code::ImplyParamFromArgTagged => 106,
            Code::ImplyParamFromArgInferred => 107,
            Code::ImplyVarTagged => 108,
            Code::ImplyVarInferred => 109,
            Code::RestUndeclared => 110,
            Code::RestType => 111,
            Code::AssignmentUndeclared => 112,
            Code::AssignmentType => 113,
            Code::AssignmentShape => 114,
            Code::CallArgCount => 115,
            Code::CallArgCountUnverifiable => 116,
            Code::CallArgSpread => 117,
            Code::CallArgType => 118,
            Code::CallArgShape => 119,
            Code::CallNoShape => 120,
            Code::BinaryPlusMixedTypes => 121,
            Code::RelationalMixedTypes => 122,
            Code::RelationalBothTypes => 123,
            Code::RelationalType => 124,
            Code::LooseEqualityUnknownType => 125,
            Code::LooseEqualityMixedTypes => 126,
            Code::StrictEqualityKnownMixedTypes => 127,
            Code::StrictEqualityKnownMatchingTypes => 128,
            Code::UnaryNumericType => 129,
            Code::ModulusBothTypes => 130,
            Code::ModulusType => 131,
            Code::BinaryNumericType => 132,
            Code::ReturnType => 133,
            Code::ReturnShape => 134,
            Code::TernaryCondType => 135,
            Code::SpreadUnknownType => 136,
            Code::SpreadType => 137,
            Code::LogicalCondType => 138,
            Code::InOpType => 139,
            Code::InstanceofOpType => 140,
            Code::IfConditional => 141,
            Code::WhileConditional => 142,
            Code::DoWhileConditional => 143,
            Code::TaggedLiteralType => 144,
            Code::TaggedLiteralShape => 145,
            Code::TaggedInvalidLiteral => 146,
            Code::TaggedExprType => 147,
            Code::TaggedExprShape => 148,
            Code::TooManyPasses => 149,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Code::FuncShape => "func-shape",
            Code::ArrayShape => "array-shape",
            Code::ObjectShape => "object-shape",
            Code::ReimplyUndefTagged | Code::ReimplyUndefInferred => "reimply-undef",
            Code::ImplyParamFromArgTagged | Code::ImplyParamFromArgInferred => "imply-param-from-arg",
            Code::ImplyVarTagged | Code::ImplyVarInferred => "imply-var",
            Code::RestUndeclared => "rest-undeclared",
            Code::RestType => "rest-type",
            Code::AssignmentUndeclared => "assignment-undeclared",
            Code::AssignmentType => "assignment-type",
            Code::AssignmentShape => "assignment-shape",
            Code::CallArgCount => "call-arg-count",
            Code::CallArgCountUnverifiable => "call-arg-count-unverifiable",
            Code::CallArgSpread => "call-arg-spread",
            Code::CallArgType => "call-arg-type",
            Code::CallArgShape => "call-arg-shape",
            Code::CallNoShape => "call-no-shape",
            Code::BinaryPlusMixedTypes => "binary-plus-mixed-types",
            Code::RelationalMixedTypes => "relational-mixed-types",
            Code::RelationalBothTypes => "relational-both-types",
            Code::RelationalType => "relational-type",
            Code::LooseEqualityUnknownType => "loose-equality-unknown-type",
            Code::LooseEqualityMixedTypes => "loose-equality-mixed-types",
            Code::StrictEqualityKnownMixedTypes => "strict-equality-known-mixed-types",
            Code::StrictEqualityKnownMatchingTypes => "strict-equality-known-matching-types",
            Code::UnaryNumericType => "unary-numeric-type",
            Code::ModulusBothTypes => "modulus-both-types",
            Code::ModulusType => "modulus-type",
            Code::BinaryNumericType => "binary-numeric-type",
            Code::ReturnType => "return-type",
            Code::ReturnShape => "return-shape",
            Code::TernaryCondType => "ternary-cond-type",
            Code::SpreadUnknownType => "spread-unknown-type",
            Code::SpreadType => "spread-type",
            Code::LogicalCondType => "logical-cond-type",
            Code::InOpType => "in-op-type",
            Code::InstanceofOpType => "instanceof-op-type",
            Code::IfConditional => "if-conditional",
            Code::WhileConditional => "while-conditional",
            Code::DoWhileConditional => "do-while-conditional",
            Code::TaggedLiteralType => "tagged-literal-type",
            Code::TaggedLiteralShape => "tagged-literal-shape",
            Code::TaggedInvalidLiteral => "tagged-invalid-literal",
            Code::TaggedExprType => "tagged-expr-type",
            Code::TaggedExprShape => "tagged-expr-shape",
            Code::TooManyPasses => "too-many-passes",
        }
    }
}

impl Serialize for Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Code,
    pub name: &'static str,
    pub message: String,
    pub span: Option<Span>,
    /// Pass that produced the diagnostic.
    pub pass: u32,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Collects diagnostics for one check invocation.
///
/// Errors are dropped at the start of every pass and regenerated; info
/// entries accumulate, each distinct message kept once.
#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
    pass: u32,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_pass(&mut self, pass: u32) {
        self.pass = pass;
        self.diagnostics.retain(|d| d.severity == Severity::Info);
    }

    pub fn emit(&mut self, severity: Severity, code: Code, message: String, span: Option<Span>) {
        if severity == Severity::Info
            && self
                .diagnostics
                .iter()
                .any(|d| d.code == code && d.span == span && d.message == message)
        {
            return;
        }
        self.diagnostics.push(Diagnostic {
            severity,
            code,
            name: code.name(),
            message,
            span,
            pass: self.pass,
        });
    }

    pub fn info(&mut self, code: Code, message: String, span: Span) {
        self.emit(Severity::Info, code, message, Some(span));
    }

    pub fn error(&mut self, code: Code, message: String, span: Span) {
        self.emit(Severity::Error, code, message, Some(span));
    }

    /// `<label>: expected type 'X', but found type 'Y'` and its variants.
    pub fn unexpected_type(
        &mut self,
        severity: Severity,
        code: Code,
        label: &str,
        found: TypeId,
        expected: Option<&str>,
        span: Span,
    ) {
        let message = match (expected, found.is_known()) {
            (Some(expected), true) => {
                format!("{}: expected type '{}', but found type '{}'", label, expected, found)
            }
            (Some(expected), false) => {
                format!("{}: expected type '{}', but type could not be determined", label, expected)
            }
            (None, true) => format!("{}: found type '{}'", label, found),
            (None, false) => format!("{}: type is unknown", label),
        };
        self.emit(severity, code, message, Some(span));
    }

    pub fn type_mismatch(&mut self, code: Code, label: &str, a: TypeId, b: TypeId, span: Span) {
        self.error(code, format!("{}: type '{}' doesn't match type '{}'", label, a, b), span);
    }

    pub fn unexpected_shape(&mut self, code: Code, label: &str, expected: &str, found: &str, span: Span) {
        self.error(
            code,
            format!("{}: expected shape '{}', but found shape '{}'", label, expected, found),
            span,
        );
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn finish(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Formats diagnostics for display.
pub fn format_diagnostics(filename: &str, diagnostics: &[Diagnostic]) -> String {
    let mut output = String::new();
    for diag in diagnostics {
        output.push_str(&format!(
            "{}[{}{}]: {}\n",
            diag.severity.as_str(),
            diag.severity.prefix(),
            diag.code.number(),
            diag.message
        ));
        match diag.span {
            Some(span) => output.push_str(&format!("  --> {}:{}:{}\n", filename, span.line, span.column)),
            None => output.push_str(&format!("  --> {}\n", filename)),
        }
    }
    output
}

pub fn diagnostics_to_json(diagnostics: &[Diagnostic]) -> Result<String, String> {
    serde_json::to_string_pretty(diagnostics).map_err(|e| format!("failed to serialize diagnostics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_reset_each_pass() {
        let mut reporter = Reporter::new();
        reporter.begin_pass(1);
        reporter.error(Code::AssignmentType, "first".to_string(), Span::new(1, 1));
        reporter.info(Code::ImplyVarInferred, "note".to_string(), Span::new(1, 1));
        assert_eq!(reporter.error_count(), 1);

        reporter.begin_pass(2);
        assert_eq!(reporter.error_count(), 0);
        assert_eq!(reporter.diagnostics().len(), 1);
        assert_eq!(reporter.diagnostics()[0].pass, 1);
    }

    #[test]
    fn test_info_is_kept_once() {
        let mut reporter = Reporter::new();
        for pass in 1..=3 {
            reporter.begin_pass(pass);
            reporter.info(Code::ImplyVarInferred, "Implying a as inferred-type 'int'".to_string(), Span::new(1, 5));
        }
        assert_eq!(reporter.finish().len(), 1);
    }

    #[test]
    fn test_message_forms() {
        let mut reporter = Reporter::new();
        let span = Span::new(2, 3);
        reporter.unexpected_type(Severity::Error, Code::BinaryNumericType, "Binary `-` operation", TypeId::String, Some("number"), span);
        reporter.unexpected_type(Severity::Error, Code::BinaryNumericType, "Binary `-` operation", TypeId::Unknown, Some("number"), span);
        reporter.unexpected_type(Severity::Info, Code::StrictEqualityKnownMatchingTypes, "Strict equality `===`", TypeId::Int, None, span);
        reporter.type_mismatch(Code::BinaryPlusMixedTypes, "Binary `+` operation, mixed operand types", TypeId::Int, TypeId::String, span);
        reporter.unexpected_shape(Code::AssignmentShape, "Assignment shape mismatch", "int[]", "string[]", span);

        let messages: Vec<_> = reporter.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Binary `-` operation: expected type 'number', but found type 'string'",
                "Binary `-` operation: expected type 'number', but type could not be determined",
                "Strict equality `===`: found type 'int'",
                "Binary `+` operation, mixed operand types: type 'int' doesn't match type 'string'",
                "Assignment shape mismatch: expected shape 'int[]', but found shape 'string[]'",
            ]
        );
    }

    #[test]
    fn test_format_human() {
        let mut reporter = Reporter::new();
        reporter.begin_pass(1);
        reporter.error(Code::AssignmentType, "Assignment type mismatch".to_string(), Span::new(3, 7));
        reporter.emit(Severity::Error, Code::TooManyPasses, "needed too many passes (limit: 10)".to_string(), None);
        let output = format_diagnostics("a.js", reporter.diagnostics());
        assert_eq!(
            output,
            "error[E113]: Assignment type mismatch\n  --> a.js:3:7\nerror[E149]: needed too many passes (limit: 10)\n  --> a.js\n"
        );
    }

    #[test]
    fn test_json_uses_numeric_codes() {
        let mut reporter = Reporter::new();
        reporter.begin_pass(1);
        reporter.info(Code::FuncShape, "Function 'f' shape: '() => undef'".to_string(), Span::new(1, 1));
        let json = diagnostics_to_json(reporter.diagnostics()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["code"], 101);
        assert_eq!(value[0]["severity"], "info");
        assert_eq!(value[0]["name"], "func-shape");
        assert_eq!(value[0]["span"]["line"], 1);
    }
}
