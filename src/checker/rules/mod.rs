//! Inference and checking rules, one per construct.
//!
//! A `Walker` performs one depth-first pass over the program. Each construct
//! visits its children first and then applies its rule, reading child types
//! from the store and writing its own.

mod arrays;
mod assign;
mod functions;
mod operators;
mod tagged;

use crate::checker::ast::*;
use crate::checker::diagnostics::{Code, Reporter, Severity};
use crate::checker::lexer::Span;
use crate::checker::resolver::{BindingId, Resolution};
use crate::checker::shape::FuncShapeId;
use crate::checker::store::{Store, Tracked};
use crate::checker::types::{Type, TypeId};
use crate::runtime::value::MAX_SAFE_INTEGER;

/// What the parent tells a child expression about its position.
#[derive(Debug, Clone, Copy, Default)]
struct Ctx<'a> {
    /// Name a function expression in this position is known by.
    name: Option<&'a str>,
    /// A `return` argument or an arrow function's expression body.
    tail: bool,
}

impl<'a> Ctx<'a> {
    fn named(name: Option<&'a str>) -> Self {
        Self { name, tail: false }
    }

    fn tail() -> Self {
        Self { name: None, tail: true }
    }
}

/// Position of an identifier, as far as the identifier rule cares.
#[derive(Debug, Clone, Copy)]
enum IdentRole<'a> {
    Plain,
    /// Tag of the tagged template with this id.
    TemplateTag(NodeId),
    /// Default value of an assignment pattern.
    DefaultValue,
    /// Name of this function.
    FunctionName(&'a Function),
    /// Left side of an assignment pattern.
    DefaultTarget,
}

/// Value being assigned: a node that carries the type, plus the expression
/// when there is one to destructure.
#[derive(Debug, Clone, Copy)]
struct Source<'a> {
    id: NodeId,
    span: Span,
    expr: Option<&'a Expr>,
}

impl<'a> Source<'a> {
    fn expr(expr: &'a Expr) -> Self {
        Self {
            id: expr.id,
            span: expr.span,
            expr: Some(expr),
        }
    }
}

pub struct Walker<'a, 'r> {
    resolution: &'r Resolution<'a>,
    store: &'r mut Store,
    reporter: &'r mut Reporter,
    strict_equality: Severity,
    /// Shapes of the enclosing functions, innermost last.
    frames: Vec<FuncShapeId>,
}

impl<'a, 'r> Walker<'a, 'r> {
    pub fn new(
        resolution: &'r Resolution<'a>,
        store: &'r mut Store,
        reporter: &'r mut Reporter,
        strict_equality: Severity,
    ) -> Self {
        Self {
            resolution,
            store,
            reporter,
            strict_equality,
            frames: Vec::new(),
        }
    }

    /// Runs one pass over the whole program.
    pub fn walk(&mut self, program: &'a Program) {
        for stmt in &program.body {
            self.stmt(stmt);
        }
    }

    fn type_id(&self, node: NodeId) -> TypeId {
        self.store.type_id(node)
    }

    /// The node's type when it is a concrete one.
    fn known_type(&self, node: NodeId) -> Option<Type> {
        self.store.ty(node).copied().filter(|t| t.id.is_known())
    }

    fn unexpected(&mut self, code: Code, label: &str, found: TypeId, expected: Option<&str>, span: Span) {
        self.reporter
            .unexpected_type(Severity::Error, code, label, found, expected, span);
    }

    /// Reports when the node is not `bool`.
    fn verify_bool(&mut self, code: Code, label: &str, expr: &Expr) {
        let found = self.type_id(expr.id);
        if found != TypeId::Bool {
            self.unexpected(code, label, found, Some(TypeId::Bool.name()), expr.span);
        }
    }

    fn block(&mut self, block: &'a Block) {
        for stmt in &block.body {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Var { declarators, .. } => self.declarators(declarators),
            Stmt::Function(function) => self.function(function, None),
            Stmt::Return { argument, span } => {
                if let Some(argument) = argument {
                    self.expr_in(argument, Ctx::tail());
                }
                self.return_stmt(argument.as_ref(), *span);
            }
            Stmt::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.expr(test);
                self.stmt(consequent);
                if let Some(alternate) = alternate {
                    self.stmt(alternate);
                }
                self.verify_bool(Code::IfConditional, "If-statement conditional, unexpected type", test);
            }
            Stmt::While { test, body, .. } => {
                self.expr(test);
                self.stmt(body);
                self.verify_bool(Code::WhileConditional, "While-loop conditional, unexpected type", test);
            }
            Stmt::DoWhile { body, test, .. } => {
                self.stmt(body);
                self.expr(test);
                self.verify_bool(
                    Code::DoWhileConditional,
                    "Do..While-loop conditional, unexpected type",
                    test,
                );
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                match init {
                    Some(ForInit::Var { declarators, .. }) => self.declarators(declarators),
                    Some(ForInit::Expr(expr)) => self.expr(expr),
                    None => {}
                }
                if let Some(test) = test {
                    self.expr(test);
                }
                if let Some(update) = update {
                    self.expr(update);
                }
                self.stmt(body);
            }
            Stmt::Block(block) => self.block(block),
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) => {}
        }
    }

    fn declarators(&mut self, declarators: &'a [Declarator]) {
        for declarator in declarators {
            self.pattern(&declarator.target, IdentRole::Plain);
            if let Some(init) = &declarator.init {
                let name = declarator.target.as_ident().map(|i| i.name.as_str());
                self.expr_in(init, Ctx::named(name));
            }
            self.declarator_exit(declarator);
        }
    }

    fn pattern(&mut self, pattern: &'a Pattern, role: IdentRole<'a>) {
        match &pattern.kind {
            PatternKind::Ident(ident) => self.identifier(ident, role),
            PatternKind::Array(elements) => {
                for element in elements.iter().flatten() {
                    self.pattern(element, IdentRole::Plain);
                }
                self.store.mark_type(pattern.id, Type::inferred(TypeId::Array));
            }
            PatternKind::Object(props) => {
                for prop in props {
                    match prop {
                        PatternProp::Prop { value, .. } => self.pattern(value, IdentRole::Plain),
                        PatternProp::Rest(rest) => self.pattern(rest, IdentRole::Plain),
                    }
                }
                self.store.mark_type(pattern.id, Type::inferred(TypeId::Object));
            }
            PatternKind::Assign { left, right } => {
                self.pattern(left, IdentRole::DefaultTarget);
                match right.as_ident() {
                    Some(ident) => self.identifier(ident, IdentRole::DefaultValue),
                    None => self.expr_in(right, Ctx::named(left.as_ident().map(|i| i.name.as_str()))),
                }
                self.assign_pattern_exit(pattern, left, right);
            }
            PatternKind::Rest(argument) => {
                self.pattern(argument, IdentRole::Plain);
                self.rest_exit(pattern, argument);
            }
        }
    }

    /// The identifier rule. Runs for every identifier the walk reaches,
    /// declaration sites included.
    fn identifier(&mut self, ident: &'a Ident, role: IdentRole<'a>) {
        if let Some(id) = TypeId::from_name(&ident.name) {
            match role {
                IdentRole::TemplateTag(parent) => {
                    self.store.mark_type(parent, Type::tagged(id));
                }
                IdentRole::DefaultValue => {
                    self.store.mark_type(ident.id, Type::tagged(id));
                }
                _ => {
                    self.store.mark_type(ident.id, Type::inferred(TypeId::Func));
                }
            }
            return;
        }

        if let IdentRole::FunctionName(function) = role {
            let source = Source {
                id: function.node,
                span: function.span,
                expr: None,
            };
            self.assign_ident(Some(function.node), source, ident);
            return;
        }

        let binding = self.resolution.binding_of(ident.id);
        if let Some(binding) = binding
            && let Some(ty) = self.store.ty(binding).copied().filter(|t| t.id.is_known())
        {
            self.store.mark_type(ident.id, ty);
            let shape = self.store.shape(binding).cloned();
            self.store.mark_shape(ident.id, shape);
            return;
        }

        match ident.name.as_str() {
            "undefined" => {
                self.store.mark_type(ident.id, Type::inferred(TypeId::Undef));
                return;
            }
            "NaN" | "Infinity" => {
                self.store.mark_type(ident.id, Type::inferred(TypeId::Number));
                return;
            }
            _ => {}
        }

        if let Some(binding) = binding
            && !self.resolution.is_local_non_param(ident.id)
            && !matches!(role, IdentRole::DefaultTarget)
        {
            self.store.touch_unknown(Tracked::Binding(binding));
        }
    }

    fn expr(&mut self, expr: &'a Expr) {
        self.expr_in(expr, Ctx::default());
    }

    fn expr_in(&mut self, expr: &'a Expr, ctx: Ctx<'a>) {
        match &expr.kind {
            ExprKind::Number(value) => {
                let id = if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
                    TypeId::Int
                } else if value.is_finite() {
                    TypeId::Finite
                } else {
                    TypeId::Number
                };
                self.store.mark_type(expr.id, Type::inferred(id));
            }
            ExprKind::BigInt(_) => {
                self.store.mark_type(expr.id, Type::inferred(TypeId::Bint));
            }
            ExprKind::Str(_) => {
                self.store.mark_type(expr.id, Type::inferred(TypeId::String));
            }
            ExprKind::Bool(_) => {
                self.store.mark_type(expr.id, Type::inferred(TypeId::Bool));
            }
            ExprKind::Null => {
                self.store.mark_type(expr.id, Type::inferred(TypeId::Nul));
            }
            ExprKind::Regex { .. } => {
                self.store.mark_type(expr.id, Type::inferred(TypeId::Regex));
            }
            ExprKind::Template(template) => {
                for expr in &template.expressions {
                    self.expr(expr);
                }
                self.store.mark_type(expr.id, Type::inferred(TypeId::String));
            }
            ExprKind::TaggedTemplate { .. } => self.tagged_template(expr, None),
            ExprKind::Ident(ident) => self.identifier(ident, IdentRole::Plain),
            ExprKind::Array(elements) => {
                for element in elements.iter().flatten() {
                    match element {
                        Element::Expr(expr) => self.expr(expr),
                        Element::Spread(spread) => {
                            self.expr(&spread.argument);
                            self.spread_exit(spread, TypeId::Array);
                        }
                    }
                }
                self.array_literal_exit(expr, elements);
            }
            ExprKind::Object(props) => {
                for prop in props {
                    match prop {
                        Property::KeyValue { key, value, .. } => {
                            if let PropKey::Computed(key) = key {
                                self.expr(key);
                            }
                            self.expr_in(value, Ctx::named(key.name()));
                        }
                        Property::Method { key, function } => {
                            if let PropKey::Computed(key) = key {
                                self.expr(key);
                            }
                            self.function(function, key.name());
                        }
                        Property::Spread(spread) => {
                            self.expr(&spread.argument);
                            self.spread_exit(spread, TypeId::Object);
                        }
                    }
                }
                self.store.mark_type(expr.id, Type::inferred(TypeId::Object));
            }
            ExprKind::Function(function) => self.function(function, ctx.name),
            ExprKind::Unary { op, argument } => {
                self.expr(argument);
                self.unary(expr, *op, argument);
            }
            ExprKind::Update { op, argument, .. } => {
                self.expr(argument);
                self.update(expr, *op, argument);
            }
            ExprKind::Binary { op, left, right } => {
                self.expr(left);
                self.expr(right);
                self.binary(expr, *op, left, right);
            }
            ExprKind::Logical { op, left, right } => {
                self.expr(left);
                self.expr(right);
                self.logical(expr, *op, left, right);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.expr(consequent);
                self.expr(alternate);
                self.conditional(expr, test, consequent, alternate);
            }
            ExprKind::Assign { target, value } => match target {
                AssignTarget::Pattern(pattern) => {
                    self.pattern(pattern, IdentRole::Plain);
                    self.expr_in(value, Ctx::named(pattern.as_ident().map(|i| i.name.as_str())));
                    self.assign(Some(expr.id), Source::expr(value), pattern);
                }
                AssignTarget::Member(member) => {
                    self.expr(member);
                    self.expr(value);
                }
            },
            ExprKind::Sequence(exprs) => {
                for expr in exprs {
                    self.expr(expr);
                }
                if let Some(last) = exprs.last()
                    && let Some(ty) = self.store.ty(last.id).copied()
                {
                    self.store.mark_type(expr.id, ty);
                }
            }
            ExprKind::Call { callee, arguments } => {
                self.expr(callee);
                for argument in arguments {
                    match argument {
                        Element::Expr(expr) => self.expr(expr),
                        Element::Spread(spread) => {
                            self.expr(&spread.argument);
                            self.spread_exit(spread, TypeId::Array);
                        }
                    }
                }
                self.call(expr, callee, arguments, ctx.tail);
            }
            ExprKind::New { callee, arguments } => {
                self.expr(callee);
                for argument in arguments {
                    match argument {
                        Element::Expr(expr) => self.expr(expr),
                        Element::Spread(spread) => self.expr(&spread.argument),
                    }
                }
                self.store.mark_type(expr.id, Type::inferred(TypeId::Object));
            }
            ExprKind::Member { object, property } => {
                self.expr(object);
                if let MemberProp::Computed(property) = property {
                    self.expr(property);
                }
            }
            ExprKind::This => {}
        }
    }

    fn binding_of(&self, ident: &Ident) -> Option<BindingId> {
        self.resolution.binding_of(ident.id)
    }
}
