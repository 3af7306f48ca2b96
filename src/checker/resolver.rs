//! Lexical scope resolution.
//!
//! Every declaration gets a `BindingId`; every identifier node (references and
//! declaration sites alike) maps to the binding it names, if any. Names with no
//! declaration resolve to nothing and are treated as globals.

use std::collections::{HashMap, HashSet};

use crate::checker::ast::*;
use crate::checker::lexer::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u32);

impl BindingId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Param,
    /// The name of a named function expression, visible inside itself.
    FunctionName,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    pub span: Span,
}

/// Result of resolving a program.
#[derive(Debug)]
pub struct Resolution<'a> {
    pub bindings: Vec<Binding>,
    refs: HashMap<NodeId, BindingId>,
    local_non_param: HashSet<NodeId>,
    functions: Vec<Option<&'a Function>>,
}

impl<'a> Resolution<'a> {
    pub fn binding_of(&self, ident: NodeId) -> Option<BindingId> {
        self.refs.get(&ident).copied()
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.index()]
    }

    /// Whether the identifier names a non-parameter binding declared in the
    /// identifier's own innermost scope.
    pub fn is_local_non_param(&self, ident: NodeId) -> bool {
        self.local_non_param.contains(&ident)
    }

    pub fn function(&self, func: FuncId) -> Option<&'a Function> {
        self.functions.get(func.index()).copied().flatten()
    }
}

#[derive(Debug, Default)]
struct Scope {
    names: HashMap<String, BindingId>,
}

pub struct Resolver<'a> {
    scopes: Vec<Scope>,
    resolution: Resolution<'a>,
}

pub fn resolve(program: &Program) -> Resolution<'_> {
    let mut resolver = Resolver {
        scopes: Vec::new(),
        resolution: Resolution {
            bindings: Vec::new(),
            refs: HashMap::new(),
            local_non_param: HashSet::new(),
            functions: vec![None; program.function_count],
        },
    };

    resolver.scopes.push(Scope::default());
    resolver.hoist_vars(&program.body);
    resolver.declare_lexical(&program.body);
    for stmt in &program.body {
        resolver.stmt(stmt);
    }
    resolver.scopes.pop();

    resolver.resolution
}

impl<'a> Resolver<'a> {
    fn declare(&mut self, name: &str, kind: BindingKind, span: Span) -> BindingId {
        let Some(scope) = self.scopes.last_mut() else {
            unreachable!("declaration outside of any scope");
        };
        if let Some(existing) = scope.names.get(name) {
            return *existing;
        }

        let id = BindingId(self.resolution.bindings.len() as u32);
        self.resolution.bindings.push(Binding {
            name: name.to_string(),
            kind,
            span,
        });
        scope.names.insert(name.to_string(), id);
        id
    }

    fn declare_pattern(&mut self, pattern: &Pattern, kind: BindingKind) {
        match &pattern.kind {
            PatternKind::Ident(ident) => {
                self.declare(&ident.name, kind, ident.span);
            }
            PatternKind::Array(elements) => {
                for element in elements.iter().flatten() {
                    self.declare_pattern(element, kind);
                }
            }
            PatternKind::Object(props) => {
                for prop in props {
                    match prop {
                        PatternProp::Prop { value, .. } => self.declare_pattern(value, kind),
                        PatternProp::Rest(rest) => self.declare_pattern(rest, kind),
                    }
                }
            }
            PatternKind::Assign { left, .. } => self.declare_pattern(left, kind),
            PatternKind::Rest(argument) => self.declare_pattern(argument, kind),
        }
    }

    /// Declares every `var` in `stmts` (outside nested functions) in the current scope.
    fn hoist_vars(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.hoist_stmt(stmt);
        }
    }

    fn hoist_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var {
                kind: VarKind::Var,
                declarators,
                ..
            } => {
                for declarator in declarators {
                    self.declare_pattern(&declarator.target, BindingKind::Var);
                }
            }
            Stmt::If {
                consequent,
                alternate,
                ..
            } => {
                self.hoist_stmt(consequent);
                if let Some(alternate) = alternate {
                    self.hoist_stmt(alternate);
                }
            }
            Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => self.hoist_stmt(body),
            Stmt::For { init, body, .. } => {
                if let Some(ForInit::Var {
                    kind: VarKind::Var,
                    declarators,
                }) = init
                {
                    for declarator in declarators {
                        self.declare_pattern(&declarator.target, BindingKind::Var);
                    }
                }
                self.hoist_stmt(body);
            }
            Stmt::Block(block) => self.hoist_vars(&block.body),
            _ => {}
        }
    }

    /// Declares `let`/`const` and function declarations made directly in `stmts`.
    fn declare_lexical(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Var {
                    kind: kind @ (VarKind::Let | VarKind::Const),
                    declarators,
                    ..
                } => {
                    let kind = if *kind == VarKind::Let {
                        BindingKind::Let
                    } else {
                        BindingKind::Const
                    };
                    for declarator in declarators {
                        self.declare_pattern(&declarator.target, kind);
                    }
                }
                Stmt::Function(function) => {
                    if let Some(name) = &function.name {
                        self.declare(&name.name, BindingKind::Function, name.span);
                    }
                }
                _ => {}
            }
        }
    }

    fn lookup(&mut self, ident: &Ident) {
        let innermost = self.scopes.len().saturating_sub(1);
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(id) = scope.names.get(&ident.name) {
                self.resolution.refs.insert(ident.id, *id);
                let kind = self.resolution.bindings[id.index()].kind;
                if depth == innermost && kind != BindingKind::Param {
                    self.resolution.local_non_param.insert(ident.id);
                }
                return;
            }
        }
    }

    fn block(&mut self, block: &'a Block) {
        self.scopes.push(Scope::default());
        self.declare_lexical(&block.body);
        for stmt in &block.body {
            self.stmt(stmt);
        }
        self.scopes.pop();
    }

    fn stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Var { declarators, .. } => self.declarators(declarators),
            Stmt::Function(function) => {
                if let Some(name) = &function.name {
                    self.lookup(name);
                }
                self.function(function);
            }
            Stmt::Return { argument, .. } => {
                if let Some(argument) = argument {
                    self.expr(argument);
                }
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
            }
            Stmt::While { test, body, .. } | Stmt::DoWhile { test, body, .. } => {
                self.expr(test);
                self.stmt(body);
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                self.scopes.push(Scope::default());
                match init {
                    Some(ForInit::Var { kind, declarators }) => {
                        if *kind != VarKind::Var {
                            let binding_kind = if *kind == VarKind::Let {
                                BindingKind::Let
                            } else {
                                BindingKind::Const
                            };
                            for declarator in declarators {
                                self.declare_pattern(&declarator.target, binding_kind);
                            }
                        }
                        self.declarators(declarators);
                    }
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
                self.scopes.pop();
            }
            Stmt::Block(block) => self.block(block),
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) => {}
        }
    }

    fn declarators(&mut self, declarators: &'a [Declarator]) {
        for declarator in declarators {
            self.pattern(&declarator.target);
            if let Some(init) = &declarator.init {
                self.expr(init);
            }
        }
    }

    fn function(&mut self, function: &'a Function) {
        if let Some(slot) = self.resolution.functions.get_mut(function.func.index()) {
            *slot = Some(function);
        }

        self.scopes.push(Scope::default());

        if !function.is_declaration
            && let Some(name) = &function.name
        {
            self.declare(&name.name, BindingKind::FunctionName, name.span);
            self.lookup(name);
        }

        for param in &function.params {
            self.declare_pattern(param, BindingKind::Param);
        }
        for param in &function.params {
            self.pattern(param);
        }

        match &function.body {
            FunctionBody::Block(block) => {
                self.hoist_vars(&block.body);
                self.declare_lexical(&block.body);
                for stmt in &block.body {
                    self.stmt(stmt);
                }
            }
            FunctionBody::Expr(expr) => self.expr(expr),
        }

        self.scopes.pop();
    }

    fn pattern(&mut self, pattern: &'a Pattern) {
        match &pattern.kind {
            PatternKind::Ident(ident) => self.lookup(ident),
            PatternKind::Array(elements) => {
                for element in elements.iter().flatten() {
                    self.pattern(element);
                }
            }
            PatternKind::Object(props) => {
                for prop in props {
                    match prop {
                        PatternProp::Prop { value, .. } => self.pattern(value),
                        PatternProp::Rest(rest) => self.pattern(rest),
                    }
                }
            }
            PatternKind::Assign { left, right } => {
                self.pattern(left);
                self.expr(right);
            }
            PatternKind::Rest(argument) => self.pattern(argument),
        }
    }

    fn elements(&mut self, elements: impl IntoIterator<Item = &'a Element>) {
        for element in elements {
            match element {
                Element::Expr(expr) => self.expr(expr),
                Element::Spread(spread) => self.expr(&spread.argument),
            }
        }
    }

    fn expr(&mut self, expr: &'a Expr) {
        match &expr.kind {
            ExprKind::Number(_)
            | ExprKind::BigInt(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Regex { .. }
            | ExprKind::This => {}
            ExprKind::Template(template) => {
                for expr in &template.expressions {
                    self.expr(expr);
                }
            }
            ExprKind::TaggedTemplate { tag, quasi } => {
                self.expr(tag);
                for expr in &quasi.expressions {
                    self.expr(expr);
                }
            }
            ExprKind::Ident(ident) => self.lookup(ident),
            ExprKind::Array(elements) => self.elements(elements.iter().flatten()),
            ExprKind::Object(props) => {
                for prop in props {
                    match prop {
                        Property::KeyValue { key, value, .. } => {
                            if let PropKey::Computed(key) = key {
                                self.expr(key);
                            }
                            self.expr(value);
                        }
                        Property::Method { key, function } => {
                            if let PropKey::Computed(key) = key {
                                self.expr(key);
                            }
                            self.function(function);
                        }
                        Property::Spread(spread) => self.expr(&spread.argument),
                    }
                }
            }
            ExprKind::Function(function) => self.function(function),
            ExprKind::Unary { argument, .. } | ExprKind::Update { argument, .. } => {
                self.expr(argument)
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.expr(consequent);
                self.expr(alternate);
            }
            ExprKind::Assign { target, value } => {
                match target {
                    AssignTarget::Pattern(pattern) => self.pattern(pattern),
                    AssignTarget::Member(member) => self.expr(member),
                }
                self.expr(value);
            }
            ExprKind::Sequence(exprs) => {
                for expr in exprs {
                    self.expr(expr);
                }
            }
            ExprKind::Call { callee, arguments } | ExprKind::New { callee, arguments } => {
                self.expr(callee);
                self.elements(arguments);
            }
            ExprKind::Member { object, property } => {
                self.expr(object);
                if let MemberProp::Computed(property) = property {
                    self.expr(property);
                }
            }
        }
    }
}
