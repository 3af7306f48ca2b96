use crate::checker::ast::{Element, Expr, ExprKind, FuncId, Function, FunctionBody, PatternKind};
use crate::checker::diagnostics::Code;
use crate::checker::lexer::Span;
use crate::checker::shape::{FuncShapeId, Shape, Slot};
use crate::checker::store::Tracked;
use crate::checker::types::{Type, TypeId, allowed, types_match};

use super::{Ctx, IdentRole, Walker};

/// Built-in constructors callable as plain functions, with their return types.
const NATIVES: [(&str, TypeId); 17] = [
    ("BigInt", TypeId::Bint),
    ("String", TypeId::String),
    ("Number", TypeId::Number),
    ("Boolean", TypeId::Bool),
    ("Symbol", TypeId::Symb),
    ("Object", TypeId::Object),
    ("Array", TypeId::Array),
    ("Function", TypeId::Func),
    ("Date", TypeId::String),
    ("RegExp", TypeId::Regex),
    ("Error", TypeId::Object),
    ("SyntaxError", TypeId::Object),
    ("TypeError", TypeId::Object),
    ("ReferenceError", TypeId::Object),
    ("RangeError", TypeId::Object),
    ("URIError", TypeId::Object),
    ("EvalError", TypeId::Object),
];

fn native(name: &str) -> Option<(&'static str, TypeId)> {
    NATIVES.iter().copied().find(|(native, _)| *native == name)
}

impl<'a, 'r> Walker<'a, 'r> {
    pub(super) fn function(&mut self, function: &'a Function, name: Option<&'a str>) {
        self.store.mark_type(function.node, Type::inferred(TypeId::Func));
        let (fs, created) = self.store.function_shape_or_alloc(function.func);
        if !created {
            self.store.funcs.get_mut(fs).ret.default = true;
        }
        self.store.mark_shape(function.node, Some(Shape::Func(fs)));

        self.frames.push(fs);

        if let Some(ident) = &function.name {
            self.identifier(ident, IdentRole::FunctionName(function));
        }
        for param in &function.params {
            self.pattern(param, IdentRole::Plain);
        }
        self.register_params(function, fs);

        match &function.body {
            FunctionBody::Block(block) => self.block(block),
            FunctionBody::Expr(body) => self.expr_in(body, Ctx::tail()),
        }

        self.function_exit(function, fs, name);
        self.frames.pop();
    }

    /// Records parameter types in the function's shape once the parameter
    /// patterns have been visited.
    fn register_params(&mut self, function: &'a Function, fs: FuncShapeId) {
        for (idx, param) in function.params.iter().enumerate() {
            match self.known_type(param.id) {
                Some(ty) if ty.is_rest => {
                    self.store.funcs.get_mut(fs).has_rest_param = true;
                    break;
                }
                Some(ty) => {
                    let shape = self.store.shape(param.id).cloned();
                    let params = &mut self.store.funcs.get_mut(fs).params;
                    match params.get_mut(idx) {
                        Some(slot) => {
                            if !types_match(slot.ty.id, ty.id) {
                                slot.ty = ty;
                            }
                        }
                        None => params.push(Slot::new(ty)),
                    }
                    if let Some(shape) = shape
                        && let Some(slot) = params.get_mut(idx)
                    {
                        slot.shape = Some(shape);
                    }
                }
                None => {
                    let params = &mut self.store.funcs.get_mut(fs).params;
                    if params.len() > idx {
                        continue;
                    }
                    params.push(Slot::unknown());
                    if let Some(binding) = param.simple_name().and_then(|ident| self.binding_of(ident)) {
                        self.store.touch_unknown(Tracked::Binding(binding));
                    }
                }
            }
        }
    }

    fn function_exit(&mut self, function: &'a Function, fs: FuncShapeId, name: Option<&'a str>) {
        match &function.body {
            FunctionBody::Expr(body) if function.is_arrow => {
                let body_ty = self.known_type(body.id);
                let body_shape = self.store.shape(body.id).cloned();
                let ret = &mut self.store.funcs.get_mut(fs).ret;
                ret.default = false;
                ret.ty = body_ty.unwrap_or_else(Type::unknown);
                if body_shape.is_some() {
                    ret.shape = body_shape;
                }
                if body_ty.is_some() {
                    self.store.mark_known(Tracked::Return(fs));
                }
            }
            _ => {
                let ret = &mut self.store.funcs.get_mut(fs).ret;
                if !ret.explicit {
                    ret.default = false;
                }
            }
        }

        let name = function
            .name
            .as_ref()
            .map(|ident| ident.name.as_str())
            .or(name)
            .unwrap_or("(anonymous)");
        let description = self.store.funcs.describe(Some(&Shape::Func(fs)));
        self.reporter.info(
            Code::FuncShape,
            format!("Function '{}' shape: '{}'", name, description),
            function.span,
        );
    }

    /// A `return f(..)` where `f` is the enclosing function.
    fn is_self_call(&self, expr: &Expr, fs: FuncShapeId) -> bool {
        let ExprKind::Call { callee, .. } = &expr.kind else {
            return false;
        };
        callee
            .as_ident()
            .and_then(|ident| self.binding_of(ident))
            .and_then(|binding| self.store.shape(binding))
            .is_some_and(|shape| shape.as_func() == Some(fs))
    }

    pub(super) fn return_stmt(&mut self, argument: Option<&'a Expr>, span: Span) {
        let Some(&fs) = self.frames.last() else {
            return;
        };
        if argument.is_some_and(|arg| self.is_self_call(arg, fs)) {
            return;
        }

        self.store.funcs.get_mut(fs).ret.explicit = true;

        let (found, found_shape, report_span) = match argument {
            Some(arg) => {
                let ty = self.known_type(arg.id);
                let shape = self.store.shape(arg.id).cloned();
                if ty.is_some() || shape.is_some() {
                    self.store.mark_known(Tracked::Return(fs));
                }
                (ty.unwrap_or_else(Type::unknown), shape, arg.span)
            }
            None => {
                self.store.mark_known(Tracked::Return(fs));
                (Type::inferred(TypeId::Undef), None, span)
            }
        };

        let ret = self.store.funcs.get(fs).ret.clone();
        if ret.default {
            if found.id.is_known() {
                let ret = &mut self.store.funcs.get_mut(fs).ret;
                ret.default = false;
                ret.ty = found;
                if found_shape.is_some() {
                    ret.shape = found_shape;
                }
            }
        } else if !allowed(found.id, ret.ty.id) {
            self.unexpected(
                Code::ReturnType,
                "Return type mismatched",
                found.id,
                Some(ret.ty.id.name()),
                report_span,
            );
        } else if (found_shape.is_some() || ret.shape.is_some())
            && !self
                .store
                .funcs
                .shape_allowed(found_shape.as_ref(), ret.shape.as_ref())
        {
            let expected = self.store.funcs.describe(ret.shape.as_ref());
            let found = self.store.funcs.describe(found_shape.as_ref());
            self.reporter
                .unexpected_shape(Code::ReturnShape, "Return shape mismatched", &expected, &found, report_span);
        }
    }

    /// Finds the shape a call is checked against: a built-in constructor, the
    /// callee binding's function shape, or the shape of an invoked function
    /// expression.
    fn callee_shape(&mut self, expr: &Expr, callee: &Expr) -> Option<FuncShapeId> {
        if let Some(ident) = callee.as_ident() {
            if let Some((name, ret)) = native(&ident.name) {
                let fs = self.store.native(name, ret);
                self.store.mark_type(expr.id, Type::inferred(ret));
                return Some(fs);
            }
            return self
                .binding_of(ident)
                .and_then(|binding| self.store.shape(binding))
                .and_then(Shape::as_func);
        }
        callee
            .as_function()
            .and_then(|function| self.store.function_shape(function.func))
    }

    pub(super) fn call(&mut self, expr: &'a Expr, callee: &'a Expr, arguments: &'a [Element], tail: bool) {
        let self_ptc = tail && self.frames.last().is_some_and(|&fs| self.is_self_call(expr, fs));

        let Some(fs) = self.callee_shape(expr, callee) else {
            if let Some(ident) = callee.as_ident() {
                self.reporter.error(
                    Code::CallNoShape,
                    format!("Could not find shape to check function call '{}(..)'", ident.name),
                    expr.span,
                );
                if let Some(binding) = self.binding_of(ident) {
                    self.store.touch_unknown(Tracked::Binding(binding));
                }
            }
            return;
        };

        let shape = self.store.funcs.get(fs).clone();
        let ret_ty = if shape.ret.default {
            Type::unknown()
        } else {
            self.store.mark_type(expr.id, shape.ret.ty);
            shape.ret.ty
        };
        if ret_ty.id.is_known() {
            self.store.mark_shape(expr.id, shape.ret.shape.clone());
        } else if !self_ptc {
            self.store.touch_unknown(Tracked::Return(fs));
        }

        let found = arguments.len();
        let expected = shape.params.len();
        if (!shape.has_rest_param && found > expected) || found < expected {
            if arguments.iter().any(|arg| matches!(arg, Element::Spread(_))) {
                self.reporter.error(
                    Code::CallArgCountUnverifiable,
                    format!(
                        "Expected {} arguments, could not verify count because of a `...` spread",
                        expected
                    ),
                    expr.span,
                );
            } else {
                self.reporter.error(
                    Code::CallArgCount,
                    format!("Expected {} arguments, found {}", expected, found),
                    expr.span,
                );
            }
        }

        for (idx, argument) in arguments.iter().enumerate() {
            if let Element::Spread(_) = argument {
                self.reporter.error(
                    Code::CallArgSpread,
                    "Not all arguments could be verified because of a `...` spread".to_string(),
                    expr.span,
                );
                break;
            }
            let Some(param) = shape.params.get(idx) else {
                break;
            };

            let arg_ty = self.store.ty(argument.id()).copied().unwrap_or_else(Type::unknown);
            let arg_shape = self.store.shape(argument.id()).cloned();

            if param.ty.id.is_known() {
                if !allowed(arg_ty.id, param.ty.id) {
                    self.unexpected(
                        Code::CallArgType,
                        "Argument type mismatch",
                        arg_ty.id,
                        Some(param.ty.id.name()),
                        argument.span(),
                    );
                } else if param.shape.is_some()
                    && !self
                        .store
                        .funcs
                        .shape_allowed(arg_shape.as_ref(), param.shape.as_ref())
                {
                    let expected = self.store.funcs.describe(param.shape.as_ref());
                    let found = self.store.funcs.describe(arg_shape.as_ref());
                    self.reporter.unexpected_shape(
                        Code::CallArgShape,
                        "Argument shape mismatch",
                        &expected,
                        &found,
                        argument.span(),
                    );
                }
            } else if let Some(origin) = shape.origin
                && arg_ty.id.is_known()
            {
                self.imply_param(fs, origin, idx, arg_ty, arg_shape, argument.span());
            }
        }
    }

    /// Gives an untyped parameter the type of the argument passed to it.
    fn imply_param(
        &mut self,
        fs: FuncShapeId,
        origin: FuncId,
        idx: usize,
        ty: Type,
        shape: Option<Shape>,
        span: Span,
    ) {
        let Some(function) = self.resolution.function(origin) else {
            return;
        };
        let Some(param) = function.params.get(idx) else {
            return;
        };
        let ident = match &param.kind {
            PatternKind::Ident(ident) => ident,
            PatternKind::Assign { left, .. } => match left.as_ident() {
                Some(ident) => {
                    self.store.mark_type(left.id, ty);
                    ident
                }
                None => return,
            },
            _ => return,
        };
        let Some(binding) = self.binding_of(ident) else {
            return;
        };

        if let Some(slot) = self.store.funcs.get_mut(fs).params.get_mut(idx) {
            slot.ty = ty;
            if shape.is_some() {
                slot.shape = shape.clone();
            }
        }
        self.store.mark_type(param.id, ty);
        self.store.mark_type(binding, ty);
        self.store.mark_known(Tracked::Binding(binding));

        let described = shape
            .as_ref()
            .map(|shape| {
                format!(
                    " (and shape: {})",
                    self.store.funcs.describe(Some(shape))
                )
            })
            .unwrap_or_default();
        self.store.mark_shape(binding, shape);

        let (code, provenance) = if ty.is_tagged() {
            (Code::ImplyParamFromArgTagged, "tagged-type")
        } else {
            (Code::ImplyParamFromArgInferred, "inferred-type")
        };
        self.reporter.info(
            code,
            format!(
                "Implying parameter {} from argument, as {} '{}'{}",
                ident.name, provenance, ty.id, described
            ),
            span,
        );
    }
}
