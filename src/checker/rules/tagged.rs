use crate::checker::ast::{Expr, ExprKind, NodeId, Template};
use crate::checker::descriptor::parse_shape;
use crate::checker::diagnostics::Code;
use crate::checker::shape::{ArrayShape, Shape};
use crate::checker::types::{TypeId, allowed};
use crate::runtime;

use super::{IdentRole, Walker};

/// Whether the text, ignoring surrounding whitespace, starts with `open` and
/// ends with `close`.
fn is_enclosed(text: &str, open: char, close: char) -> bool {
    let text = text.trim();
    text.len() >= 2 && text.starts_with(open) && text.ends_with(close)
}

/// Text of a template with no substitutions.
fn single_text(quasi: &Template) -> Option<&str> {
    match quasi.quasis.as_slice() {
        [only] if quasi.expressions.is_empty() => Some(only.cooked.as_str()),
        _ => None,
    }
}

impl<'a, 'r> Walker<'a, 'r> {
    /// Visits a tagged template. `outer` is the tagged template this one is
    /// the tag of, if any.
    pub(super) fn tagged_template(&mut self, expr: &'a Expr, outer: Option<NodeId>) {
        let ExprKind::TaggedTemplate { tag, quasi } = &expr.kind else {
            return;
        };

        match &tag.kind {
            ExprKind::Ident(ident) => self.identifier(ident, IdentRole::TemplateTag(expr.id)),
            ExprKind::TaggedTemplate { .. } => self.tagged_template(tag, Some(expr.id)),
            _ => self.expr(tag),
        }
        for expr in &quasi.expressions {
            self.expr(expr);
        }

        match &tag.kind {
            ExprKind::Ident(ident) => {
                let Some(tag_id) = TypeId::from_name(&ident.name) else {
                    return;
                };
                match (tag_id, single_text(quasi)) {
                    (TypeId::Array, Some(text)) if !is_enclosed(text, '[', ']') => {
                        self.shape_annotation(expr, text, outer);
                    }
                    (TypeId::Object, Some(text)) if !is_enclosed(text, '{', '}') => {
                        // object shapes are not described yet
                    }
                    _ => self.template_quasis(expr, tag_id, ident.name.clone(), quasi, false),
                }
            }
            ExprKind::TaggedTemplate {
                tag: inner_tag,
                quasi: inner_quasi,
            } => {
                let Some(inner) = inner_tag.as_ident() else {
                    return;
                };
                let tag_id = match inner.name.as_str() {
                    "array" => TypeId::Array,
                    "object" => TypeId::Object,
                    _ => return,
                };
                if let Some(ty) = self.store.ty(tag.id).copied() {
                    self.store.mark_type(expr.id, ty);
                }
                let raw = inner_quasi.quasis.first().map(|q| q.raw.as_str()).unwrap_or_default();
                let tag_fn = format!("{}`{}`", inner.name, raw);
                self.template_quasis(expr, tag_id, tag_fn, quasi, true);
            }
            _ => {}
        }
    }

    /// ``array`int[]` `` annotates the expression (and the tagged template it
    /// is the tag of) with a parsed shape.
    fn shape_annotation(&mut self, expr: &'a Expr, text: &str, outer: Option<NodeId>) {
        match parse_shape(text) {
            Ok(shape) => {
                let shape = Shape::Array(shape);
                if let Some(outer) = outer {
                    self.store.mark_shape(outer, Some(shape.clone()));
                }
                self.store.mark_shape(expr.id, Some(shape));
            }
            Err(err) => {
                self.reporter
                    .error(Code::TaggedLiteralShape, format!("(Type-Tag) {}", err), expr.span);
            }
        }
    }

    fn template_quasis(&mut self, expr: &'a Expr, tag_id: TypeId, tag_fn: String, quasi: &'a Template, chained: bool) {
        let shape: Option<ArrayShape> = if chained {
            match self.store.shape(expr.id).and_then(Shape::as_array) {
                Some(shape) => Some(shape.clone()),
                None => return,
            }
        } else {
            None
        };

        if let Some(text) = single_text(quasi) {
            if let Err(err) = runtime::validate_literal(tag_id, text, shape.as_ref()) {
                self.reporter
                    .error(Code::TaggedLiteralType, format!("(Type-Tag) {}", err), expr.span);
            }
            return;
        }

        let trivial = quasi.expressions.len() == 1 && quasi.quasis.iter().all(|q| q.cooked.trim().is_empty());
        if trivial || tag_id == TypeId::String {
            for value in &quasi.expressions {
                self.check_interpolated(value, tag_id, &tag_fn, shape.as_ref());
            }
        } else if !matches!(tag_id, TypeId::Any | TypeId::String | TypeId::Regex) {
            self.reporter.error(
                Code::TaggedInvalidLiteral,
                "(Type-Tag) Invalid input".to_string(),
                expr.span,
            );
        }
    }

    fn check_interpolated(&mut self, value: &'a Expr, tag_id: TypeId, tag_fn: &str, shape: Option<&ArrayShape>) {
        let found = self.type_id(value.id);
        if !allowed(found, tag_id) {
            self.unexpected(Code::TaggedExprType, "(Type-Tag)", found, Some(tag_fn), value.span);
            return;
        }

        let Some(shape) = shape else {
            return;
        };
        let ok = match &value.kind {
            ExprKind::Array(elements) => self.validate_array_literal(elements, shape),
            ExprKind::Object(_) => true,
            _ => self
                .store
                .funcs
                .shape_allowed(self.store.shape(value.id), Some(&Shape::Array(shape.clone()))),
        };
        if !ok {
            let found = self.store.funcs.describe(self.store.shape(value.id));
            self.reporter.unexpected_shape(
                Code::TaggedExprShape,
                "(Type-Tag) Shape mismatch",
                &shape.description,
                &found,
                value.span,
            );
        }
    }
}
