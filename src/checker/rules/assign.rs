use crate::checker::ast::{
    Declarator, Element, Expr, ExprKind, Ident, NodeId, Pattern, PatternKind, PatternProp, Property,
};
use crate::checker::diagnostics::Code;
use crate::checker::lexer::Span;
use crate::checker::resolver::BindingId;
use crate::checker::shape::Shape;
use crate::checker::store::Tracked;
use crate::checker::types::{Type, TypeId, allowed};

use super::{Source, Walker};

/// `x` for `x` and for `x = default`.
fn unwrap_default(pattern: &Pattern) -> &Pattern {
    match &pattern.kind {
        PatternKind::Assign { left, .. } => left.as_ref(),
        _ => pattern,
    }
}

impl<'a, 'r> Walker<'a, 'r> {
    /// Unifies the value `source` with the assignment target `target`.
    /// `expr_node` is the assignment expression (or pattern) that takes the
    /// value's type.
    pub(super) fn assign(&mut self, expr_node: Option<NodeId>, source: Source<'a>, target: &'a Pattern) {
        match &target.kind {
            PatternKind::Ident(ident) => self.assign_ident(expr_node, source, ident),
            PatternKind::Array(targets) => {
                let ty = self
                    .known_type(source.id)
                    .unwrap_or(Type::inferred(TypeId::Array));
                if let Some(node) = expr_node {
                    self.store.mark_type(node, ty);
                }
                let Some(ExprKind::Array(elements)) = source.expr.map(|e| &e.kind) else {
                    return;
                };
                for (idx, target) in targets.iter().enumerate() {
                    let Some(target) = target else {
                        continue;
                    };
                    if let Some(Some(Element::Expr(element))) = elements.get(idx) {
                        self.assign(None, Source::expr(element), unwrap_default(target));
                    }
                }
            }
            PatternKind::Object(props) => {
                let ty = self
                    .known_type(source.id)
                    .unwrap_or(Type::inferred(TypeId::Object));
                if let Some(node) = expr_node {
                    self.store.mark_type(node, ty);
                }
                let Some(ExprKind::Object(source_props)) = source.expr.map(|e| &e.kind) else {
                    return;
                };
                for prop in props {
                    let PatternProp::Prop { key, value } = prop else {
                        continue;
                    };
                    let matching = source_props.iter().find_map(|p| match p {
                        Property::KeyValue { key: k, value, .. } if k.name() == Some(key.as_str()) => {
                            Some(value)
                        }
                        _ => None,
                    });
                    if let Some(source_value) = matching {
                        self.assign(None, Source::expr(source_value), unwrap_default(value));
                    }
                }
            }
            PatternKind::Assign { left, .. } => self.assign(expr_node, source, left),
            PatternKind::Rest(_) => {}
        }
    }

    pub(super) fn assign_ident(&mut self, expr_node: Option<NodeId>, source: Source<'a>, ident: &'a Ident) {
        let Some(binding) = self.binding_of(ident) else {
            self.reporter.error(
                Code::AssignmentUndeclared,
                "Assignment to an unknown/undeclared variable".to_string(),
                ident.span,
            );
            return;
        };

        let Some(source_ty) = self.known_type(source.id) else {
            if self.store.is_untyped(binding) {
                self.store.touch_unknown(Tracked::Binding(binding));
            }
            return;
        };
        let source_shape = self.store.shape(source.id).cloned();

        if let Some(node) = expr_node {
            self.store.mark_type(node, source_ty);
        }

        if self.store.is_untyped(binding) || !self.store.type_set_this_pass(binding) {
            self.store.mark_type(ident.id, source_ty);
            self.mark_binding_type(binding, &ident.name, source_ty, ident.span);
            self.store.mark_known(Tracked::Binding(binding));
        } else {
            let target_ty = self.store.type_id(binding);
            if !allowed(source_ty.id, target_ty) {
                if target_ty == TypeId::Undef {
                    self.store.reimply(binding, source_ty);
                    let (code, provenance) = if source_ty.is_tagged() {
                        (Code::ReimplyUndefTagged, "with tagged-type")
                    } else {
                        (Code::ReimplyUndefInferred, "to inferred-type")
                    };
                    self.reporter.info(
                        code,
                        format!("Re-implying {} {} '{}'", ident.name, provenance, source_ty.id),
                        ident.span,
                    );
                } else {
                    self.unexpected(
                        Code::AssignmentType,
                        "Assignment type mismatch",
                        source_ty.id,
                        Some(target_ty.name()),
                        source.span,
                    );
                }
            } else {
                self.check_assigned_shape(binding, source, source_shape.as_ref());
            }
        }

        if source_shape.is_some()
            && (self.store.shape(binding).is_none() || !self.store.shape_set_this_pass(binding))
        {
            self.store.mark_known(Tracked::Binding(binding));
            self.store.mark_shape(binding, source_shape.clone());
            if let Some(node) = expr_node {
                self.store.mark_shape(node, source_shape);
            }
        }
    }

    /// A binding without a shape takes any value; an array literal assigned
    /// to an array-shaped binding is checked element by element.
    fn check_assigned_shape(&mut self, binding: BindingId, source: Source<'a>, source_shape: Option<&Shape>) {
        let Some(target_shape) = self.store.shape(binding).cloned() else {
            return;
        };

        let ok = match (source.expr.map(|e| &e.kind), target_shape.as_array()) {
            (Some(ExprKind::Array(elements)), Some(array)) => self.validate_array_literal(elements, array),
            _ => self.store.funcs.shape_allowed(source_shape, Some(&target_shape)),
        };
        if !ok {
            let expected = self.store.funcs.describe(Some(&target_shape));
            let found = self.store.funcs.describe(source_shape);
            self.reporter.unexpected_shape(
                Code::AssignmentShape,
                "Assignment shape mismatch",
                &expected,
                &found,
                source.span,
            );
        }
    }

    /// Types a binding unless it already received a type this pass.
    pub(super) fn mark_binding_type(&mut self, binding: BindingId, name: &str, ty: Type, span: Span) {
        if !self.store.is_untyped(binding) && self.store.type_set_this_pass(binding) {
            return;
        }
        self.store.mark_type(binding, ty);
        let (code, provenance) = if ty.is_tagged() {
            (Code::ImplyVarTagged, "tagged-type")
        } else {
            (Code::ImplyVarInferred, "inferred-type")
        };
        self.reporter
            .info(code, format!("Implying {} as {} '{}'", name, provenance, ty.id), span);
    }

    pub(super) fn declarator_exit(&mut self, declarator: &'a Declarator) {
        if let Some(init) = &declarator.init {
            self.assign(None, Source::expr(init), &declarator.target);
            return;
        }

        let Some(ident) = declarator.target.as_ident() else {
            return;
        };
        let Some(binding) = self.binding_of(ident) else {
            return;
        };
        if self.store.is_touched_unknown(Tracked::Binding(binding)) {
            self.store.mark_known(Tracked::Binding(binding));
        }
        self.mark_binding_type(binding, &ident.name, Type::inferred(TypeId::Undef), ident.span);
    }

    pub(super) fn assign_pattern_exit(&mut self, pattern: &'a Pattern, left: &'a Pattern, right: &'a Expr) {
        if let Some(ident) = left.as_ident()
            && self.store.is_untyped(right.id)
            && let Some(binding) = self.binding_of(ident)
        {
            self.store.touch_unknown(Tracked::Binding(binding));
        }
        self.assign(Some(pattern.id), Source::expr(right), left);
    }

    pub(super) fn rest_exit(&mut self, pattern: &'a Pattern, argument: &'a Pattern) {
        self.store
            .mark_type(pattern.id, Type::inferred(TypeId::Array).rest());

        let Some(ident) = argument.as_ident() else {
            return;
        };
        let Some(binding) = self.binding_of(ident) else {
            self.reporter.error(
                Code::RestUndeclared,
                "Rest element references unknown/undeclared variable".to_string(),
                ident.span,
            );
            return;
        };

        let found = self.store.type_id(binding);
        if !found.is_known() {
            self.mark_binding_type(binding, &ident.name, Type::inferred(TypeId::Array), ident.span);
        } else if found != TypeId::Array {
            self.unexpected(
                Code::RestType,
                "Rest element type mismatch",
                found,
                Some(TypeId::Array.name()),
                ident.span,
            );
        }
    }
}
