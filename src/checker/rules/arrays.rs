use crate::checker::ast::{Element, Expr, ExprKind, Spread};
use crate::checker::diagnostics::Code;
use crate::checker::shape::{ArrayShape, Contents, Member, Shape, TypeName, name_allowed};
use crate::checker::types::{Type, TypeId, allowed};

use super::Walker;

impl<'a, 'r> Walker<'a, 'r> {
    /// A spread into an array literal or call needs an array, into an object
    /// literal an object.
    pub(super) fn spread_exit(&mut self, spread: &'a Spread, expected: TypeId) {
        let found = self.type_id(spread.argument.id);
        if !found.is_known() {
            self.unexpected(
                Code::SpreadUnknownType,
                "Spread element type mismatch",
                found,
                Some(expected.name()),
                spread.span,
            );
        } else if !allowed(found, expected) {
            self.unexpected(
                Code::SpreadType,
                "Spread element type mismatch",
                found,
                Some(expected.name()),
                spread.span,
            );
        }
    }

    pub(super) fn array_literal_exit(&mut self, expr: &'a Expr, elements: &'a [Option<Element>]) {
        self.store.mark_type(expr.id, Type::inferred(TypeId::Array));
        let shape = self.infer_array_shape(elements);
        self.reporter.info(
            Code::ArrayShape,
            format!("Array literal shape: '{}'", shape.description),
            expr.span,
        );
        self.store.force_shape(expr.id, Shape::Array(shape));
    }

    /// Shape of an array literal from its elements: one element type gives
    /// `T[]`, one element shape gives `S[]`, differing element shapes give
    /// `any` nested to their shallowest common depth, anything else `any[]`.
    fn infer_array_shape(&self, elements: &[Option<Element>]) -> ArrayShape {
        if elements.is_empty() {
            return ArrayShape::any();
        }

        let mut types: Vec<TypeId> = Vec::new();
        let mut shapes: Vec<&ArrayShape> = Vec::new();
        for element in elements {
            let Some(element) = element else {
                if !types.contains(&TypeId::Undef) {
                    types.push(TypeId::Undef);
                }
                continue;
            };

            let id = match element {
                Element::Expr(expr) => self.type_id(expr.id),
                Element::Spread(_) => TypeId::Unknown,
            };
            if !id.is_known() {
                types = vec![TypeId::Unknown];
                break;
            }
            if !types.contains(&id) {
                types.push(id);
            }

            if let Some(shape) = self.store.shape(element.id()).and_then(Shape::as_array)
                && !shapes.iter().any(|s| s.description == shape.description)
            {
                shapes.push(shape);
            }
        }

        if shapes.len() > 1 {
            let depth = shapes.iter().map(|s| s.depth()).min().unwrap_or(0);
            ArrayShape::nested_any(depth)
        } else if types.len() > 1 {
            ArrayShape::any()
        } else if let [shape] = shapes.as_slice() {
            ArrayShape::nested((*shape).clone())
        } else {
            ArrayShape::of(TypeName::Builtin(types[0]))
        }
    }

    /// Checks an array literal against an array shape element by element,
    /// recursing into nested literals.
    pub(super) fn validate_array_literal(&self, elements: &[Option<Element>], shape: &ArrayShape) -> bool {
        match &shape.contains {
            Contents::Simple(name) => {
                if shape.non_empty && elements.is_empty() {
                    return false;
                }
                elements.iter().all(|element| self.element_has_type(element.as_ref(), name))
            }
            Contents::Tuple(members) => {
                if elements.len() != members.len() {
                    return false;
                }
                elements.iter().zip(members).all(|(element, member)| {
                    let Some(Element::Expr(expr)) = element else {
                        return false;
                    };
                    match (&expr.kind, member) {
                        (ExprKind::Array(inner), Member::Shape(shape)) => {
                            self.validate_array_literal(inner, shape)
                        }
                        (_, Member::Simple(name)) => self.element_has_type(element.as_ref(), name),
                        (_, Member::Shape(shape)) => self.store.funcs.shape_allowed(
                            self.store.shape(expr.id),
                            Some(&Shape::Array(shape.clone())),
                        ),
                    }
                })
            }
            Contents::Nested(inner) => {
                if shape.non_empty && elements.is_empty() {
                    return false;
                }
                elements.iter().all(|element| match element {
                    Some(Element::Expr(expr)) => match &expr.kind {
                        ExprKind::Array(nested) => self.validate_array_literal(nested, inner),
                        _ => self.store.funcs.shape_allowed(
                            self.store.shape(expr.id),
                            Some(&Shape::Array((**inner).clone())),
                        ),
                    },
                    _ => false,
                })
            }
        }
    }

    /// Holes and spreads never satisfy an element type.
    fn element_has_type(&self, element: Option<&Element>, name: &TypeName) -> bool {
        match element {
            Some(Element::Expr(expr)) => {
                name_allowed(&TypeName::Builtin(self.type_id(expr.id)), name)
            }
            _ => false,
        }
    }
}
