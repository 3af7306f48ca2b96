use crate::checker::ast::{BinaryOp, Expr, LogicalOp, UnaryOp, UpdateOp};
use crate::checker::diagnostics::Code;
use crate::checker::types::{Type, TypeId, types_match};

use super::Walker;

/// Ids accepted by relational comparisons.
const COMPARABLE: [TypeId; 5] = [
    TypeId::String,
    TypeId::Number,
    TypeId::Finite,
    TypeId::Int,
    TypeId::Bint,
];

/// Inferred, or tagged when asked to.
fn result(id: TypeId, tagged: bool) -> Type {
    if tagged { Type::tagged(id) } else { Type::inferred(id) }
}

impl<'a, 'r> Walker<'a, 'r> {
    fn operand(&self, expr: &Expr) -> Type {
        self.store.ty(expr.id).copied().unwrap_or_else(Type::unknown)
    }

    pub(super) fn unary(&mut self, expr: &Expr, op: UnaryOp, argument: &Expr) {
        match op {
            UnaryOp::Void => {
                self.store.mark_type(expr.id, Type::inferred(TypeId::Undef));
            }
            UnaryOp::Typeof => {
                self.store.mark_type(expr.id, Type::inferred(TypeId::String));
            }
            UnaryOp::Not | UnaryOp::Delete => {
                self.store.mark_type(expr.id, Type::inferred(TypeId::Bool));
            }
            UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot => {
                self.store.mark_type(expr.id, Type::inferred(TypeId::Number));
                self.check_numeric_operand(op.as_str(), argument);
            }
        }
    }

    pub(super) fn update(&mut self, expr: &Expr, op: UpdateOp, argument: &Expr) {
        if let Some(ty) = self.store.ty(argument.id).copied() {
            let ty = if ty.id.is_number_or_subtype() {
                ty
            } else {
                Type::inferred(TypeId::Number)
            };
            self.store.mark_type(expr.id, ty);
        }
        self.check_numeric_operand(op.as_str(), argument);
    }

    fn check_numeric_operand(&mut self, op: &str, argument: &Expr) {
        let found = self.type_id(argument.id);
        if !found.is_number_or_subtype() {
            self.unexpected(
                Code::UnaryNumericType,
                &format!("Unary `{}` operation, unexpected operand type", op),
                found,
                Some(TypeId::Number.name()),
                argument.span,
            );
        }
    }

    pub(super) fn binary(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) {
        match op {
            BinaryOp::Add => self.binary_plus(expr, left, right),
            BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::UShr => self.binary_numeric(expr, op, left, right),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                self.relational(expr, op, left, right)
            }
            BinaryOp::Eq | BinaryOp::NotEq => self.loose_equality(expr, op, left, right),
            BinaryOp::StrictEq | BinaryOp::StrictNotEq => self.strict_equality(expr, op, left, right),
            BinaryOp::In => self.in_operator(expr, left, right),
            BinaryOp::Instanceof => self.instanceof_operator(expr, left, right),
        }
    }

    fn binary_plus(&mut self, expr: &Expr, left: &Expr, right: &Expr) {
        let (l, r) = (self.operand(left), self.operand(right));
        if l.id != TypeId::String && r.id != TypeId::String {
            self.binary_numeric(expr, BinaryOp::Add, left, right);
            return;
        }

        if l.id == r.id {
            self.store
                .mark_type(expr.id, result(TypeId::String, l.is_tagged() || r.is_tagged()));
        } else {
            self.store.mark_type(expr.id, Type::inferred(TypeId::String));
            self.reporter.type_mismatch(
                Code::BinaryPlusMixedTypes,
                "Binary `+` operation, mixed operand types",
                r.id,
                l.id,
                expr.span,
            );
        }
    }

    fn binary_numeric(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) {
        let (l, r) = (self.operand(left), self.operand(right));
        let tagged = l.is_tagged() || r.is_tagged();

        if l.id == TypeId::Bint && r.id == TypeId::Bint {
            self.store.mark_type(expr.id, result(TypeId::Bint, tagged));
            return;
        }

        if op == BinaryOp::Mod {
            let both_tagged_int =
                l.id == TypeId::Int && r.id == TypeId::Int && l.is_tagged() && r.is_tagged();
            self.store.mark_type(expr.id, result(TypeId::Int, both_tagged_int));
            if l.id.is_numeric() && r.id.is_numeric() {
                return;
            }
            if types_match(l.id, r.id) {
                self.unexpected(
                    Code::ModulusBothTypes,
                    "Binary `%` operation, operand types unexpected",
                    l.id,
                    Some(TypeId::Number.name()),
                    expr.span,
                );
                return;
            }
            for (side, ty) in [(left, l), (right, r)] {
                if !ty.id.is_numeric() {
                    self.unexpected(
                        Code::ModulusType,
                        "Binary `%` operation, unexpected operand type",
                        ty.id,
                        Some(TypeId::Number.name()),
                        side.span,
                    );
                }
            }
            return;
        }

        if l.id.is_numeric() && r.id.is_numeric() {
            self.store.mark_type(expr.id, result(TypeId::Number, tagged));
            return;
        }

        self.store.mark_type(expr.id, Type::inferred(TypeId::Number));
        let label = format!("Binary `{}` operation, unexpected operand type", op.as_str());
        for (side, ty) in [(left, l), (right, r)] {
            if !ty.id.is_numeric() {
                self.unexpected(
                    Code::BinaryNumericType,
                    &label,
                    ty.id,
                    Some(TypeId::Number.name()),
                    side.span,
                );
            }
        }
    }

    fn relational(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) {
        let (l, r) = (self.type_id(left.id), self.type_id(right.id));
        self.store.mark_type(expr.id, Type::inferred(TypeId::Bool));

        let valid = |id: TypeId| COMPARABLE.contains(&id);
        if types_match(l, r) {
            if !valid(l) {
                self.unexpected(
                    Code::RelationalBothTypes,
                    &format!("Binary `{}` operation, operand types unexpected", op.as_str()),
                    l,
                    Some("number|string"),
                    expr.span,
                );
            }
        } else if valid(l) && valid(r) {
            if l == TypeId::String || r == TypeId::String {
                self.reporter.type_mismatch(
                    Code::RelationalMixedTypes,
                    &format!("Binary `{}` operation, mixed operand types", op.as_str()),
                    r,
                    l,
                    expr.span,
                );
            }
        } else {
            let label = format!("Binary `{}` operation, unexpected operand type", op.as_str());
            for (side, id) in [(left, l), (right, r)] {
                if !valid(id) {
                    self.unexpected(Code::RelationalType, &label, id, Some("number|string"), side.span);
                }
            }
        }
    }

    fn loose_equality(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) {
        let (l, r) = (self.type_id(left.id), self.type_id(right.id));
        self.store.mark_type(expr.id, Type::inferred(TypeId::Bool));

        let op = op.as_str();
        match (l.is_known(), r.is_known()) {
            (false, false) => self.reporter.error(
                Code::LooseEqualityUnknownType,
                format!("Coercive Equality `{}` operation, unknown operand types", op),
                expr.span,
            ),
            (false, true) => self.reporter.error(
                Code::LooseEqualityUnknownType,
                format!("Coercive Equality `{}` operation, unknown operand type", op),
                left.span,
            ),
            (true, false) => self.reporter.error(
                Code::LooseEqualityUnknownType,
                format!("Coercive Equality `{}` operation, unknown operand type", op),
                right.span,
            ),
            (true, true) => {
                if !(types_match(l, r) || (l.is_number_or_subtype() && r.is_number_or_subtype())) {
                    self.reporter.type_mismatch(
                        Code::LooseEqualityMixedTypes,
                        &format!("Equality `{}` operation, mixed operand types", op),
                        r,
                        l,
                        expr.span,
                    );
                }
            }
        }
    }

    fn strict_equality(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) {
        let (l, r) = (self.type_id(left.id), self.type_id(right.id));
        self.store.mark_type(expr.id, Type::inferred(TypeId::Bool));

        if !l.is_known() || !r.is_known() {
            return;
        }
        if types_match(l, r) || (l.is_number_or_subtype() && r.is_number_or_subtype()) {
            self.reporter.unexpected_type(
                self.strict_equality,
                Code::StrictEqualityKnownMatchingTypes,
                &format!("Strict equality `{}`, known matching operand types", op.as_str()),
                l,
                None,
                expr.span,
            );
        } else {
            self.reporter.type_mismatch(
                Code::StrictEqualityKnownMixedTypes,
                &format!("Strict equality `{}`, known mixed operand types", op.as_str()),
                r,
                l,
                expr.span,
            );
        }
    }

    fn in_operator(&mut self, expr: &Expr, left: &Expr, right: &Expr) {
        let (l, r) = (self.type_id(left.id), self.type_id(right.id));
        self.store.mark_type(expr.id, Type::inferred(TypeId::Bool));

        let label = "`in` operation, unexpected operand type";
        if !matches!(l, TypeId::String | TypeId::Number | TypeId::Symb) {
            self.unexpected(Code::InOpType, label, l, Some("string|number|symb"), left.span);
        }
        if r != TypeId::Object {
            self.unexpected(Code::InOpType, label, r, Some(TypeId::Object.name()), right.span);
        }
    }

    fn instanceof_operator(&mut self, expr: &Expr, left: &Expr, right: &Expr) {
        let (l, r) = (self.type_id(left.id), self.type_id(right.id));
        self.store.mark_type(expr.id, Type::inferred(TypeId::Bool));

        let label = "`instanceof` operation, unexpected operand type";
        if l != TypeId::Object {
            self.unexpected(Code::InstanceofOpType, label, l, Some(TypeId::Object.name()), left.span);
        }
        if r != TypeId::Func {
            self.unexpected(Code::InstanceofOpType, label, r, Some(TypeId::Func.name()), right.span);
        }
    }

    pub(super) fn logical(&mut self, expr: &Expr, op: LogicalOp, left: &Expr, right: &Expr) {
        self.verify_bool(
            Code::LogicalCondType,
            &format!("Logical `{}` expression, unexpected condition (left side) type", op.as_str()),
            left,
        );
        self.select(expr, left, right);
    }

    pub(super) fn conditional(&mut self, expr: &Expr, test: &Expr, consequent: &Expr, alternate: &Expr) {
        self.verify_bool(
            Code::TernaryCondType,
            "Ternary `?:` expression, unexpected condition type",
            test,
        );
        self.select(expr, consequent, alternate);
    }

    /// Types an expression that evaluates to one of two operands. Without
    /// union types, differing operands leave it untyped.
    fn select(&mut self, expr: &Expr, a: &Expr, b: &Expr) {
        let (a, b) = (self.operand(a), self.operand(b));
        if types_match(a.id, b.id) {
            self.store
                .mark_type(expr.id, result(a.id, a.is_tagged() || b.is_tagged()));
        }
    }
}
