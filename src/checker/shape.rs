//! Structural shapes: function signatures and array/tuple layouts.

use std::collections::HashSet;

use super::ast::FuncId;
use super::types::{Type, TypeId, allowed};

/// Element type named by an array shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeName {
    Builtin(TypeId),
    /// A name that is not a recognized tag; resolved against custom validators.
    Named(String),
}

impl TypeName {
    pub fn parse(name: &str) -> Self {
        match TypeId::from_name(name) {
            Some(id) => TypeName::Builtin(id),
            None => TypeName::Named(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TypeName::Builtin(id) => id.name(),
            TypeName::Named(name) => name,
        }
    }
}

/// Tuple member: a plain element type or a nested array/tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Simple(TypeName),
    Shape(ArrayShape),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contents {
    /// Any number of elements of one type.
    Simple(TypeName),
    /// Exactly these members, in order.
    Tuple(Vec<Member>),
    /// Any number of elements, each an array of the inner shape.
    Nested(Box<ArrayShape>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayShape {
    pub contains: Contents,
    pub non_empty: bool,
    pub description: String,
}

impl ArrayShape {
    /// `T[]` for a simple element type.
    pub fn of(name: TypeName) -> Self {
        let description = format!("{}[]", name.as_str());
        Self {
            contains: Contents::Simple(name),
            non_empty: false,
            description,
        }
    }

    /// The open `any[]` shape.
    pub fn any() -> Self {
        Self::of(TypeName::Builtin(TypeId::Any))
    }

    /// `inner[]`.
    pub fn nested(inner: ArrayShape) -> Self {
        let description = format!("{}[]", inner.description);
        Self {
            contains: Contents::Nested(Box::new(inner)),
            non_empty: false,
            description,
        }
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self.contains, Contents::Tuple(_))
    }

    /// Count of trailing array-of brackets in the description.
    pub fn depth(&self) -> usize {
        match &self.contains {
            Contents::Tuple(_) => 0,
            Contents::Simple(_) => 1,
            Contents::Nested(inner) => 1 + inner.depth(),
        }
    }

    /// `any[]` wrapped in array-of `depth` times.
    pub fn nested_any(depth: usize) -> Self {
        let mut shape = Self::any();
        for _ in 0..depth {
            shape = Self::nested(shape);
        }
        shape
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncShapeId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Func(FuncShapeId),
    Array(ArrayShape),
}

impl Shape {
    pub fn as_func(&self) -> Option<FuncShapeId> {
        match self {
            Shape::Func(id) => Some(*id),
            Shape::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayShape> {
        match self {
            Shape::Array(shape) => Some(shape),
            Shape::Func(_) => None,
        }
    }
}

/// A parameter position of a function shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub ty: Type,
    pub shape: Option<Shape>,
}

impl Slot {
    pub fn new(ty: Type) -> Self {
        Self { ty, shape: None }
    }

    pub fn unknown() -> Self {
        Self::new(Type::unknown())
    }
}

/// The return position of a function shape.
///
/// `default` is set while the function body has not yet produced a known
/// return type in the current pass; `explicit` records that a `return`
/// statement was seen.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSlot {
    pub ty: Type,
    pub shape: Option<Shape>,
    pub default: bool,
    pub explicit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncShape {
    pub params: Vec<Slot>,
    pub has_rest_param: bool,
    pub ret: ReturnSlot,
    /// Function the shape was registered for; `None` for natives.
    pub origin: Option<FuncId>,
}

impl FuncShape {
    pub fn for_function(func: FuncId) -> Self {
        Self {
            params: Vec::new(),
            has_rest_param: false,
            ret: ReturnSlot {
                ty: Type::inferred(TypeId::Undef),
                shape: None,
                default: true,
                explicit: false,
            },
            origin: Some(func),
        }
    }

    /// Shape of a built-in constructor: one `any` parameter, fixed return.
    pub fn native(ret: TypeId) -> Self {
        Self {
            params: vec![Slot::new(Type::tagged(TypeId::Any))],
            has_rest_param: false,
            ret: ReturnSlot {
                ty: Type::inferred(ret),
                shape: None,
                default: false,
                explicit: true,
            },
            origin: None,
        }
    }
}

/// Arena of function shapes. Entries are created once and mutated in place
/// across passes.
#[derive(Debug, Default)]
pub struct FuncShapes {
    shapes: Vec<FuncShape>,
}

impl FuncShapes {
    pub fn alloc(&mut self, shape: FuncShape) -> FuncShapeId {
        let id = FuncShapeId(self.shapes.len() as u32);
        self.shapes.push(shape);
        id
    }

    pub fn get(&self, id: FuncShapeId) -> &FuncShape {
        &self.shapes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: FuncShapeId) -> &mut FuncShape {
        &mut self.shapes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Whether a value of shape `source` may be used where `target` is expected.
    ///
    /// Two absent shapes are compatible; one absent shape never is.
    pub fn shape_allowed(&self, source: Option<&Shape>, target: Option<&Shape>) -> bool {
        let mut seen = HashSet::new();
        self.shape_allowed_in(source, target, &mut seen)
    }

    fn shape_allowed_in(
        &self,
        source: Option<&Shape>,
        target: Option<&Shape>,
        seen: &mut HashSet<(FuncShapeId, FuncShapeId)>,
    ) -> bool {
        match (source, target) {
            (None, None) => true,
            (Some(Shape::Func(s)), Some(Shape::Func(t))) => self.func_allowed(*s, *t, seen),
            (Some(Shape::Array(s)), Some(Shape::Array(t))) => self.array_allowed(s, t, seen),
            _ => false,
        }
    }

    fn func_allowed(
        &self,
        source: FuncShapeId,
        target: FuncShapeId,
        seen: &mut HashSet<(FuncShapeId, FuncShapeId)>,
    ) -> bool {
        if source == target || !seen.insert((source, target)) {
            return true;
        }

        let s = self.get(source);
        let t = self.get(target);
        if s.params.len() != t.params.len() {
            return false;
        }

        // parameters are checked target -> source
        let params_ok = s
            .params
            .iter()
            .zip(&t.params)
            .all(|(sp, tp)| self.slot_allowed(&tp.ty, tp.shape.as_ref(), &sp.ty, sp.shape.as_ref(), seen));

        params_ok
            && self.slot_allowed(
                &s.ret.ty,
                s.ret.shape.as_ref(),
                &t.ret.ty,
                t.ret.shape.as_ref(),
                seen,
            )
    }

    fn slot_allowed(
        &self,
        source_ty: &Type,
        source_shape: Option<&Shape>,
        target_ty: &Type,
        target_shape: Option<&Shape>,
        seen: &mut HashSet<(FuncShapeId, FuncShapeId)>,
    ) -> bool {
        allowed(source_ty.id, target_ty.id)
            && self.shape_allowed_in(source_shape, target_shape, seen)
    }

    fn array_allowed(
        &self,
        source: &ArrayShape,
        target: &ArrayShape,
        seen: &mut HashSet<(FuncShapeId, FuncShapeId)>,
    ) -> bool {
        if source == target {
            return true;
        }

        match (&source.contains, &target.contains) {
            (_, Contents::Simple(TypeName::Builtin(TypeId::Any))) => true,
            (Contents::Simple(s), Contents::Simple(t)) => name_allowed(s, t),
            (Contents::Tuple(s), Contents::Tuple(t)) => {
                s.len() == t.len()
                    && s.iter().zip(t).all(|(sm, tm)| match (sm, tm) {
                        (Member::Simple(sn), Member::Simple(tn)) => name_allowed(sn, tn),
                        (Member::Shape(ss), Member::Shape(ts)) => self.array_allowed(ss, ts, seen),
                        _ => false,
                    })
            }
            (Contents::Nested(s), Contents::Nested(t)) => self.array_allowed(s, t, seen),
            _ => false,
        }
    }

    /// Text form of a shape, as used in diagnostics.
    pub fn describe(&self, shape: Option<&Shape>) -> String {
        let mut stack = Vec::new();
        self.describe_in(shape, &mut stack)
    }

    fn describe_in(&self, shape: Option<&Shape>, stack: &mut Vec<FuncShapeId>) -> String {
        match shape {
            None => "(unknown)".to_string(),
            Some(Shape::Array(array)) => array.description.clone(),
            Some(Shape::Func(id)) => {
                if stack.contains(id) {
                    return TypeId::Func.name().to_string();
                }
                stack.push(*id);
                let func = self.get(*id);
                let params = func
                    .params
                    .iter()
                    .map(|slot| self.describe_slot(&slot.ty, slot.shape.as_ref(), stack))
                    .collect::<Vec<_>>()
                    .join(",");
                let rest = match (func.has_rest_param, func.params.is_empty()) {
                    (true, false) => ",...",
                    (true, true) => "...",
                    (false, _) => "",
                };
                let ret = self.describe_slot(&func.ret.ty, func.ret.shape.as_ref(), stack);
                stack.pop();
                format!("({}{}) => {}", params, rest, ret)
            }
        }
    }

    fn describe_slot(&self, ty: &Type, shape: Option<&Shape>, stack: &mut Vec<FuncShapeId>) -> String {
        match shape {
            Some(_) => self.describe_in(shape, stack),
            None => ty.id.name().to_string(),
        }
    }
}

/// Element-type assignability inside array shapes.
pub fn name_allowed(source: &TypeName, target: &TypeName) -> bool {
    match (source, target) {
        (TypeName::Builtin(TypeId::Unknown), _) => false,
        (_, TypeName::Builtin(TypeId::Any)) => true,
        (TypeName::Builtin(s), TypeName::Builtin(t)) => allowed(*s, *t),
        (TypeName::Named(s), TypeName::Named(t)) => s == t,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> TypeName {
        TypeName::Builtin(TypeId::Int)
    }

    fn string() -> TypeName {
        TypeName::Builtin(TypeId::String)
    }

    fn tuple(members: Vec<Member>, description: &str) -> ArrayShape {
        ArrayShape {
            contains: Contents::Tuple(members),
            non_empty: false,
            description: description.to_string(),
        }
    }

    fn arr(shape: ArrayShape) -> Option<Shape> {
        Some(Shape::Array(shape))
    }

    #[test]
    fn test_simple_arrays_follow_lattice() {
        let funcs = FuncShapes::default();
        let ints = arr(ArrayShape::of(int()));
        let numbers = arr(ArrayShape::of(TypeName::Builtin(TypeId::Number)));
        assert!(funcs.shape_allowed(ints.as_ref(), numbers.as_ref()));
        assert!(!funcs.shape_allowed(numbers.as_ref(), ints.as_ref()));
    }

    #[test]
    fn test_anything_goes_into_any_array() {
        let funcs = FuncShapes::default();
        let any = arr(ArrayShape::any());
        let pair = arr(tuple(vec![Member::Simple(int()), Member::Simple(string())], "<int,string>"));
        let nested = arr(ArrayShape::nested(ArrayShape::of(int())));
        assert!(funcs.shape_allowed(pair.as_ref(), any.as_ref()));
        assert!(funcs.shape_allowed(nested.as_ref(), any.as_ref()));
        assert!(!funcs.shape_allowed(any.as_ref(), nested.as_ref()));
    }

    #[test]
    fn test_tuples_need_exact_arity() {
        let funcs = FuncShapes::default();
        let pair = arr(tuple(vec![Member::Simple(int()), Member::Simple(string())], "<int,string>"));
        let triple = arr(tuple(
            vec![Member::Simple(int()), Member::Simple(string()), Member::Simple(int())],
            "<int,string,int>",
        ));
        let finite_pair = arr(tuple(
            vec![Member::Simple(TypeName::Builtin(TypeId::Finite)), Member::Simple(string())],
            "<finite,string>",
        ));
        assert!(!funcs.shape_allowed(pair.as_ref(), triple.as_ref()));
        assert!(!funcs.shape_allowed(triple.as_ref(), pair.as_ref()));
        assert!(funcs.shape_allowed(pair.as_ref(), finite_pair.as_ref()));
        assert!(!funcs.shape_allowed(finite_pair.as_ref(), pair.as_ref()));
    }

    #[test]
    fn test_tuple_and_array_never_mix() {
        let funcs = FuncShapes::default();
        let pair = arr(tuple(vec![Member::Simple(int()), Member::Simple(int())], "<int,int>"));
        let ints = arr(ArrayShape::of(int()));
        assert!(!funcs.shape_allowed(pair.as_ref(), ints.as_ref()));
        assert!(!funcs.shape_allowed(ints.as_ref(), pair.as_ref()));
    }

    #[test]
    fn test_missing_shapes() {
        let funcs = FuncShapes::default();
        let ints = arr(ArrayShape::of(int()));
        assert!(funcs.shape_allowed(None, None));
        assert!(!funcs.shape_allowed(ints.as_ref(), None));
        assert!(!funcs.shape_allowed(None, ints.as_ref()));
    }

    #[test]
    fn test_function_params_are_contravariant() {
        let mut funcs = FuncShapes::default();
        let mut takes_number = FuncShape::for_function(FuncId(0));
        takes_number.params = vec![Slot::new(Type::inferred(TypeId::Number))];
        takes_number.ret.ty = Type::inferred(TypeId::Int);
        let mut takes_int = FuncShape::for_function(FuncId(1));
        takes_int.params = vec![Slot::new(Type::inferred(TypeId::Int))];
        takes_int.ret.ty = Type::inferred(TypeId::Int);

        let wide = Shape::Func(funcs.alloc(takes_number));
        let narrow = Shape::Func(funcs.alloc(takes_int));

        // a function accepting numbers can stand in for one accepting ints
        assert!(funcs.shape_allowed(Some(&wide), Some(&narrow)));
        assert!(!funcs.shape_allowed(Some(&narrow), Some(&wide)));
    }

    #[test]
    fn test_function_returns_are_covariant() {
        let mut funcs = FuncShapes::default();
        let mut returns_int = FuncShape::for_function(FuncId(0));
        returns_int.ret.ty = Type::inferred(TypeId::Int);
        let mut returns_number = FuncShape::for_function(FuncId(1));
        returns_number.ret.ty = Type::inferred(TypeId::Number);

        let a = Shape::Func(funcs.alloc(returns_int));
        let b = Shape::Func(funcs.alloc(returns_number));
        assert!(funcs.shape_allowed(Some(&a), Some(&b)));
        assert!(!funcs.shape_allowed(Some(&b), Some(&a)));
    }

    #[test]
    fn test_function_param_count_must_match() {
        let mut funcs = FuncShapes::default();
        let mut one = FuncShape::for_function(FuncId(0));
        one.params = vec![Slot::new(Type::inferred(TypeId::Int))];
        let none = FuncShape::for_function(FuncId(1));
        let a = Shape::Func(funcs.alloc(one));
        let b = Shape::Func(funcs.alloc(none));
        assert!(!funcs.shape_allowed(Some(&a), Some(&b)));
    }

    #[test]
    fn test_describe_function_shape() {
        let mut funcs = FuncShapes::default();
        let mut shape = FuncShape::for_function(FuncId(0));
        shape.params = vec![
            Slot::new(Type::inferred(TypeId::Int)),
            Slot {
                ty: Type::inferred(TypeId::Array),
                shape: Some(Shape::Array(ArrayShape::of(string()))),
            },
        ];
        shape.has_rest_param = true;
        shape.ret.ty = Type::inferred(TypeId::Bool);
        let id = funcs.alloc(shape);
        assert_eq!(
            funcs.describe(Some(&Shape::Func(id))),
            "(int,string[],...) => bool"
        );
        assert_eq!(funcs.describe(None), "(unknown)");
    }

    #[test]
    fn test_depth() {
        assert_eq!(ArrayShape::of(int()).depth(), 1);
        assert_eq!(ArrayShape::nested(ArrayShape::of(int())).depth(), 2);
        assert_eq!(tuple(vec![], "<>").depth(), 0);
        assert_eq!(ArrayShape::nested_any(2).description, "any[][][]");
    }
}
