//! Side table holding the type and shape of every node and binding.
//!
//! Entries are stamped with the pass that wrote them. Within a pass the first
//! concrete write wins; a write from an earlier pass is overwritten by the
//! first write of the current one.

use std::collections::{HashMap, HashSet};

use super::ast::{FuncId, NodeId};
use super::resolver::BindingId;
use super::shape::{FuncShape, FuncShapeId, FuncShapes, Shape};
use super::types::{Type, TypeId};

#[derive(Debug, Clone, PartialEq)]
struct Marked<T> {
    value: T,
    pass: u32,
}

/// Something that can carry a type and a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Node(NodeId),
    Binding(BindingId),
}

impl From<NodeId> for Target {
    fn from(id: NodeId) -> Self {
        Target::Node(id)
    }
}

impl From<BindingId> for Target {
    fn from(id: BindingId) -> Self {
        Target::Binding(id)
    }
}

/// What the fixpoint driver tracks between "touched while unknown" and
/// "became known".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tracked {
    Binding(BindingId),
    Return(FuncShapeId),
}

#[derive(Debug, Default)]
pub struct PassState {
    pub unknown_touched: HashSet<Tracked>,
    pub became_known: HashSet<Tracked>,
}

#[derive(Debug)]
pub struct Store {
    pass: u32,
    node_types: Vec<Option<Marked<Type>>>,
    node_shapes: Vec<Option<Marked<Shape>>>,
    binding_types: Vec<Option<Marked<Type>>>,
    binding_shapes: Vec<Option<Marked<Shape>>>,
    by_function: Vec<Option<FuncShapeId>>,
    natives: HashMap<&'static str, FuncShapeId>,
    pub funcs: FuncShapes,
    pub state: PassState,
}

impl Store {
    pub fn new(node_count: usize, binding_count: usize, function_count: usize) -> Self {
        Self {
            pass: 0,
            node_types: vec![None; node_count],
            node_shapes: vec![None; node_count],
            binding_types: vec![None; binding_count],
            binding_shapes: vec![None; binding_count],
            by_function: vec![None; function_count],
            natives: HashMap::new(),
            funcs: FuncShapes::default(),
            state: PassState::default(),
        }
    }

    pub fn pass(&self) -> u32 {
        self.pass
    }

    /// Starts a new pass and clears the pass-local sets.
    pub fn begin_pass(&mut self) {
        self.pass += 1;
        self.state = PassState::default();
    }

    fn type_slot(&self, target: Target) -> Option<&Marked<Type>> {
        match target {
            Target::Node(id) => self.node_types.get(id.index())?.as_ref(),
            Target::Binding(id) => self.binding_types.get(id.index())?.as_ref(),
        }
    }

    fn type_slot_mut(&mut self, target: Target) -> Option<&mut Option<Marked<Type>>> {
        match target {
            Target::Node(id) => self.node_types.get_mut(id.index()),
            Target::Binding(id) => self.binding_types.get_mut(id.index()),
        }
    }

    fn shape_slot(&self, target: Target) -> Option<&Marked<Shape>> {
        match target {
            Target::Node(id) => self.node_shapes.get(id.index())?.as_ref(),
            Target::Binding(id) => self.binding_shapes.get(id.index())?.as_ref(),
        }
    }

    fn shape_slot_mut(&mut self, target: Target) -> Option<&mut Option<Marked<Shape>>> {
        match target {
            Target::Node(id) => self.node_shapes.get_mut(id.index()),
            Target::Binding(id) => self.binding_shapes.get_mut(id.index()),
        }
    }

    pub fn ty(&self, target: impl Into<Target>) -> Option<&Type> {
        self.type_slot(target.into()).map(|m| &m.value)
    }

    pub fn type_id(&self, target: impl Into<Target>) -> TypeId {
        self.ty(target).map(|t| t.id).unwrap_or(TypeId::Unknown)
    }

    pub fn shape(&self, target: impl Into<Target>) -> Option<&Shape> {
        self.shape_slot(target.into()).map(|m| &m.value)
    }

    /// Whether the target has no type or only `unknown`.
    pub fn is_untyped(&self, target: impl Into<Target>) -> bool {
        !self.type_id(target).is_known()
    }

    pub fn type_set_this_pass(&self, target: impl Into<Target>) -> bool {
        self.type_slot(target.into())
            .is_some_and(|m| m.pass == self.pass && m.value.id.is_known())
    }

    pub fn shape_set_this_pass(&self, target: impl Into<Target>) -> bool {
        self.shape_slot(target.into()).is_some_and(|m| m.pass == self.pass)
    }

    /// Writes a type unless a concrete one was already written this pass.
    /// Returns whether the write happened.
    pub fn mark_type(&mut self, target: impl Into<Target>, ty: Type) -> bool {
        let target = target.into();
        if self.type_set_this_pass(target) {
            return false;
        }
        self.force_type(target, ty);
        true
    }

    pub fn force_type(&mut self, target: impl Into<Target>, ty: Type) {
        let pass = self.pass;
        if let Some(slot) = self.type_slot_mut(target.into()) {
            *slot = Some(Marked { value: ty, pass });
        }
    }

    /// Replaces a type without touching its pass stamp.
    pub fn reimply(&mut self, target: impl Into<Target>, ty: Type) {
        let pass = self.pass;
        if let Some(slot) = self.type_slot_mut(target.into()) {
            match slot {
                Some(marked) => marked.value = ty,
                None => *slot = Some(Marked { value: ty, pass }),
            }
        }
    }

    /// Writes a shape unless one was already written this pass. `None` is
    /// never written.
    pub fn mark_shape(&mut self, target: impl Into<Target>, shape: Option<Shape>) -> bool {
        let target = target.into();
        let Some(shape) = shape else {
            return false;
        };
        if self.shape_set_this_pass(target) {
            return false;
        }
        self.force_shape(target, shape);
        true
    }

    pub fn force_shape(&mut self, target: impl Into<Target>, shape: Shape) {
        let pass = self.pass;
        if let Some(slot) = self.shape_slot_mut(target.into()) {
            *slot = Some(Marked { value: shape, pass });
        }
    }

    pub fn touch_unknown(&mut self, tracked: Tracked) {
        self.state.unknown_touched.insert(tracked);
    }

    pub fn mark_known(&mut self, tracked: Tracked) {
        self.state.became_known.insert(tracked);
    }

    pub fn is_touched_unknown(&self, tracked: Tracked) -> bool {
        self.state.unknown_touched.contains(&tracked)
    }

    /// Whether something read as unknown this pass was resolved later in the
    /// same pass.
    pub fn needs_another_pass(&self) -> bool {
        self.state
            .unknown_touched
            .intersection(&self.state.became_known)
            .next()
            .is_some()
    }

    pub fn function_shape(&self, func: FuncId) -> Option<FuncShapeId> {
        self.by_function.get(func.index()).copied().flatten()
    }

    /// Returns the shape registered for `func`, allocating it on first use.
    pub fn function_shape_or_alloc(&mut self, func: FuncId) -> (FuncShapeId, bool) {
        if let Some(id) = self.function_shape(func) {
            return (id, false);
        }
        let id = self.funcs.alloc(FuncShape::for_function(func));
        if let Some(slot) = self.by_function.get_mut(func.index()) {
            *slot = Some(id);
        }
        (id, true)
    }

    /// Shape of a built-in constructor, created once per name.
    pub fn native(&mut self, name: &'static str, ret: TypeId) -> FuncShapeId {
        if let Some(id) = self.natives.get(name) {
            return *id;
        }
        let id = self.funcs.alloc(FuncShape::native(ret));
        self.natives.insert(name, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::shape::ArrayShape;

    #[test]
    fn test_first_write_wins_within_a_pass() {
        let mut store = Store::new(2, 0, 0);
        store.begin_pass();
        assert!(store.mark_type(NodeId(0), Type::tagged(TypeId::Int)));
        assert!(!store.mark_type(NodeId(0), Type::inferred(TypeId::String)));
        assert_eq!(store.type_id(NodeId(0)), TypeId::Int);
    }

    #[test]
    fn test_unknown_can_be_overwritten() {
        let mut store = Store::new(1, 0, 0);
        store.begin_pass();
        store.mark_type(NodeId(0), Type::unknown());
        assert!(!store.type_set_this_pass(NodeId(0)));
        assert!(store.mark_type(NodeId(0), Type::inferred(TypeId::Bool)));
        assert_eq!(store.type_id(NodeId(0)), TypeId::Bool);
    }

    #[test]
    fn test_new_pass_overwrites_previous_values() {
        let mut store = Store::new(0, 1, 0);
        let b = BindingId(0);
        store.begin_pass();
        store.mark_type(b, Type::inferred(TypeId::Undef));
        store.begin_pass();
        assert!(store.ty(b).is_some());
        assert!(!store.type_set_this_pass(b));
        assert!(store.mark_type(b, Type::inferred(TypeId::Int)));
        assert_eq!(store.type_id(b), TypeId::Int);
    }

    #[test]
    fn test_reimply_keeps_stamp() {
        let mut store = Store::new(0, 1, 0);
        let b = BindingId(0);
        store.begin_pass();
        store.mark_type(b, Type::inferred(TypeId::Undef));
        store.begin_pass();
        store.reimply(b, Type::inferred(TypeId::Int));
        assert_eq!(store.type_id(b), TypeId::Int);
        assert!(!store.type_set_this_pass(b));
    }

    #[test]
    fn test_shapes_ignore_none() {
        let mut store = Store::new(1, 0, 0);
        store.begin_pass();
        assert!(!store.mark_shape(NodeId(0), None));
        assert!(store.shape(NodeId(0)).is_none());
        assert!(store.mark_shape(NodeId(0), Some(Shape::Array(ArrayShape::any()))));
        assert!(!store.mark_shape(NodeId(0), Some(Shape::Array(ArrayShape::any()))));
    }

    #[test]
    fn test_pass_state() {
        let mut store = Store::new(0, 2, 0);
        store.begin_pass();
        store.touch_unknown(Tracked::Binding(BindingId(0)));
        store.mark_known(Tracked::Binding(BindingId(1)));
        assert!(!store.needs_another_pass());
        store.mark_known(Tracked::Binding(BindingId(0)));
        assert!(store.needs_another_pass());
        store.begin_pass();
        assert!(!store.needs_another_pass());
        assert!(!store.is_touched_unknown(Tracked::Binding(BindingId(0))));
    }

    #[test]
    fn test_function_shapes_are_stable() {
        let mut store = Store::new(0, 0, 2);
        let (a, created) = store.function_shape_or_alloc(FuncId(1));
        assert!(created);
        let (b, created) = store.function_shape_or_alloc(FuncId(1));
        assert!(!created);
        assert_eq!(a, b);
        assert_eq!(store.function_shape(FuncId(0)), None);

        let n1 = store.native("String", TypeId::String);
        let n2 = store.native("String", TypeId::String);
        assert_eq!(n1, n2);
        assert_eq!(store.funcs.len(), 2);
    }
}
