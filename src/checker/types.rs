/// Type identifiers recognized by the checker.
///
/// `Unknown` is the checker's own "could not be determined" marker; it is not
/// a tag a program can name and is never assignable to or from anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeId {
    Any,
    Undef,
    Nul,
    String,
    Bool,
    Number,
    Finite,
    Int,
    Bint,
    Symb,
    Array,
    Object,
    Func,
    Regex,
    Unknown,
}

impl TypeId {
    /// Every id a type tag may name, in tag order.
    pub const RECOGNIZED: [TypeId; 14] = [
        TypeId::Any,
        TypeId::Undef,
        TypeId::Nul,
        TypeId::String,
        TypeId::Bool,
        TypeId::Number,
        TypeId::Finite,
        TypeId::Int,
        TypeId::Bint,
        TypeId::Symb,
        TypeId::Array,
        TypeId::Object,
        TypeId::Func,
        TypeId::Regex,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TypeId::Any => "any",
            TypeId::Undef => "undef",
            TypeId::Nul => "nul",
            TypeId::String => "string",
            TypeId::Bool => "bool",
            TypeId::Number => "number",
            TypeId::Finite => "finite",
            TypeId::Int => "int",
            TypeId::Bint => "bint",
            TypeId::Symb => "symb",
            TypeId::Array => "array",
            TypeId::Object => "object",
            TypeId::Func => "func",
            TypeId::Regex => "regex",
            TypeId::Unknown => "unknown",
        }
    }

    /// Looks up a recognized tag name. `"unknown"` is not a tag.
    pub fn from_name(name: &str) -> Option<TypeId> {
        TypeId::RECOGNIZED.iter().copied().find(|id| id.name() == name)
    }

    pub fn is_known(self) -> bool {
        self != TypeId::Unknown
    }

    /// `number`, `finite` or `int`.
    pub fn is_numeric(self) -> bool {
        matches!(self, TypeId::Number | TypeId::Finite | TypeId::Int)
    }

    /// The numeric ids plus `bint`.
    pub fn is_number_or_subtype(self) -> bool {
        self.is_numeric() || self == TypeId::Bint
    }

    /// Lattice table: the source ids a target accepts besides itself.
    fn accepts(self) -> &'static [TypeId] {
        match self {
            TypeId::Any => &TypeId::RECOGNIZED,
            TypeId::Number => &[TypeId::Number, TypeId::Int, TypeId::Finite],
            TypeId::Finite => &[TypeId::Finite, TypeId::Int],
            TypeId::Bint => &[TypeId::Bint, TypeId::Int],
            _ => &[],
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Assignability of `source` into `target`.
pub fn allowed(source: TypeId, target: TypeId) -> bool {
    if source == TypeId::Unknown || target == TypeId::Unknown {
        return false;
    }
    source == target || target.accepts().contains(&source)
}

/// Whether an explicit annotation produced the type or the checker derived it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    Tagged,
    Inferred,
}

impl Provenance {
    pub fn label(self) -> &'static str {
        match self {
            Provenance::Tagged => "tagged",
            Provenance::Inferred => "inferred",
        }
    }
}

/// A type attached to a node, binding or shape slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    pub id: TypeId,
    pub provenance: Provenance,
    pub is_rest: bool,
}

impl Type {
    pub fn tagged(id: TypeId) -> Self {
        Self {
            id,
            provenance: Provenance::Tagged,
            is_rest: false,
        }
    }

    pub fn inferred(id: TypeId) -> Self {
        Self {
            id,
            provenance: Provenance::Inferred,
            is_rest: false,
        }
    }

    pub fn unknown() -> Self {
        Self::inferred(TypeId::Unknown)
    }

    pub fn rest(mut self) -> Self {
        self.is_rest = true;
        self
    }

    pub fn is_tagged(&self) -> bool {
        self.provenance == Provenance::Tagged
    }
}

/// Id of an optional type, `unknown` when absent.
pub fn type_id(ty: Option<&Type>) -> TypeId {
    ty.map(|t| t.id).unwrap_or(TypeId::Unknown)
}

/// Symmetric match used where neither side is the declared one.
pub fn types_match(a: TypeId, b: TypeId) -> bool {
    a.is_known() && b.is_known() && a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_is_reflexive() {
        for id in TypeId::RECOGNIZED {
            assert!(allowed(id, id), "{} should accept itself", id);
        }
    }

    #[test]
    fn test_allowed_matches_table() {
        assert!(allowed(TypeId::Int, TypeId::Number));
        assert!(allowed(TypeId::Finite, TypeId::Number));
        assert!(allowed(TypeId::Int, TypeId::Finite));
        assert!(allowed(TypeId::Int, TypeId::Bint));
        assert!(!allowed(TypeId::Number, TypeId::Int));
        assert!(!allowed(TypeId::Number, TypeId::Finite));
        assert!(!allowed(TypeId::Bint, TypeId::Int));
        assert!(!allowed(TypeId::Finite, TypeId::Int));
        assert!(!allowed(TypeId::String, TypeId::Number));

        for source in TypeId::RECOGNIZED {
            for target in TypeId::RECOGNIZED {
                let expected = source == target
                    || target == TypeId::Any
                    || matches!(
                        (source, target),
                        (TypeId::Int | TypeId::Finite, TypeId::Number)
                            | (TypeId::Int, TypeId::Finite)
                            | (TypeId::Int, TypeId::Bint)
                    );
                assert_eq!(allowed(source, target), expected, "{} -> {}", source, target);
            }
        }
    }

    #[test]
    fn test_unknown_never_assignable() {
        assert!(!allowed(TypeId::Unknown, TypeId::Unknown));
        assert!(!allowed(TypeId::Unknown, TypeId::Any));
        assert!(!allowed(TypeId::Int, TypeId::Unknown));
        assert!(!types_match(TypeId::Unknown, TypeId::Unknown));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(TypeId::from_name("int"), Some(TypeId::Int));
        assert_eq!(TypeId::from_name("regex"), Some(TypeId::Regex));
        assert_eq!(TypeId::from_name("unknown"), None);
        assert_eq!(TypeId::from_name("Int"), None);
    }
}
