//! Static type identity with a single-inheritance lineage.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime identity of a message or handler type.
///
/// A tag carries the Rust `TypeId`, a readable name, and an optional pointer
/// to its supertype's tag. The supertype chain is fixed at compile time, so
/// "is this type assignable to that one" is a walk up `lineage()` with no
/// reflection involved.
///
/// Two tags are equal when their `TypeId`s are equal; the name and base
/// pointer never take part in comparisons.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
    base: Option<fn() -> TypeTag>,
}

impl TypeTag {
    /// Tag for a root type (no supertype).
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_name(std::any::type_name::<T>()),
            base: None,
        }
    }

    /// Tag for a type that extends the type described by `base`.
    pub fn derived<T: Any>(base: fn() -> TypeTag) -> Self {
        Self {
            base: Some(base),
            ..Self::of::<T>()
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The direct supertype, if any.
    pub fn base(&self) -> Option<TypeTag> {
        self.base.map(|base| base())
    }

    /// This tag followed by every supertype, nearest first.
    pub fn lineage(&self) -> Lineage {
        Lineage { next: Some(*self) }
    }

    /// True when `candidate` is this type or one of its subtypes.
    pub fn is_assignable_from(&self, candidate: &TypeTag) -> bool {
        candidate.lineage().any(|tag| tag == *self)
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator over a tag and its supertypes.
pub struct Lineage {
    next: Option<TypeTag>,
}

impl Iterator for Lineage {
    type Item = TypeTag;

    fn next(&mut self) -> Option<TypeTag> {
        let current = self.next?;
        self.next = current.base();
        Some(current)
    }
}

// `type_name` yields the full path; keep the last segment, generics included.
fn short_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}
