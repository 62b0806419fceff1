//! Reflection surface the sweep walks

use std::rc::Rc;

/// A reachable application object.
pub type Obj = Rc<dyn Reflectable>;

/// How the sweep may treat a value.
///
/// `Opaque` values cannot be inspected safely; the sweep records them as
/// visited and goes no further. Everything else is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Primitive,
    Collection,
    KeyedCollection,
    Instance,
    Struct,
    Opaque,
}

/// What the sweep needs from application objects: which type they are,
/// which objects they hold, and the two per-instance reload actions.
///
/// Identity is pointer identity of the reference-counted allocation;
/// two `Obj` handles to the same allocation are the same object and are
/// visited once.
pub trait Reflectable {
    /// Symbol of this object's type descriptor, as harvested from the
    /// module that defines it.
    fn type_symbol(&self) -> &str;

    fn kind(&self) -> ValueKind {
        ValueKind::Instance
    }

    /// The objects this one directly holds. Cycles are fine.
    fn children(&self) -> Vec<Obj>;

    /// Reload notification, invoked once per sweep on instances of
    /// replaced types. Implementations typically reset cached state.
    fn reloaded(&self) {}

    /// Per-instance dispatch fixup for types whose shared table could
    /// not be rewritten. Returns whether anything was repointed.
    fn repoint_dispatch(&self) -> bool {
        false
    }
}
