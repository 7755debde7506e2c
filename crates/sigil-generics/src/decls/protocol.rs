// decls/protocol.rs
//
// Protocol and associated type declarations.

use sigil_identity::{AssocTypeId, ProtocolId, Symbol};
use smallvec::SmallVec;

use crate::requirement::{InvertibleProtocolKind, Requirement};
use crate::types::TypeId;

/// Protocols the core gives special meaning to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownProtocolKind {
    Error,
    Sendable,
    Copyable,
    Escapable,
}

impl KnownProtocolKind {
    pub fn invertible(self) -> Option<InvertibleProtocolKind> {
        match self {
            KnownProtocolKind::Copyable => Some(InvertibleProtocolKind::Copyable),
            KnownProtocolKind::Escapable => Some(InvertibleProtocolKind::Escapable),
            KnownProtocolKind::Error | KnownProtocolKind::Sendable => None,
        }
    }
}

impl From<InvertibleProtocolKind> for KnownProtocolKind {
    fn from(kind: InvertibleProtocolKind) -> Self {
        match kind {
            InvertibleProtocolKind::Copyable => KnownProtocolKind::Copyable,
            InvertibleProtocolKind::Escapable => KnownProtocolKind::Escapable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProtocolDecl {
    pub name: Symbol,
    /// Directly inherited protocols (`protocol P: Q, R`).
    pub inherited: SmallVec<[ProtocolId; 2]>,
    pub associated_types: SmallVec<[AssocTypeId; 4]>,
    /// Requirements on `Self` (τ_0_0) and its member types, excluding the
    /// inherited protocols above.
    pub requirement_signature: Vec<Requirement>,
    /// `protocol P: SomeClass`
    pub superclass: Option<TypeId>,
    /// `protocol P: AnyObject`
    pub explicit_any_object: bool,
    /// Compile-time-only tag with no requirements or witnesses.
    pub is_marker: bool,
    /// Visible to the foreign object runtime.
    pub is_foreign: bool,
    pub known: Option<KnownProtocolKind>,
}

impl ProtocolDecl {
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            inherited: SmallVec::new(),
            associated_types: SmallVec::new(),
            requirement_signature: Vec::new(),
            superclass: None,
            explicit_any_object: false,
            is_marker: false,
            is_foreign: false,
            known: None,
        }
    }

    pub fn with_inherited(mut self, inherited: &[ProtocolId]) -> Self {
        self.inherited.extend_from_slice(inherited);
        self
    }

    pub fn with_superclass(mut self, superclass: TypeId) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn class_bound(mut self) -> Self {
        self.explicit_any_object = true;
        self
    }

    pub fn marker(mut self) -> Self {
        self.is_marker = true;
        self
    }

    pub fn foreign(mut self) -> Self {
        self.is_foreign = true;
        self
    }

    pub fn known(mut self, kind: KnownProtocolKind) -> Self {
        self.known = Some(kind);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AssociatedTypeDecl {
    pub name: Symbol,
    pub protocol: ProtocolId,
}
