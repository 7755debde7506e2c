// decls/nominal.rs
//
// Nominal type and member declarations.

use sigil_identity::{NominalId, Symbol, ValueDeclId};

use crate::signature::GenericSignature;
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NominalKind {
    Struct,
    Enum,
    Class,
}

#[derive(Debug, Clone)]
pub struct NominalDecl {
    pub name: Symbol,
    pub kind: NominalKind,
    /// Signature of the type's own generic parameters (all at depth 0).
    pub signature: GenericSignature,
    /// Superclass as an interface type over `signature`.
    pub superclass: Option<TypeId>,
    /// Bitwise-copyable; satisfies trivial layout constraints.
    pub is_trivial: bool,
}

impl NominalDecl {
    pub fn new(name: Symbol, kind: NominalKind) -> Self {
        Self {
            name,
            kind,
            signature: GenericSignature::default(),
            superclass: None,
            is_trivial: false,
        }
    }

    pub fn with_signature(mut self, signature: GenericSignature) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_superclass(mut self, superclass: TypeId) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn trivial(mut self) -> Self {
        self.is_trivial = true;
        self
    }

    pub fn is_class(&self) -> bool {
        self.kind == NominalKind::Class
    }
}

/// A method or property declared inside a nominal type.
#[derive(Debug, Clone)]
pub struct ValueDecl {
    pub name: Symbol,
    pub context: NominalId,
    /// The context's parameters plus the member's own, one level deeper.
    pub signature: GenericSignature,
    pub interface_type: TypeId,
    pub overridden: Option<ValueDeclId>,
}

/// Opaque type imported from a foreign declaration.
#[derive(Debug, Clone, Copy)]
pub struct ForeignTypeDecl {
    pub name: Symbol,
}
