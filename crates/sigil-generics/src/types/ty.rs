// types/ty.rs
//
// Structural type representation. Child types are TypeId handles into the
// same arena.

use sigil_identity::{AssocTypeId, ForeignTypeId, NominalId, ProtocolId, Symbol};
use smallvec::smallvec;

use super::type_id::{TypeId, TypeIdVec};
use crate::requirement::InvertibleProtocolSet;
use crate::signature::SignatureId;

/// Position of a generic parameter: outer-to-inner depth, then index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenericParamKey {
    pub depth: u32,
    pub index: u32,
}

impl GenericParamKey {
    pub fn new(depth: u32, index: u32) -> Self {
        Self { depth, index }
    }
}

/// Which environment an archetype was opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchetypeKind {
    /// Archetype of a generic signature's own environment.
    Primary,
    /// Element archetype opened while iterating a pack locally.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    /// Poison type produced by failed lookups.
    Error,
    /// `τ_depth_index`, optionally carrying its source name as sugar.
    GenericParam {
        depth: u32,
        index: u32,
        is_pack: bool,
        name: Option<Symbol>,
    },
    /// `Base.Assoc`: an associated type of another type parameter.
    DependentMember { base: TypeId, assoc: AssocTypeId },
    Nominal { decl: NominalId, args: TypeIdVec },
    Tuple(TypeIdVec),
    Function { params: TypeIdVec, result: TypeId },
    Metatype(TypeId),
    /// A concrete list of types standing for a substituted parameter pack.
    Pack(TypeIdVec),
    /// `repeat pattern`, repeated once per element of the `count` pack.
    PackExpansion { pattern: TypeId, count: TypeId },
    /// `each pack` referring to an expansion `level` frames further out
    /// than the innermost one.
    PackElement { pack: TypeId, level: u32 },
    Protocol(ProtocolId),
    /// `P<Args>` with primary associated type arguments.
    ParameterizedProtocol { base: ProtocolId, args: TypeIdVec },
    /// `A & B & AnyObject & ~Copyable`
    Composition {
        members: TypeIdVec,
        any_object: bool,
        inverses: InvertibleProtocolSet,
    },
    /// `any Constraint`
    Existential(TypeId),
    /// Contextual stand-in for a reduced type parameter of `signature`.
    Archetype {
        signature: SignatureId,
        interface: TypeId,
        kind: ArchetypeKind,
    },
    Foreign(ForeignTypeId),
    /// Type alias sugar.
    Sugar { name: Symbol, underlying: TypeId },
}

impl Ty {
    /// Child types in structural order. Archetype interfaces are not
    /// children: they live in the signature's world, not the type's.
    pub fn children(&self) -> TypeIdVec {
        match self {
            Ty::Error
            | Ty::GenericParam { .. }
            | Ty::Protocol(_)
            | Ty::Archetype { .. }
            | Ty::Foreign(_) => TypeIdVec::new(),
            Ty::DependentMember { base, .. } => smallvec![*base],
            Ty::Nominal { args, .. } | Ty::ParameterizedProtocol { args, .. } => args.clone(),
            Ty::Tuple(elems) | Ty::Pack(elems) => elems.clone(),
            Ty::Composition { members, .. } => members.clone(),
            Ty::Function { params, result } => {
                let mut children = params.clone();
                children.push(*result);
                children
            }
            Ty::Metatype(inner) | Ty::Existential(inner) => smallvec![*inner],
            Ty::PackExpansion { pattern, count } => smallvec![*pattern, *count],
            Ty::PackElement { pack, .. } => smallvec![*pack],
            Ty::Sugar { underlying, .. } => smallvec![*underlying],
        }
    }

    /// Rebuild this node with replaced children, in `children()` order.
    pub fn with_children(&self, children: &[TypeId]) -> Ty {
        debug_assert_eq!(children.len(), self.children().len());
        match self {
            Ty::Error
            | Ty::GenericParam { .. }
            | Ty::Protocol(_)
            | Ty::Archetype { .. }
            | Ty::Foreign(_) => self.clone(),
            Ty::DependentMember { assoc, .. } => Ty::DependentMember {
                base: children[0],
                assoc: *assoc,
            },
            Ty::Nominal { decl, .. } => Ty::Nominal {
                decl: *decl,
                args: children.into(),
            },
            Ty::ParameterizedProtocol { base, .. } => Ty::ParameterizedProtocol {
                base: *base,
                args: children.into(),
            },
            Ty::Tuple(_) => Ty::Tuple(children.into()),
            Ty::Pack(_) => Ty::Pack(children.into()),
            Ty::Composition {
                any_object,
                inverses,
                ..
            } => Ty::Composition {
                members: children.into(),
                any_object: *any_object,
                inverses: *inverses,
            },
            Ty::Function { .. } => match children.split_last() {
                Some((result, params)) => Ty::Function {
                    params: params.into(),
                    result: *result,
                },
                None => Ty::Error,
            },
            Ty::Metatype(_) => Ty::Metatype(children[0]),
            Ty::Existential(_) => Ty::Existential(children[0]),
            Ty::PackExpansion { .. } => Ty::PackExpansion {
                pattern: children[0],
                count: children[1],
            },
            Ty::PackElement { level, .. } => Ty::PackElement {
                pack: children[0],
                level: *level,
            },
            Ty::Sugar { name, .. } => Ty::Sugar {
                name: *name,
                underlying: children[0],
            },
        }
    }
}
