// types/query.rs
//
// Structural queries over interned types. None of these consult a generic
// signature; see `signature::query` for questions answered under one.

use sigil_identity::AssocTypeId;
use smallvec::SmallVec;

use super::arena::TypeArena;
use super::properties::TypeProperties;
use super::ty::{ArchetypeKind, Ty};
use super::type_id::TypeId;
use crate::signature::SignatureId;

impl TypeArena {
    /// A generic parameter, or a member type rooted in one.
    pub fn is_type_parameter(&self, ty: TypeId) -> bool {
        match *self.get(ty) {
            Ty::GenericParam { .. } => true,
            Ty::DependentMember { base, .. } => self.is_type_parameter(base),
            Ty::Sugar { underlying, .. } => self.is_type_parameter(underlying),
            _ => false,
        }
    }

    /// The generic parameter at the root of a type parameter.
    pub fn root_generic_param(&self, ty: TypeId) -> Option<TypeId> {
        match *self.get(ty) {
            Ty::GenericParam { .. } => Some(ty),
            Ty::DependentMember { base, .. } => self.root_generic_param(base),
            Ty::Sugar { underlying, .. } => self.root_generic_param(underlying),
            _ => None,
        }
    }

    /// True for type parameters rooted in a pack parameter.
    pub fn is_parameter_pack(&self, ty: TypeId) -> bool {
        self.root_generic_param(ty)
            .is_some_and(|root| matches!(self.get(root), Ty::GenericParam { is_pack: true, .. }))
    }

    /// Split a type parameter into its root and associated-type path.
    pub fn member_path(&self, ty: TypeId) -> Option<(TypeId, SmallVec<[AssocTypeId; 4]>)> {
        match *self.get(ty) {
            Ty::GenericParam { .. } => Some((ty, SmallVec::new())),
            Ty::DependentMember { base, assoc } => {
                let (root, mut path) = self.member_path(base)?;
                path.push(assoc);
                Some((root, path))
            }
            Ty::Sugar { underlying, .. } => self.member_path(underlying),
            _ => None,
        }
    }

    /// Number of associated-type steps below the root parameter.
    pub fn term_length(&self, ty: TypeId) -> usize {
        match *self.get(ty) {
            Ty::DependentMember { base, .. } => 1 + self.term_length(base),
            Ty::Sugar { underlying, .. } => self.term_length(underlying),
            _ => 0,
        }
    }

    pub fn pack_elements(&self, ty: TypeId) -> Option<&[TypeId]> {
        match self.get(ty) {
            Ty::Pack(elems) => Some(elems),
            _ => None,
        }
    }

    /// `(pattern, count)` of a pack expansion.
    pub fn pack_expansion_parts(&self, ty: TypeId) -> Option<(TypeId, TypeId)> {
        match *self.get(ty) {
            Ty::PackExpansion { pattern, count } => Some((pattern, count)),
            _ => None,
        }
    }

    #[inline]
    pub fn is_pack_expansion(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Ty::PackExpansion { .. })
    }

    pub fn archetype_parts(&self, ty: TypeId) -> Option<(SignatureId, TypeId, ArchetypeKind)> {
        match *self.get(ty) {
            Ty::Archetype {
                signature,
                interface,
                kind,
            } => Some((signature, interface, kind)),
            _ => None,
        }
    }

    #[inline]
    pub fn is_archetype(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Ty::Archetype { .. })
    }

    /// Types with no type parameters, archetypes or pack references.
    pub fn is_fully_concrete(&self, ty: TypeId) -> bool {
        !self.has(
            ty,
            TypeProperties::HAS_TYPE_PARAMETER
                | TypeProperties::HAS_ARCHETYPE
                | TypeProperties::HAS_PACK_ELEMENT,
        )
    }

    pub fn look_through_sugar(&self, ty: TypeId) -> TypeId {
        match *self.get(ty) {
            Ty::Sugar { underlying, .. } => self.look_through_sugar(underlying),
            _ => ty,
        }
    }
}
