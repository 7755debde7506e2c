// types/arena.rs
//
// TypeArena: per-context type storage with hash-consing.

use rustc_hash::FxBuildHasher;
use sigil_identity::{AssocTypeId, ForeignTypeId, NominalId, ProtocolId, Symbol};

use super::properties::TypeProperties;
use super::ty::{ArchetypeKind, GenericParamKey, Ty};
use super::type_id::{TypeId, TypeIdVec};
use crate::requirement::InvertibleProtocolSet;
use crate::signature::SignatureId;

/// Interned type storage. Structurally equal types share a TypeId.
#[derive(Debug, Clone)]
pub struct TypeArena {
    types: Vec<Ty>,
    properties: Vec<TypeProperties>,
    intern_map: hashbrown::HashMap<Ty, TypeId, FxBuildHasher>,
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeArena {
    pub fn new() -> Self {
        let mut arena = Self {
            types: Vec::new(),
            properties: Vec::new(),
            intern_map: hashbrown::HashMap::with_hasher(FxBuildHasher),
        };
        let error = arena.intern(Ty::Error);
        let empty_tuple = arena.intern(Ty::Tuple(TypeIdVec::new()));
        debug_assert_eq!(error, TypeId::ERROR);
        debug_assert_eq!(empty_tuple, TypeId::EMPTY_TUPLE);
        debug_assert_eq!(arena.types.len() as u32, TypeId::FIRST_DYNAMIC);
        arena
    }

    /// Intern a type, returning the existing id for structurally equal types.
    pub fn intern(&mut self, ty: Ty) -> TypeId {
        if let Some(&id) = self.intern_map.get(&ty) {
            return id;
        }
        let props = self.compute_properties(&ty);
        let id = TypeId::from_raw(self.types.len() as u32);
        self.types.push(ty.clone());
        self.properties.push(props);
        self.intern_map.insert(ty, id);
        id
    }

    #[inline]
    pub fn get(&self, id: TypeId) -> &Ty {
        &self.types[id.index() as usize]
    }

    #[inline]
    pub fn properties(&self, id: TypeId) -> TypeProperties {
        self.properties[id.index() as usize]
    }

    #[inline]
    pub fn has(&self, id: TypeId, props: TypeProperties) -> bool {
        self.properties(id).intersects(props)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn compute_properties(&self, ty: &Ty) -> TypeProperties {
        let mut props = ty
            .children()
            .iter()
            .fold(TypeProperties::empty(), |acc, &child| acc | self.properties(child));
        match ty {
            Ty::Error => props |= TypeProperties::HAS_ERROR,
            Ty::GenericParam { is_pack, name, .. } => {
                props |= TypeProperties::HAS_TYPE_PARAMETER;
                if *is_pack {
                    props |= TypeProperties::HAS_PARAMETER_PACK;
                }
                if name.is_some() {
                    props |= TypeProperties::HAS_SUGAR;
                }
            }
            Ty::Pack(_) => props |= TypeProperties::HAS_PACK,
            Ty::PackExpansion { .. } => props |= TypeProperties::HAS_PACK_EXPANSION,
            Ty::PackElement { .. } => props |= TypeProperties::HAS_PACK_ELEMENT,
            Ty::Archetype {
                interface, kind, ..
            } => {
                props |= match kind {
                    ArchetypeKind::Primary => TypeProperties::HAS_PRIMARY_ARCHETYPE,
                    ArchetypeKind::Local => TypeProperties::HAS_LOCAL_ARCHETYPE,
                };
                props |= self.properties(*interface) & TypeProperties::HAS_PARAMETER_PACK;
            }
            Ty::Foreign(_) => props |= TypeProperties::HAS_FOREIGN,
            Ty::Sugar { .. } => props |= TypeProperties::HAS_SUGAR,
            _ => {}
        }
        props
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    pub fn error(&self) -> TypeId {
        TypeId::ERROR
    }

    pub fn generic_param(&mut self, depth: u32, index: u32, is_pack: bool) -> TypeId {
        self.intern(Ty::GenericParam {
            depth,
            index,
            is_pack,
            name: None,
        })
    }

    /// A generic parameter spelled with its source name.
    pub fn named_generic_param(
        &mut self,
        name: Symbol,
        depth: u32,
        index: u32,
        is_pack: bool,
    ) -> TypeId {
        self.intern(Ty::GenericParam {
            depth,
            index,
            is_pack,
            name: Some(name),
        })
    }

    /// `Self` of a protocol's requirement signature.
    pub fn protocol_self(&mut self) -> TypeId {
        self.generic_param(0, 0, false)
    }

    pub fn dependent_member(&mut self, base: TypeId, assoc: AssocTypeId) -> TypeId {
        self.intern(Ty::DependentMember { base, assoc })
    }

    pub fn nominal(&mut self, decl: NominalId, args: TypeIdVec) -> TypeId {
        self.intern(Ty::Nominal { decl, args })
    }

    pub fn tuple(&mut self, elems: TypeIdVec) -> TypeId {
        self.intern(Ty::Tuple(elems))
    }

    pub fn function(&mut self, params: TypeIdVec, result: TypeId) -> TypeId {
        self.intern(Ty::Function { params, result })
    }

    pub fn metatype(&mut self, instance: TypeId) -> TypeId {
        self.intern(Ty::Metatype(instance))
    }

    pub fn pack(&mut self, elems: TypeIdVec) -> TypeId {
        self.intern(Ty::Pack(elems))
    }

    pub fn pack_expansion(&mut self, pattern: TypeId, count: TypeId) -> TypeId {
        self.intern(Ty::PackExpansion { pattern, count })
    }

    pub fn pack_element(&mut self, pack: TypeId, level: u32) -> TypeId {
        self.intern(Ty::PackElement { pack, level })
    }

    pub fn protocol(&mut self, proto: ProtocolId) -> TypeId {
        self.intern(Ty::Protocol(proto))
    }

    pub fn parameterized_protocol(&mut self, base: ProtocolId, args: TypeIdVec) -> TypeId {
        self.intern(Ty::ParameterizedProtocol { base, args })
    }

    pub fn composition(
        &mut self,
        members: TypeIdVec,
        any_object: bool,
        inverses: InvertibleProtocolSet,
    ) -> TypeId {
        self.intern(Ty::Composition {
            members,
            any_object,
            inverses,
        })
    }

    pub fn existential(&mut self, constraint: TypeId) -> TypeId {
        self.intern(Ty::Existential(constraint))
    }

    pub fn archetype(
        &mut self,
        signature: SignatureId,
        interface: TypeId,
        kind: ArchetypeKind,
    ) -> TypeId {
        self.intern(Ty::Archetype {
            signature,
            interface,
            kind,
        })
    }

    pub fn foreign(&mut self, decl: ForeignTypeId) -> TypeId {
        self.intern(Ty::Foreign(decl))
    }

    pub fn sugar(&mut self, name: Symbol, underlying: TypeId) -> TypeId {
        self.intern(Ty::Sugar { name, underlying })
    }

    // ========================================================================
    // Structural rewriting
    // ========================================================================

    /// Rebuild `ty` with each child mapped through `f`, reusing `ty` when no
    /// child changed.
    pub fn map_children<F>(&mut self, ty: TypeId, f: &mut F) -> TypeId
    where
        F: FnMut(&mut TypeArena, TypeId) -> TypeId,
    {
        let node = self.get(ty).clone();
        let children = node.children();
        if children.is_empty() {
            return ty;
        }
        let mapped: TypeIdVec = children.iter().map(|&child| f(self, child)).collect();
        if mapped == children {
            return ty;
        }
        self.intern(node.with_children(&mapped))
    }

    /// Strip alias sugar and generic parameter names.
    pub fn canonical_type(&mut self, ty: TypeId) -> TypeId {
        if !self.has(ty, TypeProperties::HAS_SUGAR) {
            return ty;
        }
        match *self.get(ty) {
            Ty::Sugar { underlying, .. } => self.canonical_type(underlying),
            Ty::GenericParam {
                depth,
                index,
                is_pack,
                ..
            } => self.generic_param(depth, index, is_pack),
            _ => self.map_children(ty, &mut |arena, child| arena.canonical_type(child)),
        }
    }

    #[inline]
    pub fn is_canonical(&self, ty: TypeId) -> bool {
        !self.has(ty, TypeProperties::HAS_SUGAR)
    }

    /// Replace the protocol `Self` parameter (τ_0_0) with `self_type`.
    pub fn substitute_self(&mut self, ty: TypeId, self_type: TypeId) -> TypeId {
        if !self.has(ty, TypeProperties::HAS_TYPE_PARAMETER) {
            return ty;
        }
        match *self.get(ty) {
            Ty::GenericParam {
                depth: 0,
                index: 0,
                ..
            } => self_type,
            Ty::GenericParam { .. } => ty,
            _ => self.map_children(ty, &mut |arena, child| arena.substitute_self(child, self_type)),
        }
    }

    /// Position key of a generic parameter type (looking through sugar).
    pub fn generic_param_key(&self, ty: TypeId) -> Option<GenericParamKey> {
        match *self.get(ty) {
            Ty::GenericParam { depth, index, .. } => Some(GenericParamKey::new(depth, index)),
            Ty::Sugar { underlying, .. } => self.generic_param_key(underlying),
            _ => None,
        }
    }
}
