//! Registry for the declarations the generics core consults.
//!
//! DeclRegistry stores protocols, associated types, nominal types, member
//! declarations and foreign types, providing type-safe lookups by id and name.
//! Relationship queries that only need declarations (protocol inheritance,
//! class-boundness) live here; anything that needs types lives on the context.

mod nominal;
mod protocol;
mod relations;

pub use nominal::{ForeignTypeDecl, NominalDecl, NominalKind, ValueDecl};
pub use protocol::{AssociatedTypeDecl, KnownProtocolKind, ProtocolDecl};

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};
use sigil_identity::{
    AssocTypeId, ForeignTypeId, Interner, NominalId, ProtocolId, Symbol, ValueDeclId,
};
use smallvec::SmallVec;

use crate::requirement::Requirement;
use crate::types::TypeId;

#[derive(Debug, Clone, Default)]
pub struct DeclRegistry {
    // Storage - ids are indices into these vectors
    protocols: Vec<ProtocolDecl>,
    assoc_types: Vec<AssociatedTypeDecl>,
    nominals: Vec<NominalDecl>,
    values: Vec<ValueDecl>,
    foreign_types: Vec<ForeignTypeDecl>,

    protocol_by_name: FxHashMap<Symbol, ProtocolId>,
    nominal_by_name: FxHashMap<Symbol, NominalId>,
    known_protocols: FxHashMap<KnownProtocolKind, ProtocolId>,
}

impl DeclRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Protocols =====

    pub fn add_protocol(&mut self, decl: ProtocolDecl) -> ProtocolId {
        let id = ProtocolId::new(self.protocols.len() as u32);
        self.protocol_by_name.insert(decl.name, id);
        if let Some(kind) = decl.known {
            self.known_protocols.insert(kind, id);
        }
        self.protocols.push(decl);
        id
    }

    pub fn protocol(&self, id: ProtocolId) -> &ProtocolDecl {
        &self.protocols[id.index() as usize]
    }

    pub(crate) fn protocol_mut(&mut self, id: ProtocolId) -> &mut ProtocolDecl {
        &mut self.protocols[id.index() as usize]
    }

    pub fn protocol_by_name(&self, name: Symbol) -> Option<ProtocolId> {
        self.protocol_by_name.get(&name).copied()
    }

    pub fn known_protocol(&self, kind: KnownProtocolKind) -> Option<ProtocolId> {
        self.known_protocols.get(&kind).copied()
    }

    pub fn is_known_protocol(&self, proto: ProtocolId, kind: KnownProtocolKind) -> bool {
        self.protocol(proto).known == Some(kind)
    }

    pub fn add_associated_type(&mut self, protocol: ProtocolId, name: Symbol) -> AssocTypeId {
        let id = AssocTypeId::new(self.assoc_types.len() as u32);
        self.assoc_types.push(AssociatedTypeDecl { name, protocol });
        self.protocol_mut(protocol).associated_types.push(id);
        id
    }

    pub fn assoc_type(&self, id: AssocTypeId) -> &AssociatedTypeDecl {
        &self.assoc_types[id.index() as usize]
    }

    /// Associated type `name` declared directly in `protocol`.
    pub fn find_associated_type(&self, protocol: ProtocolId, name: Symbol) -> Option<AssocTypeId> {
        self.protocol(protocol)
            .associated_types
            .iter()
            .copied()
            .find(|&assoc| self.assoc_type(assoc).name == name)
    }

    /// Append requirements on `Self` and its member types to `protocol`'s
    /// requirement signature.
    pub fn add_protocol_requirements(
        &mut self,
        protocol: ProtocolId,
        requirements: impl IntoIterator<Item = Requirement>,
    ) {
        self.protocol_mut(protocol)
            .requirement_signature
            .extend(requirements);
    }

    /// All protocols `proto` inherits from, transitively, excluding itself.
    pub fn inherited_protocols(&self, proto: ProtocolId) -> SmallVec<[ProtocolId; 4]> {
        let mut seen = FxHashSet::default();
        let mut result = SmallVec::new();
        let mut stack: SmallVec<[ProtocolId; 8]> =
            self.protocol(proto).inherited.iter().copied().collect();
        while let Some(next) = stack.pop() {
            if next == proto || !seen.insert(next) {
                continue;
            }
            result.push(next);
            stack.extend(self.protocol(next).inherited.iter().copied());
        }
        result
    }

    /// True if `proto` is `other` or inherits from it.
    pub fn inherits_from(&self, proto: ProtocolId, other: ProtocolId) -> bool {
        proto == other || self.inherited_protocols(proto).contains(&other)
    }

    pub fn protocol_requires_class(&self, proto: ProtocolId) -> bool {
        let decl = self.protocol(proto);
        decl.explicit_any_object
            || decl.superclass.is_some()
            || self
                .inherited_protocols(proto)
                .iter()
                .any(|&p| {
                    let inherited = self.protocol(p);
                    inherited.explicit_any_object || inherited.superclass.is_some()
                })
    }

    /// Superclass bound declared by `proto` or a protocol it inherits.
    pub fn protocol_superclass(&self, proto: ProtocolId) -> Option<TypeId> {
        self.protocol(proto).superclass.or_else(|| {
            self.inherited_protocols(proto)
                .iter()
                .find_map(|&p| self.protocol(p).superclass)
        })
    }

    /// Canonical protocol order: by name, then by declaration order.
    pub fn compare_protocols(&self, interner: &Interner, a: ProtocolId, b: ProtocolId) -> Ordering {
        let name_a = interner.resolve(self.protocol(a).name);
        let name_b = interner.resolve(self.protocol(b).name);
        name_a.cmp(name_b).then(a.cmp(&b))
    }

    /// Sort protocols canonically and drop ones implied by inheritance from
    /// another member of the list.
    pub fn minimize_protocols(&self, interner: &Interner, protos: &mut Vec<ProtocolId>) {
        protos.sort_by(|&a, &b| self.compare_protocols(interner, a, b));
        protos.dedup();
        let snapshot = protos.clone();
        protos.retain(|&p| {
            !snapshot
                .iter()
                .any(|&other| other != p && self.inherits_from(other, p))
        });
    }

    // ===== Nominal types =====

    pub fn add_nominal(&mut self, decl: NominalDecl) -> NominalId {
        let id = NominalId::new(self.nominals.len() as u32);
        self.nominal_by_name.insert(decl.name, id);
        self.nominals.push(decl);
        id
    }

    pub fn nominal(&self, id: NominalId) -> &NominalDecl {
        &self.nominals[id.index() as usize]
    }

    pub fn nominal_by_name(&self, name: Symbol) -> Option<NominalId> {
        self.nominal_by_name.get(&name).copied()
    }

    // ===== Members =====

    pub fn add_value(&mut self, decl: ValueDecl) -> ValueDeclId {
        let id = ValueDeclId::new(self.values.len() as u32);
        self.values.push(decl);
        id
    }

    pub fn value(&self, id: ValueDeclId) -> &ValueDecl {
        &self.values[id.index() as usize]
    }

    // ===== Foreign types =====

    pub fn add_foreign_type(&mut self, decl: ForeignTypeDecl) -> ForeignTypeId {
        let id = ForeignTypeId::new(self.foreign_types.len() as u32);
        self.foreign_types.push(decl);
        id
    }

    pub fn foreign_type(&self, id: ForeignTypeId) -> &ForeignTypeDecl {
        &self.foreign_types[id.index() as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (Interner, DeclRegistry, [ProtocolId; 4]) {
        let mut interner = Interner::new();
        let mut decls = DeclRegistry::new();
        let equatable = decls.add_protocol(ProtocolDecl::new(interner.intern("Equatable")));
        let hashable = decls.add_protocol(
            ProtocolDecl::new(interner.intern("Hashable")).with_inherited(&[equatable]),
        );
        let object = decls.add_protocol(ProtocolDecl::new(interner.intern("Object")).class_bound());
        let delegate = decls.add_protocol(
            ProtocolDecl::new(interner.intern("Delegate")).with_inherited(&[object, hashable]),
        );
        (interner, decls, [equatable, hashable, object, delegate])
    }

    #[test]
    fn inheritance_is_transitive() {
        let (_, decls, [equatable, hashable, object, delegate]) = registry();
        let inherited = decls.inherited_protocols(delegate);
        assert!(inherited.contains(&equatable));
        assert!(inherited.contains(&hashable));
        assert!(inherited.contains(&object));
        assert!(decls.inherits_from(hashable, equatable));
        assert!(!decls.inherits_from(equatable, hashable));
    }

    #[test]
    fn class_bound_is_inherited() {
        let (_, decls, [equatable, _, object, delegate]) = registry();
        assert!(decls.protocol_requires_class(object));
        assert!(decls.protocol_requires_class(delegate));
        assert!(!decls.protocol_requires_class(equatable));
    }

    #[test]
    fn minimize_protocols_drops_inherited_and_sorts() {
        let (interner, decls, [equatable, hashable, object, delegate]) = registry();
        let mut protos = vec![hashable, equatable, object];
        decls.minimize_protocols(&interner, &mut protos);
        assert_eq!(protos, vec![hashable, object]);

        let mut protos = vec![equatable, delegate];
        decls.minimize_protocols(&interner, &mut protos);
        assert_eq!(protos, vec![delegate]);
    }

    #[test]
    fn associated_types_are_found_by_name() {
        let mut interner = Interner::new();
        let mut decls = DeclRegistry::new();
        let sequence = decls.add_protocol(ProtocolDecl::new(interner.intern("Sequence")));
        let element = interner.intern("Element");
        let assoc = decls.add_associated_type(sequence, element);
        assert_eq!(decls.find_associated_type(sequence, element), Some(assoc));
        assert_eq!(decls.assoc_type(assoc).protocol, sequence);
        assert_eq!(decls.find_associated_type(sequence, interner.intern("Index")), None);
    }
}
