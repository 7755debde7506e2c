// conformance/lookup.rs
//
// Global conformance lookup: does a type conform to a protocol, and with
// which conformance? This is the lookup substitution falls back on for
// types that are not type parameters of the map being applied.

use sigil_identity::ProtocolId;

use super::{ConcreteConformance, ConformingDecl, PackConformance, ProtocolConformanceRef};
use crate::context::GenericContext;
use crate::decls::KnownProtocolKind;
use crate::existential::ExistentialLayout;
use crate::signature::GenericSignature;
use crate::types::{Ty, TypeId};

impl GenericContext {
    /// Find the conformance of `ty` to `protocol`, or the invalid
    /// conformance.
    pub fn lookup_conformance(&mut self, ty: TypeId, protocol: ProtocolId) -> ProtocolConformanceRef {
        let ty = self.types.canonical_type(ty);
        if self.types.is_type_parameter(ty) {
            return ProtocolConformanceRef::for_abstract(ty, protocol);
        }
        match self.types.get(ty).clone() {
            Ty::Error => ProtocolConformanceRef::Invalid,
            Ty::Archetype {
                signature,
                interface,
                ..
            } => {
                let sig = GenericSignature::from_id(signature);
                if sig.requires_protocol(self, interface, protocol) {
                    return ProtocolConformanceRef::for_abstract(ty, protocol);
                }
                match sig.superclass_bound(self, interface) {
                    Some(superclass) => {
                        let superclass = sig.map_type_into_context(self, superclass);
                        self.lookup_conformance(superclass, protocol)
                    }
                    None => ProtocolConformanceRef::Invalid,
                }
            }
            Ty::Nominal { decl, .. } => self.lookup_nominal_conformance(ty, decl, protocol),
            Ty::Foreign(decl) => match self
                .conformances
                .concrete
                .normal(ConformingDecl::Foreign(decl), protocol)
            {
                Some(conformance) => ProtocolConformanceRef::Concrete(conformance),
                None => self.builtin_if(ty, protocol, self.is_invertible(protocol)),
            },
            Ty::Pack(elements) => {
                let conformances: Vec<ProtocolConformanceRef> = elements
                    .iter()
                    .map(|&element| {
                        let pattern = self
                            .types
                            .pack_expansion_parts(element)
                            .map_or(element, |(pattern, _)| pattern);
                        self.lookup_conformance(pattern, protocol)
                    })
                    .collect();
                ProtocolConformanceRef::Pack(PackConformance::get(self, ty, protocol, &conformances))
            }
            Ty::PackExpansion { pattern, .. } => self.lookup_conformance(pattern, protocol),
            Ty::Tuple(elements) => {
                let conforms = self.decls.protocol(protocol).is_marker
                    && elements
                        .iter()
                        .all(|&element| !self.lookup_conformance(element, protocol).is_invalid());
                self.builtin_if(ty, protocol, conforms)
            }
            Ty::Function { .. } | Ty::Metatype(_) => {
                let conforms = self.decls.protocol(protocol).is_marker;
                self.builtin_if(ty, protocol, conforms)
            }
            Ty::Existential(_) => {
                let conforms = self.existential_self_conforms(ty, protocol);
                self.builtin_if(ty, protocol, conforms)
            }
            Ty::GenericParam { .. }
            | Ty::DependentMember { .. }
            | Ty::PackElement { .. }
            | Ty::Protocol(_)
            | Ty::ParameterizedProtocol { .. }
            | Ty::Composition { .. }
            | Ty::Sugar { .. } => ProtocolConformanceRef::Invalid,
        }
    }

    fn lookup_nominal_conformance(
        &mut self,
        ty: TypeId,
        decl: sigil_identity::NominalId,
        protocol: ProtocolId,
    ) -> ProtocolConformanceRef {
        if let Some(normal) = self
            .conformances
            .concrete
            .normal(ConformingDecl::Nominal(decl), protocol)
        {
            if self.decls.nominal(decl).signature.is_null() {
                return ProtocolConformanceRef::Concrete(normal);
            }
            let map = self.context_substitution_map(ty, decl);
            return ProtocolConformanceRef::Concrete(ConcreteConformance::specialize(self, normal, map));
        }
        // Subclasses inherit their superclass's conformances.
        if let Some(superclass) = self.superclass_of(ty) {
            let inherited = self.lookup_conformance(superclass, protocol);
            if !inherited.is_invalid() {
                return inherited;
            }
        }
        let implicit = self.is_invertible(protocol);
        self.builtin_if(ty, protocol, implicit)
    }

    /// Existentials conform to a protocol they contain when it is a marker,
    /// foreign or the error protocol, and to the invertible protocols they
    /// do not suppress.
    fn existential_self_conforms(&mut self, ty: TypeId, protocol: ProtocolId) -> bool {
        let layout = ExistentialLayout::new(self, ty);
        let decl = self.decls.protocol(protocol);
        if let Some(invertible) = decl.known.and_then(KnownProtocolKind::invertible) {
            return !layout.inverses.contains(invertible.as_set());
        }
        let self_conforming = decl.is_marker
            || decl.is_foreign
            || decl.known == Some(KnownProtocolKind::Error);
        self_conforming
            && layout
                .protocols
                .iter()
                .any(|&member| member == protocol || self.decls.inherits_from(member, protocol))
    }

    fn is_invertible(&self, protocol: ProtocolId) -> bool {
        self.decls
            .protocol(protocol)
            .known
            .and_then(KnownProtocolKind::invertible)
            .is_some()
    }

    fn builtin_if(&mut self, ty: TypeId, protocol: ProtocolId, conforms: bool) -> ProtocolConformanceRef {
        if conforms {
            ProtocolConformanceRef::Concrete(ConcreteConformance::builtin(self, ty, protocol))
        } else {
            ProtocolConformanceRef::Invalid
        }
    }
}
