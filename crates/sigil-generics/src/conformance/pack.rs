// conformance/pack.rs
//
// Conformance of a pack type: one conformance per pack element. For an
// expansion element `repeat P` the element conformance is the conformance
// of the pattern `P`, and every projection keeps the element an expansion
// with the same count.

use std::hash::BuildHasher;

use rustc_hash::FxBuildHasher;
use sigil_identity::{AssocTypeId, ProtocolId};

use super::ProtocolConformanceRef;
use crate::context::GenericContext;
use crate::subst::InFlightSubstitution;
use crate::types::{TypeId, TypeIdVec};

/// Handle to a uniqued pack conformance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackConformance(u32);

#[derive(Debug)]
struct PackData {
    ty: TypeId,
    protocol: ProtocolId,
    elements: Box<[ProtocolConformanceRef]>,
}

type PackKey = (TypeId, ProtocolId, Box<[ProtocolConformanceRef]>);

#[derive(Debug, Default)]
pub(crate) struct PackTable {
    data: Vec<PackData>,
    lookup: hashbrown::HashMap<PackKey, PackConformance, FxBuildHasher>,
}

impl PackTable {
    fn intern(
        &mut self,
        ty: TypeId,
        protocol: ProtocolId,
        elements: &[ProtocolConformanceRef],
    ) -> PackConformance {
        use hashbrown::hash_map::RawEntryMut;

        let hash = self.lookup.hasher().hash_one((ty, protocol, elements));
        match self
            .lookup
            .raw_entry_mut()
            .from_hash(hash, |(t, p, e)| *t == ty && *p == protocol && **e == *elements)
        {
            RawEntryMut::Occupied(e) => *e.get(),
            RawEntryMut::Vacant(e) => {
                let id = PackConformance(self.data.len() as u32);
                self.data.push(PackData {
                    ty,
                    protocol,
                    elements: elements.into(),
                });
                e.insert_hashed_nocheck(hash, (ty, protocol, elements.into()), id);
                id
            }
        }
    }

    fn get(&self, id: PackConformance) -> &PackData {
        &self.data[id.0 as usize]
    }
}

impl PackConformance {
    /// Unique the conformance of pack type `ty` to `protocol`.
    ///
    /// # Panics
    /// If `ty` is not a pack with one element per conformance.
    pub fn get(
        ctx: &mut GenericContext,
        ty: TypeId,
        protocol: ProtocolId,
        elements: &[ProtocolConformanceRef],
    ) -> PackConformance {
        let count = ctx.types.pack_elements(ty).map(<[TypeId]>::len);
        assert_eq!(
            count,
            Some(elements.len()),
            "INTERNAL ERROR: pack conformance needs one conformance per pack element"
        );
        ctx.conformances.packs.intern(ty, protocol, elements)
    }

    pub fn conforming_type(self, ctx: &GenericContext) -> TypeId {
        ctx.conformances.packs.get(self).ty
    }

    pub fn protocol(self, ctx: &GenericContext) -> ProtocolId {
        ctx.conformances.packs.get(self).protocol
    }

    /// Per-element conformances; pattern conformances for expansions.
    pub fn elements(self, ctx: &GenericContext) -> &[ProtocolConformanceRef] {
        &ctx.conformances.packs.get(self).elements
    }

    fn parts(self, ctx: &GenericContext) -> (Vec<TypeId>, Vec<ProtocolConformanceRef>) {
        let data = ctx.conformances.packs.get(self);
        let types = ctx.types.pack_elements(data.ty).unwrap_or_default().to_vec();
        (types, data.elements.to_vec())
    }

    /// The pack of `assoc` witnesses, one per element, with expansion
    /// elements projected through their pattern.
    pub fn type_witness(self, ctx: &mut GenericContext, assoc: AssocTypeId) -> TypeId {
        let (types, elements) = self.parts(ctx);
        let mut witnesses = TypeIdVec::with_capacity(types.len());
        for (ty, conformance) in types.into_iter().zip(elements) {
            let witness = conformance.type_witness(ctx, assoc);
            witnesses.push(match ctx.types.pack_expansion_parts(ty) {
                Some((_, count)) => ctx.types.pack_expansion(witness, count),
                None => witness,
            });
        }
        ctx.types.pack(witnesses)
    }

    /// A new pack conformance of the `subject` pack (over `Self`) to
    /// `protocol`.
    pub fn associated_conformance(
        self,
        ctx: &mut GenericContext,
        subject: TypeId,
        protocol: ProtocolId,
    ) -> ProtocolConformanceRef {
        let (types, elements) = self.parts(ctx);
        let mut subject_types = TypeIdVec::with_capacity(types.len());
        let mut conformances = Vec::with_capacity(types.len());
        for (ty, conformance) in types.into_iter().zip(elements) {
            let associated = conformance.associated_conformance(ctx, subject, protocol);
            let member = associated.conforming_type(ctx);
            subject_types.push(match ctx.types.pack_expansion_parts(ty) {
                Some((_, count)) => ctx.types.pack_expansion(member, count),
                None => member,
            });
            conformances.push(associated);
        }
        let pack = ctx.types.pack(subject_types);
        ProtocolConformanceRef::Pack(PackConformance::get(ctx, pack, protocol, &conformances))
    }

    /// Substitute element-wise. An expansion element may expand into any
    /// number of components, so the result is accumulated as it goes.
    pub fn subst(self, ctx: &mut GenericContext, ifs: &mut InFlightSubstitution<'_>) -> ProtocolConformanceRef {
        let protocol = self.protocol(ctx);
        let (types, elements) = self.parts(ctx);
        let mut subst_types = TypeIdVec::new();
        let mut conformances = Vec::new();
        for (ty, conformance) in types.into_iter().zip(elements) {
            let Some((pattern, count)) = ctx.types.pack_expansion_parts(ty) else {
                subst_types.push(ifs.subst_type(ctx, ty));
                conformances.push(conformance.subst(ctx, ifs));
                continue;
            };
            ifs.expand_pack_expansion_shape(ctx, count, &mut |ctx, ifs, shape| {
                let component = ifs.subst_type(ctx, pattern);
                subst_types.push(match shape {
                    Some(shape) => ctx.types.pack_expansion(component, shape),
                    None => component,
                });
                conformances.push(conformance.subst(ctx, ifs));
            });
        }
        let pack = ctx.types.pack(subst_types);
        ProtocolConformanceRef::Pack(PackConformance::get(ctx, pack, protocol, &conformances))
    }

    pub fn is_canonical(self, ctx: &GenericContext) -> bool {
        let data = ctx.conformances.packs.get(self);
        ctx.types.is_canonical(data.ty) && data.elements.iter().all(|c| c.is_canonical(ctx))
    }

    pub fn canonical(self, ctx: &mut GenericContext) -> PackConformance {
        if self.is_canonical(ctx) {
            return self;
        }
        let protocol = self.protocol(ctx);
        let ty = self.conforming_type(ctx);
        let ty = ctx.types.canonical_type(ty);
        let elements: Vec<ProtocolConformanceRef> = self
            .elements(ctx)
            .to_vec()
            .into_iter()
            .map(|c| c.canonical(ctx))
            .collect();
        PackConformance::get(ctx, ty, protocol, &elements)
    }
}
