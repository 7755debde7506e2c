// subst/map.rs
//
// SubstitutionMap: a generic signature applied to replacement types.
//
// Maps are uniqued in the context by (signature, replacement types,
// conformances), so they are compared and hashed by handle. The map of a
// null signature has no storage at all and is a valid no-op substitution.

use std::fmt::Write as _;
use std::hash::BuildHasher;

use rustc_hash::FxBuildHasher;
use sigil_identity::ProtocolId;

use super::in_flight::{FnSource, InFlightSubstitution, SubstSource, lookup_in_context};
use super::options::SubstOptions;
use crate::conformance::ProtocolConformanceRef;
use crate::context::GenericContext;
use crate::decls::KnownProtocolKind;
use crate::requirement::Requirement;
use crate::signature::{CanGenericSignature, GenericSignature, map_out_of_context};
use crate::types::{TypeId, TypeIdVec};

/// Index of a map in its context's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubstMapId(u32);

/// Handle to a uniqued substitution map. `Default` is the empty map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubstitutionMap(Option<SubstMapId>);

#[derive(Debug)]
struct SubstMapStorage {
    signature: GenericSignature,
    replacement_types: Box<[TypeId]>,
    /// One per conformance requirement of `signature`, in order.
    conformances: Box<[ProtocolConformanceRef]>,
}

type SubstMapKey = (GenericSignature, Box<[TypeId]>, Box<[ProtocolConformanceRef]>);

#[derive(Debug, Default)]
pub(crate) struct SubstMapTable {
    storage: Vec<SubstMapStorage>,
    lookup: hashbrown::HashMap<SubstMapKey, SubstMapId, FxBuildHasher>,
}

impl SubstMapTable {
    fn intern(
        &mut self,
        signature: GenericSignature,
        types: &[TypeId],
        conformances: &[ProtocolConformanceRef],
    ) -> (SubstMapId, bool) {
        use hashbrown::hash_map::RawEntryMut;

        let hash = self.lookup.hasher().hash_one((signature, types, conformances));
        match self.lookup.raw_entry_mut().from_hash(hash, |(s, t, c)| {
            *s == signature && **t == *types && **c == *conformances
        }) {
            RawEntryMut::Occupied(e) => (*e.get(), false),
            RawEntryMut::Vacant(e) => {
                let id = SubstMapId(self.storage.len() as u32);
                self.storage.push(SubstMapStorage {
                    signature,
                    replacement_types: types.into(),
                    conformances: conformances.into(),
                });
                e.insert_hashed_nocheck(hash, (signature, types.into(), conformances.into()), id);
                (id, true)
            }
        }
    }

    fn get(&self, id: SubstMapId) -> &SubstMapStorage {
        &self.storage[id.0 as usize]
    }
}

/// Output format of `SubstitutionMap::dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStyle {
    /// One `param -> replacement` line per parameter.
    Minimal,
    /// Parameters plus every conformance slot.
    Full,
}

// ============================================================================
// Construction
// ============================================================================

impl SubstitutionMap {
    pub const EMPTY: SubstitutionMap = SubstitutionMap(None);

    /// Unique a map from its parts.
    ///
    /// `replacement_types` has one entry per generic parameter and
    /// `conformances` one per conformance requirement of `signature`.
    pub fn get(
        ctx: &mut GenericContext,
        signature: GenericSignature,
        replacement_types: &[TypeId],
        conformances: &[ProtocolConformanceRef],
    ) -> SubstitutionMap {
        if signature.is_null() {
            debug_assert!(
                replacement_types.is_empty() && conformances.is_empty(),
                "INTERNAL ERROR: replacements for a null signature"
            );
            return SubstitutionMap::EMPTY;
        }
        debug_assert_eq!(
            replacement_types.len(),
            signature.generic_params(ctx).len(),
            "INTERNAL ERROR: one replacement type per generic parameter"
        );
        debug_assert_eq!(
            conformances.len(),
            signature.num_conformance_requirements(ctx),
            "INTERNAL ERROR: one conformance per conformance requirement"
        );
        let (id, is_new) = ctx
            .subst_maps
            .intern(signature, replacement_types, conformances);
        let map = SubstitutionMap(Some(id));
        if is_new && ctx.config().verify_substitution_maps {
            map.verify(ctx, true);
        }
        map
    }

    /// Build a map by asking `source` for each parameter's replacement and
    /// each conformance requirement's conformance, in signature order.
    pub fn get_with_source(
        ctx: &mut GenericContext,
        signature: GenericSignature,
        source: &mut dyn SubstSource,
    ) -> SubstitutionMap {
        let mut ifs = InFlightSubstitution::new(ctx, source, SubstOptions::empty());
        SubstitutionMap::get_in_flight(ctx, signature, &mut ifs)
    }

    /// Build a map from a pair of callbacks. A parameter the type callback
    /// returns `None` for is replaced by itself.
    pub fn get_with<F, G>(ctx: &mut GenericContext, signature: GenericSignature, subst: F, lookup: G) -> SubstitutionMap
    where
        F: FnMut(&mut GenericContext, TypeId) -> Option<TypeId>,
        G: FnMut(&mut GenericContext, TypeId, TypeId, ProtocolId) -> ProtocolConformanceRef,
    {
        let mut source = FnSource::new(subst, lookup);
        SubstitutionMap::get_with_source(ctx, signature, &mut source)
    }

    /// Build a map with the state of a substitution in progress, so pack
    /// expansions being expanded are honored.
    pub fn get_in_flight(
        ctx: &mut GenericContext,
        signature: GenericSignature,
        ifs: &mut InFlightSubstitution<'_>,
    ) -> SubstitutionMap {
        if signature.is_null() {
            return SubstitutionMap::EMPTY;
        }
        let params = signature.generic_params(ctx).to_vec();
        let types: Vec<TypeId> = params.iter().map(|&param| ifs.subst_type(ctx, param)).collect();
        let requirements = signature.requirements(ctx).to_vec();
        let mut conformances = Vec::with_capacity(signature.num_conformance_requirements(ctx));
        for req in requirements {
            if let Some(protocol) = req.protocol() {
                let subject = ctx.types.canonical_type(req.first_type());
                conformances.push(ifs.lookup_conformance(ctx, subject, protocol, 0));
            }
        }
        tracing::trace!(
            signature = ?signature.id(),
            params = types.len(),
            conformances = conformances.len(),
            "built substitution map"
        );
        SubstitutionMap::get(ctx, signature, &types, &conformances)
    }

    /// Build a map from replacement types, looking conformances up with
    /// `lookup`.
    pub fn get_with_lookup<G>(
        ctx: &mut GenericContext,
        signature: GenericSignature,
        replacement_types: &[TypeId],
        lookup: G,
    ) -> SubstitutionMap
    where
        G: FnMut(&mut GenericContext, TypeId, TypeId, ProtocolId) -> ProtocolConformanceRef,
    {
        let params = signature.generic_params(ctx).to_vec();
        debug_assert_eq!(
            params.len(),
            replacement_types.len(),
            "INTERNAL ERROR: one replacement type per generic parameter"
        );
        let subst = |ctx: &mut GenericContext, param: TypeId| {
            let key = ctx.types.generic_param_key(param);
            params
                .iter()
                .position(|&p| ctx.types.generic_param_key(p) == key)
                .and_then(|index| replacement_types.get(index).copied())
        };
        SubstitutionMap::get_with(ctx, signature, subst, lookup)
    }

    /// Map each parameter to itself, with abstract conformances. Pack
    /// parameters map to `Pack{repeat each T}`; parameters the signature
    /// binds to a concrete type map to that type.
    pub fn identity(ctx: &mut GenericContext, signature: GenericSignature) -> SubstitutionMap {
        if signature.is_null() {
            return SubstitutionMap::EMPTY;
        }
        let has_same_type = signature
            .requirements(ctx)
            .iter()
            .any(|req| matches!(req, Requirement::SameType { .. }));
        let params = signature.generic_params(ctx).to_vec();
        let types: Vec<TypeId> = params
            .into_iter()
            .map(|param| {
                let param = ctx.types.canonical_type(param);
                if ctx.types.is_parameter_pack(param) {
                    let expansion = ctx.types.pack_expansion(param, param);
                    return ctx.types.pack(TypeIdVec::from_slice(&[expansion]));
                }
                if has_same_type {
                    return signature.concrete_type(ctx, param).unwrap_or(param);
                }
                param
            })
            .collect();
        let conformances: Vec<ProtocolConformanceRef> = signature
            .requirements(ctx)
            .iter()
            .filter_map(|req| Some((req.first_type(), req.protocol()?)))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|(subject, protocol)| {
                ProtocolConformanceRef::for_abstract(ctx.types.canonical_type(subject), protocol)
            })
            .collect();
        SubstitutionMap::get(ctx, signature, &types, &conformances)
    }

    /// The map for a protocol's `<Self where Self: P>` signature.
    pub fn protocol_substitutions(
        ctx: &mut GenericContext,
        protocol: ProtocolId,
        self_type: TypeId,
        conformance: ProtocolConformanceRef,
    ) -> SubstitutionMap {
        let signature = CanGenericSignature::for_protocol(ctx, protocol);
        SubstitutionMap::get(ctx, signature.as_signature(), &[self_type], &[conformance])
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl SubstitutionMap {
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0.is_none()
    }

    pub fn id(self) -> Option<SubstMapId> {
        self.0
    }

    pub fn generic_signature(self, ctx: &GenericContext) -> GenericSignature {
        self.0
            .map_or(GenericSignature::NULL, |id| ctx.subst_maps.get(id).signature)
    }

    pub fn replacement_types(self, ctx: &GenericContext) -> &[TypeId] {
        match self.0 {
            Some(id) => &ctx.subst_maps.get(id).replacement_types,
            None => &[],
        }
    }

    /// Replacements for the innermost parameters only.
    pub fn innermost_replacement_types(self, ctx: &GenericContext) -> &[TypeId] {
        let signature = self.generic_signature(ctx);
        let all = self.replacement_types(ctx);
        let innermost = signature.innermost_generic_params(ctx).len();
        &all[all.len() - innermost..]
    }

    pub fn conformances(self, ctx: &GenericContext) -> &[ProtocolConformanceRef] {
        match self.0 {
            Some(id) => &ctx.subst_maps.get(id).conformances,
            None => &[],
        }
    }

    /// Whether any parameter is left free by the signature.
    pub fn has_any_substitutable_params(self, ctx: &mut GenericContext) -> bool {
        let signature = self.generic_signature(ctx);
        !signature.is_null() && !signature.are_all_params_concrete(ctx)
    }

    /// Whether this is the identity map of its signature.
    pub fn is_identity(self, ctx: &mut GenericContext) -> bool {
        if self.is_empty() {
            return true;
        }
        let canonical = self.canonical(ctx);
        let signature = canonical.generic_signature(ctx);
        SubstitutionMap::identity(ctx, signature) == canonical
    }

    pub fn is_canonical(self, ctx: &GenericContext) -> bool {
        let Some(id) = self.0 else {
            return true;
        };
        let storage = ctx.subst_maps.get(id);
        storage.signature.is_canonical(ctx)
            && storage.replacement_types.iter().all(|&ty| ctx.types.is_canonical(ty))
            && storage.conformances.iter().all(|c| c.is_canonical(ctx))
    }

    /// The same substitution over the canonical signature, with canonical
    /// replacement types and conformances.
    pub fn canonical(self, ctx: &mut GenericContext) -> SubstitutionMap {
        if self.is_canonical(ctx) {
            return self;
        }
        let signature = self.generic_signature(ctx);
        let canonical_sig = signature.canonical_signature(ctx).as_signature();
        let map = if canonical_sig == signature {
            self
        } else {
            self.translate(ctx, canonical_sig)
        };
        let types: Vec<TypeId> = map
            .replacement_types(ctx)
            .to_vec()
            .into_iter()
            .map(|ty| ctx.types.canonical_type(ty))
            .collect();
        let conformances: Vec<ProtocolConformanceRef> = map
            .conformances(ctx)
            .to_vec()
            .into_iter()
            .map(|c| c.canonical(ctx))
            .collect();
        SubstitutionMap::get(ctx, canonical_sig, &types, &conformances)
    }

    /// Replacement for `param`, or `None` if it is not a parameter of this
    /// map's signature.
    pub fn lookup_substitution(self, ctx: &GenericContext, param: TypeId) -> Option<TypeId> {
        let key = ctx.types.generic_param_key(param)?;
        let signature = self.generic_signature(ctx);
        let index = signature
            .generic_params(ctx)
            .iter()
            .position(|&p| ctx.types.generic_param_key(p) == Some(key))?;
        self.replacement_types(ctx).get(index).copied()
    }

    /// Conformance of the type parameter `ty` to `protocol` under this map.
    ///
    /// Conformances stated by the signature are read from their slot;
    /// implied ones are derived by following the conformance path from a
    /// stated one through associated conformances.
    pub fn lookup_conformance(
        self,
        ctx: &mut GenericContext,
        ty: TypeId,
        protocol: ProtocolId,
    ) -> ProtocolConformanceRef {
        if self.is_empty() {
            return ProtocolConformanceRef::Invalid;
        }
        let ty = ctx.types.canonical_type(ty);
        if let Some(conformance) = self.signature_conformance(ctx, ty, protocol) {
            return conformance;
        }
        let signature = self.generic_signature(ctx);
        let invertible = ctx
            .decls
            .protocol(protocol)
            .known
            .and_then(KnownProtocolKind::invertible)
            .is_some();
        if invertible || signature.is_concrete_type(ctx, ty) {
            let substituted = ctx.subst_type(ty, self, SubstOptions::empty());
            return ctx.lookup_conformance(substituted, protocol);
        }
        if !signature.requires_protocol(ctx, ty, protocol) {
            return ProtocolConformanceRef::Invalid;
        }

        let path = signature.conformance_path(ctx, ty, protocol);
        let mut steps = path.iter();
        let Some((root, root_protocol)) = steps.next() else {
            return ProtocolConformanceRef::Invalid;
        };
        let mut conformance = self.root_conformance(ctx, root, root_protocol);
        for (subject, step_protocol) in steps {
            if conformance.is_invalid() {
                break;
            }
            conformance = conformance.associated_conformance(ctx, subject, step_protocol);
        }
        conformance
    }

    /// The conformance slot for `subject: protocol`, matched exactly.
    fn signature_conformance(
        self,
        ctx: &mut GenericContext,
        subject: TypeId,
        protocol: ProtocolId,
    ) -> Option<ProtocolConformanceRef> {
        let signature = self.generic_signature(ctx);
        let requirements = signature.requirements(ctx).to_vec();
        let index = requirements
            .iter()
            .filter_map(|req| Some((req.first_type(), req.protocol()?)))
            .position(|(first, p)| p == protocol && ctx.types.canonical_type(first) == subject)?;
        self.conformances(ctx).get(index).copied()
    }

    /// The slot a conformance path starts from. The path names the reduced
    /// subject; a non-canonical signature may have stated it differently.
    fn root_conformance(self, ctx: &mut GenericContext, subject: TypeId, protocol: ProtocolId) -> ProtocolConformanceRef {
        if let Some(conformance) = self.signature_conformance(ctx, subject, protocol) {
            return conformance;
        }
        let signature = self.generic_signature(ctx);
        let requirements = signature.requirements(ctx).to_vec();
        let slots = requirements
            .iter()
            .filter_map(|req| Some((req.first_type(), req.protocol()?)))
            .enumerate()
            .collect::<Vec<_>>();
        for (index, (first, p)) in slots {
            if p == protocol && signature.are_reduced_type_parameters_equal(ctx, first, subject) {
                return self.conformances(ctx)[index];
            }
        }
        ProtocolConformanceRef::Invalid
    }

    // ========================================================================
    // Composition
    // ========================================================================

    /// Substitute `other` into this map's replacement types and
    /// conformances. The signature is unchanged.
    pub fn subst(self, ctx: &mut GenericContext, other: SubstitutionMap, options: SubstOptions) -> SubstitutionMap {
        let mut source = other;
        let mut ifs = InFlightSubstitution::new(ctx, &mut source, options);
        self.subst_in_flight(ctx, &mut ifs)
    }

    /// Substitute through a pair of callbacks.
    pub fn subst_with<F, G>(self, ctx: &mut GenericContext, subst: F, lookup: G, options: SubstOptions) -> SubstitutionMap
    where
        F: FnMut(&mut GenericContext, TypeId) -> Option<TypeId>,
        G: FnMut(&mut GenericContext, TypeId, TypeId, ProtocolId) -> ProtocolConformanceRef,
    {
        let mut source = FnSource::new(subst, lookup);
        let mut ifs = InFlightSubstitution::new(ctx, &mut source, options);
        self.subst_in_flight(ctx, &mut ifs)
    }

    pub fn subst_in_flight(self, ctx: &mut GenericContext, ifs: &mut InFlightSubstitution<'_>) -> SubstitutionMap {
        if self.is_empty() {
            return self;
        }
        let signature = self.generic_signature(ctx);
        let types: Vec<TypeId> = self
            .replacement_types(ctx)
            .to_vec()
            .into_iter()
            .map(|ty| ifs.subst_type(ctx, ty))
            .collect();
        let conformances: Vec<ProtocolConformanceRef> = self
            .conformances(ctx)
            .to_vec()
            .into_iter()
            .map(|conformance| conformance.subst(ctx, ifs))
            .collect();
        SubstitutionMap::get(ctx, signature, &types, &conformances)
    }

    /// The same substitution re-keyed to `signature`, which must have the
    /// same generic parameters.
    pub fn translate(self, ctx: &mut GenericContext, signature: GenericSignature) -> SubstitutionMap {
        if self.generic_signature(ctx) == signature {
            return self;
        }
        let this = self;
        SubstitutionMap::get_with(
            ctx,
            signature,
            |ctx, param| this.lookup_substitution(ctx, param),
            |ctx, orig, subst, protocol| {
                let conformance = this.lookup_conformance(ctx, orig, protocol);
                if conformance.is_invalid() {
                    ctx.lookup_conformance(subst, protocol)
                } else {
                    conformance
                }
            },
        )
    }

    /// Replace primary archetypes in the replacement types with their
    /// interface types.
    pub fn map_replacement_types_out_of_context(self, ctx: &mut GenericContext) -> SubstitutionMap {
        self.subst_with(
            ctx,
            |_, _| None,
            lookup_in_context,
            SubstOptions::SUBSTITUTE_PRIMARY_ARCHETYPES,
        )
    }

    // ========================================================================
    // Verification and display
    // ========================================================================

    /// Check the map's internal consistency.
    ///
    /// # Panics
    /// On an inconsistent map: wrong arity, a pack parameter replaced by a
    /// non-pack, a conformance for the wrong type or protocol, or (unless
    /// `allow_invalid`) an invalid conformance.
    pub fn verify(self, ctx: &mut GenericContext, allow_invalid: bool) {
        let Some(id) = self.0 else {
            return;
        };
        let signature = ctx.subst_maps.get(id).signature;
        let params = signature.generic_params(ctx).to_vec();
        let types = self.replacement_types(ctx).to_vec();
        assert_eq!(
            params.len(),
            types.len(),
            "INTERNAL ERROR: substitution map has the wrong number of replacement types"
        );
        for (&param, &ty) in params.iter().zip(&types) {
            if ty.is_error() {
                continue;
            }
            let is_pack_param = ctx.types.is_parameter_pack(param);
            let is_pack = ctx.types.pack_elements(ty).is_some();
            assert!(
                !is_pack_param || is_pack || ctx.types.is_parameter_pack(ty),
                "INTERNAL ERROR: pack parameter {} replaced by non-pack {}",
                ctx.display_type(param),
                ctx.display_type(ty)
            );
            assert!(
                is_pack_param || !is_pack,
                "INTERNAL ERROR: scalar parameter {} replaced by pack {}",
                ctx.display_type(param),
                ctx.display_type(ty)
            );
        }
        let requirements = signature.requirements(ctx).to_vec();
        let conformances = self.conformances(ctx).to_vec();
        let slots: Vec<(TypeId, ProtocolId)> = requirements
            .iter()
            .filter_map(|req| Some((req.first_type(), req.protocol()?)))
            .collect();
        assert_eq!(
            slots.len(),
            conformances.len(),
            "INTERNAL ERROR: substitution map has the wrong number of conformances"
        );
        for ((subject, protocol), conformance) in slots.into_iter().zip(conformances) {
            if conformance.is_invalid() {
                assert!(
                    allow_invalid,
                    "INTERNAL ERROR: invalid conformance for {}",
                    ctx.display_type(subject)
                );
                continue;
            }
            assert_eq!(
                conformance.protocol(ctx),
                Some(protocol),
                "INTERNAL ERROR: conformance for the wrong protocol"
            );
            if conformance.is_abstract() {
                let conforming = conformance.conforming_type(ctx);
                assert!(
                    ctx.types.get(ctx.types.look_through_sugar(conforming)).is_abstract_conformer(),
                    "INTERNAL ERROR: abstract conformance of concrete type {}",
                    ctx.display_type(conforming)
                );
            }
        }
    }

    /// Human-readable listing of the map, for debugging and tests.
    pub fn dump(self, ctx: &GenericContext, style: DumpStyle) -> String {
        let Some(id) = self.0 else {
            return "<empty>".to_string();
        };
        let storage = ctx.subst_maps.get(id);
        let mut out = String::new();
        let params = storage.signature.generic_params(ctx);
        for (&param, &ty) in params.iter().zip(storage.replacement_types.iter()) {
            let _ = writeln!(out, "{} -> {}", ctx.display_type(param), ctx.display_type(ty));
        }
        if style == DumpStyle::Full {
            let slots = storage
                .signature
                .requirements(ctx)
                .iter()
                .filter(|req| req.protocol().is_some());
            for (req, conformance) in slots.zip(storage.conformances.iter()) {
                let _ = writeln!(
                    out,
                    "conformance {} -> {}",
                    ctx.display_requirement(*req),
                    conformance.display(ctx)
                );
            }
        }
        out
    }
}

/// Substitution through a map: its parameters are replaced, and conformances
/// of type parameters are found through the map.
impl SubstSource for SubstitutionMap {
    fn replacement(&mut self, ctx: &mut GenericContext, param: TypeId) -> Option<TypeId> {
        self.lookup_substitution(ctx, param)
    }

    fn conformance(
        &mut self,
        ctx: &mut GenericContext,
        orig: TypeId,
        subst: TypeId,
        protocol: ProtocolId,
    ) -> ProtocolConformanceRef {
        if !ctx.types.is_type_parameter(orig) {
            return ctx.lookup_conformance(subst, protocol);
        }
        let conformance = self.lookup_conformance(ctx, orig, protocol);
        if conformance.is_invalid() && !self.generic_signature(ctx).is_null() {
            tracing::trace!(
                ty = %ctx.display_type(orig),
                "no conformance through substitution map"
            );
        }
        conformance
    }
}

impl GenericContext {
    /// Apply `map` to `ty`.
    pub fn subst_type(&mut self, ty: TypeId, map: SubstitutionMap, options: SubstOptions) -> TypeId {
        let mut source = map;
        let mut ifs = InFlightSubstitution::new(self, &mut source, options);
        ifs.subst_type(self, ty)
    }

    /// Replace primary archetypes in `ty` with their interface types.
    pub fn map_type_out_of_context(&mut self, ty: TypeId) -> TypeId {
        map_out_of_context(self, ty)
    }
}
