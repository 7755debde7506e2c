//! Generic signatures: uniqued `(parameters, requirements)` pairs.
//!
//! A `GenericSignature` is a handle into the context's signature table; two
//! `get` calls with structurally equal contents return the same handle, so
//! handle equality is content equality. The null signature (no handle)
//! stands for "not generic".
//!
//! Signatures are built in one of two states. A signature created from
//! arbitrary written requirements is not canonical; the first call to
//! `canonical_signature` minimizes its requirements through the requirement
//! machine and caches the result. A signature created with
//! `is_known_canonical` is its own canonical signature. There is no way back
//! from canonical to non-canonical.

mod builder;
mod environment;
mod flags;
mod path;
mod query;


pub use builder::{BuiltSignature, SignatureRequest, build_generic_signature};
pub(crate) use environment::map_out_of_context;
pub use flags::GenericSignatureErrors;
pub use path::ConformancePath;
pub use query::{LocalRequirements, RequirementsWithInverses};

use std::hash::BuildHasher;
use std::ops::Deref;

use rustc_hash::FxBuildHasher;

use crate::context::GenericContext;
use crate::machine;
use crate::requirement::{Requirement, WrittenRequirement};
use crate::types::TypeId;

/// Index of a signature in its context's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignatureId(u32);

impl SignatureId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Handle to a uniqued generic signature, or the null signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GenericSignature(Option<SignatureId>);

/// A signature known to be in canonical (minimized) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CanGenericSignature(GenericSignature);

impl Deref for CanGenericSignature {
    type Target = GenericSignature;

    fn deref(&self) -> &GenericSignature {
        &self.0
    }
}

impl From<CanGenericSignature> for GenericSignature {
    fn from(sig: CanGenericSignature) -> Self {
        sig.0
    }
}

impl CanGenericSignature {
    pub const NULL: CanGenericSignature = CanGenericSignature(GenericSignature::NULL);

    pub fn as_signature(self) -> GenericSignature {
        self.0
    }
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug)]
struct SignatureStorage {
    params: Vec<TypeId>,
    requirements: Vec<Requirement>,
    num_conformances: usize,
    /// Set once known; equal to the signature's own id when it is canonical.
    canonical: Option<SignatureId>,
    errors: GenericSignatureErrors,
}

type SignatureKey = (Box<[TypeId]>, Box<[Requirement]>);

/// Uniquing table for signatures, owned by the context.
#[derive(Debug, Default)]
pub(crate) struct SignatureTable {
    storage: Vec<SignatureStorage>,
    lookup: hashbrown::HashMap<SignatureKey, SignatureId, FxBuildHasher>,
}

impl SignatureTable {
    fn intern(&mut self, params: &[TypeId], requirements: &[Requirement]) -> SignatureId {
        use hashbrown::hash_map::RawEntryMut;

        // Slices hash like the boxed key, so lookups need no allocation.
        let hash = self.lookup.hasher().hash_one((params, requirements));
        match self
            .lookup
            .raw_entry_mut()
            .from_hash(hash, |(p, r)| **p == *params && **r == *requirements)
        {
            RawEntryMut::Occupied(e) => *e.get(),
            RawEntryMut::Vacant(e) => {
                let id = SignatureId(self.storage.len() as u32);
                self.storage.push(SignatureStorage {
                    params: params.to_vec(),
                    requirements: requirements.to_vec(),
                    num_conformances: requirements
                        .iter()
                        .filter(|r| r.protocol().is_some())
                        .count(),
                    canonical: None,
                    errors: GenericSignatureErrors::empty(),
                });
                e.insert_hashed_nocheck(hash, (params.into(), requirements.into()), id);
                id
            }
        }
    }

    fn get(&self, id: SignatureId) -> &SignatureStorage {
        &self.storage[id.0 as usize]
    }

    fn get_mut(&mut self, id: SignatureId) -> &mut SignatureStorage {
        &mut self.storage[id.0 as usize]
    }

    pub(crate) fn record_errors(&mut self, id: SignatureId, errors: GenericSignatureErrors) {
        self.get_mut(id).errors |= errors;
    }
}

// ============================================================================
// Construction and accessors
// ============================================================================

impl GenericSignature {
    pub const NULL: GenericSignature = GenericSignature(None);

    /// Unique a signature.
    ///
    /// Parameters must be ordered by (depth, index). With
    /// `is_known_canonical` the requirements must already be minimal and in
    /// canonical order; the signature then is its own canonical signature.
    pub fn get(
        ctx: &mut GenericContext,
        params: &[TypeId],
        requirements: &[Requirement],
        is_known_canonical: bool,
    ) -> GenericSignature {
        if params.is_empty() {
            debug_assert!(
                requirements.is_empty(),
                "INTERNAL ERROR: requirements without generic parameters"
            );
            return GenericSignature::NULL;
        }
        debug_assert!(
            params.windows(2).all(|w| {
                ctx.types.generic_param_key(w[0]) < ctx.types.generic_param_key(w[1])
            }),
            "INTERNAL ERROR: generic parameters out of order"
        );
        let id = ctx.signatures.intern(params, requirements);
        if is_known_canonical {
            debug_assert!(
                params.iter().all(|&p| ctx.types.is_canonical(p)),
                "INTERNAL ERROR: sugared parameter in a canonical signature"
            );
            ctx.signatures.get_mut(id).canonical = Some(id);
        }
        GenericSignature(Some(id))
    }

    pub(crate) fn from_id(id: SignatureId) -> Self {
        GenericSignature(Some(id))
    }

    pub fn id(self) -> Option<SignatureId> {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_none()
    }

    pub fn generic_params(self, ctx: &GenericContext) -> &[TypeId] {
        match self.0 {
            Some(id) => &ctx.signatures.get(id).params,
            None => &[],
        }
    }

    /// Parameters of the innermost generic context (the deepest depth).
    pub fn innermost_generic_params(self, ctx: &GenericContext) -> &[TypeId] {
        let params = self.generic_params(ctx);
        let Some(depth) = self.max_depth(ctx) else {
            return params;
        };
        let start = params
            .iter()
            .position(|&p| ctx.types.generic_param_key(p).is_some_and(|k| k.depth == depth))
            .unwrap_or(params.len());
        &params[start..]
    }

    pub fn max_depth(self, ctx: &GenericContext) -> Option<u32> {
        let last = *self.generic_params(ctx).last()?;
        ctx.types.generic_param_key(last).map(|k| k.depth)
    }

    /// Depth for parameters of a context nested inside this one.
    pub fn next_depth(self, ctx: &GenericContext) -> u32 {
        self.max_depth(ctx).map_or(0, |d| d + 1)
    }

    /// Requirements as stored, in declaration order.
    pub fn requirements(self, ctx: &GenericContext) -> &[Requirement] {
        match self.0 {
            Some(id) => &ctx.signatures.get(id).requirements,
            None => &[],
        }
    }

    pub fn num_conformance_requirements(self, ctx: &GenericContext) -> usize {
        self.0.map_or(0, |id| ctx.signatures.get(id).num_conformances)
    }

    pub fn has_parameter_pack(self, ctx: &GenericContext) -> bool {
        self.generic_params(ctx)
            .iter()
            .any(|&p| ctx.types.is_parameter_pack(p))
    }

    /// Position of `param` in the flattened parameter list.
    ///
    /// # Panics
    /// If `param` is not a parameter of this signature.
    pub fn generic_param_ordinal(self, ctx: &GenericContext, param: TypeId) -> usize {
        let key = ctx.types.generic_param_key(param);
        self.generic_params(ctx)
            .iter()
            .position(|&p| ctx.types.generic_param_key(p) == key)
            .unwrap_or_else(|| panic!("INTERNAL ERROR: generic parameter not in signature"))
    }

    /// Whether this signature is its own canonical signature.
    pub fn is_canonical(self, ctx: &GenericContext) -> bool {
        match self.0 {
            Some(id) => ctx.signatures.get(id).canonical == Some(id),
            None => true,
        }
    }

    /// The minimized form of this signature, computed once and cached.
    pub fn canonical_signature(self, ctx: &mut GenericContext) -> CanGenericSignature {
        let Some(id) = self.0 else {
            return CanGenericSignature::NULL;
        };
        if let Some(canonical) = ctx.signatures.get(id).canonical {
            return CanGenericSignature(GenericSignature(Some(canonical)));
        }

        let storage = ctx.signatures.get(id);
        let params = storage.params.clone();
        let requirements = storage.requirements.clone();
        let params: Vec<TypeId> = params
            .into_iter()
            .map(|p| ctx.types.canonical_type(p))
            .collect();
        let written: Vec<WrittenRequirement> = requirements
            .into_iter()
            .map(|req| WrittenRequirement::new(req.map_types(|ty| ctx.types.canonical_type(ty))))
            .collect();

        tracing::debug!(
            signature = id.0,
            params = params.len(),
            requirements = written.len(),
            "canonicalizing generic signature"
        );
        let minimized = machine::minimize(ctx, &params, &written);
        let canonical = GenericSignature::get(ctx, &params, &minimized.requirements, true);
        let canonical_id = canonical.0.unwrap_or(id);

        let storage = ctx.signatures.get_mut(id);
        storage.canonical = Some(canonical_id);
        storage.errors |= minimized.errors;
        CanGenericSignature(canonical)
    }

    /// Error flags found while canonicalizing this signature.
    pub fn errors(self, ctx: &mut GenericContext) -> GenericSignatureErrors {
        let Some(id) = self.0 else {
            return GenericSignatureErrors::empty();
        };
        self.canonical_signature(ctx);
        ctx.signatures.get(id).errors
    }

    /// `<T, U where T: Equatable, U == T.Element>`
    pub fn display(self, ctx: &GenericContext) -> String {
        if self.is_null() {
            return "<>".to_string();
        }
        let params: Vec<String> = self
            .generic_params(ctx)
            .iter()
            .map(|&p| {
                if ctx.types.is_parameter_pack(p) {
                    format!("each {}", ctx.display_type(p))
                } else {
                    ctx.display_type(p).to_string()
                }
            })
            .collect();
        let reqs: Vec<String> = self
            .requirements(ctx)
            .iter()
            .map(|&r| ctx.display_requirement(r).to_string())
            .collect();
        if reqs.is_empty() {
            format!("<{}>", params.join(", "))
        } else {
            format!("<{} where {}>", params.join(", "), reqs.join(", "))
        }
    }
}

impl CanGenericSignature {
    pub(crate) fn from_id(id: SignatureId) -> Self {
        CanGenericSignature(GenericSignature(Some(id)))
    }
}
