// signature/query.rs
//
// Questions about type parameters under a signature. Every query goes
// through the canonical signature's requirement machine, so implied
// requirements are visible no matter how the signature was written.

use sigil_identity::ProtocolId;
use smallvec::SmallVec;

use super::{CanGenericSignature, ConformancePath, GenericSignature};
use crate::context::GenericContext;
use crate::decls::KnownProtocolKind;
use crate::machine::RequirementMachine;
use crate::requirement::{
    InverseRequirement, InvertibleProtocolKind, InvertibleProtocolSet, LayoutConstraint,
    Requirement,
};
use crate::subst::SubstitutionMap;
use crate::types::{Ty, TypeId, TypeIdVec, transform_type};

/// Everything known locally about one type parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRequirements {
    pub superclass: Option<TypeId>,
    pub protocols: Vec<ProtocolId>,
    pub layout: Option<LayoutConstraint>,
    pub pack_shape: TypeId,
}

/// A signature's requirements with the default `Copyable`/`Escapable`
/// conformances of its parameters folded into inverse markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementsWithInverses {
    pub requirements: Vec<Requirement>,
    pub inverses: Vec<InverseRequirement>,
}

impl GenericSignature {
    fn with_machine<R>(
        self,
        ctx: &mut GenericContext,
        f: impl FnOnce(&mut GenericContext, &mut RequirementMachine) -> R,
    ) -> R {
        let canonical = self.canonical_signature(ctx);
        ctx.with_machine(canonical, f)
    }

    pub fn requires_class(self, ctx: &mut GenericContext, ty: TypeId) -> bool {
        self.with_machine(ctx, |ctx, m| m.requires_class(ctx, ty))
    }

    pub fn superclass_bound(self, ctx: &mut GenericContext, ty: TypeId) -> Option<TypeId> {
        self.with_machine(ctx, |ctx, m| m.superclass_bound(ctx, ty))
    }

    /// Protocols `ty` conforms to, minimized and in canonical order.
    pub fn required_protocols(self, ctx: &mut GenericContext, ty: TypeId) -> Vec<ProtocolId> {
        self.with_machine(ctx, |ctx, m| m.required_protocols(ctx, ty))
    }

    pub fn requires_protocol(self, ctx: &mut GenericContext, ty: TypeId, protocol: ProtocolId) -> bool {
        self.with_machine(ctx, |ctx, m| m.requires_protocol(ctx, ty, protocol))
    }

    pub fn is_concrete_type(self, ctx: &mut GenericContext, ty: TypeId) -> bool {
        self.concrete_type(ctx, ty).is_some()
    }

    /// The concrete type `ty` is bound to, in reduced form.
    pub fn concrete_type(self, ctx: &mut GenericContext, ty: TypeId) -> Option<TypeId> {
        self.with_machine(ctx, |ctx, m| m.concrete_type(ctx, ty))
    }

    pub fn layout_constraint(self, ctx: &mut GenericContext, ty: TypeId) -> Option<LayoutConstraint> {
        self.with_machine(ctx, |ctx, m| m.layout_constraint(ctx, ty))
    }

    /// Rewrite every type parameter in `ty` to its reduced form.
    pub fn reduced_type(self, ctx: &mut GenericContext, ty: TypeId) -> TypeId {
        if self.is_null() {
            return ctx.types.canonical_type(ty);
        }
        self.with_machine(ctx, |ctx, m| m.reduced_type(ctx, ty))
    }

    pub fn is_reduced_type(self, ctx: &mut GenericContext, ty: TypeId) -> bool {
        ctx.types.is_canonical(ty) && self.reduced_type(ctx, ty) == ty
    }

    /// # Panics
    /// If `ty` is not a type parameter.
    pub fn reduced_type_parameter(self, ctx: &mut GenericContext, ty: TypeId) -> TypeId {
        assert!(
            ctx.types.is_type_parameter(ty),
            "INTERNAL ERROR: reduced_type_parameter called on a concrete type"
        );
        self.reduced_type(ctx, ty)
    }

    /// Equality of two type parameters under this signature.
    ///
    /// # Panics
    /// If either type is not a type parameter.
    pub fn are_reduced_type_parameters_equal(self, ctx: &mut GenericContext, a: TypeId, b: TypeId) -> bool {
        self.with_machine(ctx, |ctx, m| m.are_equal(ctx, a, b))
    }

    pub fn is_valid_type_parameter(self, ctx: &mut GenericContext, ty: TypeId) -> bool {
        self.with_machine(ctx, |ctx, m| m.is_valid_type_parameter(ctx, ty))
    }

    /// How `ty: protocol` follows from this signature's requirements.
    /// Empty when it does not.
    pub fn conformance_path(self, ctx: &mut GenericContext, ty: TypeId, protocol: ProtocolId) -> ConformancePath {
        let steps = self.with_machine(ctx, |ctx, m| m.conformance_path(ctx, ty, protocol));
        ConformancePath::new(steps)
    }

    /// Whether this signature entails `req`.
    ///
    /// `allow_missing` accepts missing conformances to marker protocols;
    /// `broken_pack_behavior` accepts pack conformances with invalid
    /// elements.
    pub fn is_requirement_satisfied(
        self,
        ctx: &mut GenericContext,
        req: Requirement,
        allow_missing: bool,
        broken_pack_behavior: bool,
    ) -> bool {
        self.with_machine(ctx, |ctx, m| {
            m.is_satisfied(ctx, req, allow_missing, broken_pack_behavior)
        })
    }

    // ========================================================================
    // Shapes
    // ========================================================================

    pub fn reduced_shape(self, ctx: &mut GenericContext, ty: TypeId) -> TypeId {
        self.with_machine(ctx, |ctx, m| m.reduced_shape(ctx, ty))
    }

    pub fn have_same_shape(self, ctx: &mut GenericContext, a: TypeId, b: TypeId) -> bool {
        self.with_machine(ctx, |ctx, m| m.reduced_shape(ctx, a) == m.reduced_shape(ctx, b))
    }

    /// Reduced shapes of the signature's pack parameters, one per class.
    pub fn shape_classes(self, ctx: &mut GenericContext) -> Vec<TypeId> {
        self.with_machine(ctx, |ctx, m| {
            m.shape_classes(ctx).into_iter().map(|group| group[0]).collect()
        })
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    pub fn local_requirements(self, ctx: &mut GenericContext, ty: TypeId) -> LocalRequirements {
        self.with_machine(ctx, |ctx, m| LocalRequirements {
            superclass: m.superclass_bound(ctx, ty),
            protocols: m.required_protocols(ctx, ty),
            layout: m.layout_constraint(ctx, ty),
            pack_shape: m.reduced_shape(ctx, ty),
        })
    }

    /// Call `f(param, is_canonical)` for each parameter, where a parameter
    /// is canonical unless it is bound to a concrete type or to an earlier
    /// parameter.
    pub fn for_each_param(self, ctx: &mut GenericContext, mut f: impl FnMut(TypeId, bool)) {
        let params = self.generic_params(ctx).to_vec();
        for param in params {
            let canonical = ctx.types.canonical_type(param);
            let reduced = self.reduced_type(ctx, canonical);
            f(param, reduced == canonical);
        }
    }

    pub fn are_all_params_concrete(self, ctx: &mut GenericContext) -> bool {
        let params = self.generic_params(ctx).to_vec();
        params
            .into_iter()
            .all(|param| self.is_concrete_type(ctx, param))
    }

    /// Put parameter names back onto the canonical parameters in `ty`.
    pub fn sugared_type(self, ctx: &mut GenericContext, ty: TypeId) -> TypeId {
        let params = self.generic_params(ctx).to_vec();
        transform_type(ctx, ty, &mut |ctx, node| {
            let Ty::GenericParam { name: None, .. } = ctx.types.get(node) else {
                return None;
            };
            let key = ctx.types.generic_param_key(node);
            params
                .iter()
                .copied()
                .find(|&p| ctx.types.generic_param_key(p) == key)
        })
    }

    /// The existential type of everything known about `ty`:
    /// `any Superclass & P & Q`, `any AnyObject`, or `Any`.
    pub fn existential_type(self, ctx: &mut GenericContext, ty: TypeId) -> TypeId {
        let local = self.local_requirements(ctx, ty);
        let requires_class = self.requires_class(ctx, ty);
        let mut members = TypeIdVec::new();
        if let Some(superclass) = local.superclass {
            members.push(superclass);
        }
        for protocol in local.protocols {
            if ctx.decls.protocol(protocol).known.and_then(KnownProtocolKind::invertible).is_some() {
                continue;
            }
            members.push(ctx.types.protocol(protocol));
        }
        let any_object = requires_class && local.superclass.is_none();
        let inverses = self.inverses_of(ctx, ty);
        let constraint = if members.len() == 1 && !any_object && inverses.is_empty() {
            members[0]
        } else {
            ctx.types.composition(members, any_object, inverses)
        };
        ctx.types.existential(constraint)
    }

    /// Requirements of this signature, minus conformances to marker
    /// protocols.
    pub fn without_marker_protocols(self, ctx: &mut GenericContext) -> GenericSignature {
        if self.is_null() {
            return self;
        }
        let params = self.generic_params(ctx).to_vec();
        let requirements: Vec<Requirement> = self
            .requirements(ctx)
            .iter()
            .copied()
            .filter(|req| match req.protocol() {
                Some(protocol) => !ctx.decls.protocol(protocol).is_marker,
                None => true,
            })
            .collect();
        if requirements.len() == self.requirements(ctx).len() {
            return self;
        }
        let canonical = self.is_canonical(ctx);
        GenericSignature::get(ctx, &params, &requirements, canonical)
    }

    /// Requirements of this signature's canonical form that `other` does not
    /// entail.
    pub fn requirements_not_satisfied_by(self, ctx: &mut GenericContext, other: GenericSignature) -> Vec<Requirement> {
        let canonical = self.canonical_signature(ctx);
        let requirements = canonical.requirements(ctx).to_vec();
        if other.is_null() {
            return requirements;
        }
        if other.canonical_signature(ctx) == canonical {
            return Vec::new();
        }
        requirements
            .into_iter()
            .filter(|&req| !other.is_requirement_satisfied(ctx, req, false, false))
            .collect()
    }

    /// Requirements without the implicit `Copyable`/`Escapable`
    /// conformances of generic parameters, plus an inverse for each
    /// parameter that lacks one.
    pub fn requirements_with_inverses(self, ctx: &mut GenericContext) -> RequirementsWithInverses {
        let invertible: SmallVec<[ProtocolId; 2]> = InvertibleProtocolKind::ALL
            .iter()
            .filter_map(|&kind| ctx.decls.known_protocol(kind.into()))
            .collect();
        let requirements: Vec<Requirement> = self
            .requirements(ctx)
            .iter()
            .copied()
            .filter(|req| match *req {
                Requirement::Conformance { subject, protocol } => {
                    !(invertible.contains(&protocol)
                        && matches!(ctx.types.get(subject), Ty::GenericParam { .. }))
                }
                _ => true,
            })
            .collect();

        let mut inverses = Vec::new();
        let params = self.generic_params(ctx).to_vec();
        for param in params {
            let missing = self.inverses_of(ctx, param);
            for kind in InvertibleProtocolKind::ALL {
                if missing.contains(kind.as_set()) {
                    inverses.push(InverseRequirement::new(param, kind));
                }
            }
        }
        RequirementsWithInverses {
            requirements,
            inverses,
        }
    }

    /// Invertible protocols `ty` does not conform to. Concrete type
    /// parameters have no inverses.
    fn inverses_of(self, ctx: &mut GenericContext, ty: TypeId) -> InvertibleProtocolSet {
        let mut missing = InvertibleProtocolSet::empty();
        if self.is_concrete_type(ctx, ty) {
            return missing;
        }
        for kind in InvertibleProtocolKind::ALL {
            let Some(protocol) = ctx.decls.known_protocol(kind.into()) else {
                continue;
            };
            if !self.requires_protocol(ctx, ty, protocol) {
                missing |= kind.as_set();
            }
        }
        missing
    }

    /// Map each generic parameter to itself.
    pub fn identity_substitution_map(self, ctx: &mut GenericContext) -> SubstitutionMap {
        SubstitutionMap::identity(ctx, self)
    }
}

impl CanGenericSignature {
    /// Canonical signature of `<Self where Self: protocol>`.
    pub fn for_protocol(ctx: &mut GenericContext, protocol: ProtocolId) -> CanGenericSignature {
        let self_param = ctx.types.protocol_self();
        let sig = GenericSignature::get(
            ctx,
            &[self_param],
            &[Requirement::conformance(self_param, protocol)],
            true,
        );
        CanGenericSignature(sig)
    }
}
