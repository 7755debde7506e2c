// subst/override_subs.rs
//
// Substitutions from an overridden method's signature into the context of
// the method overriding it.

use sigil_identity::ValueDeclId;

use super::map::SubstitutionMap;
use crate::conformance::ProtocolConformanceRef;
use crate::context::GenericContext;
use crate::types::TypeId;

impl SubstitutionMap {
    /// The map that rewrites `base`'s interface types in terms of
    /// `derived`'s generic parameters.
    ///
    /// Parameters of the base class become the arguments the derived class
    /// passes to it. The base method's own parameters become the derived
    /// method's, shifted to the derived class's depth.
    pub fn override_substitutions(
        ctx: &mut GenericContext,
        base: ValueDeclId,
        derived: ValueDeclId,
    ) -> SubstitutionMap {
        let base_decl = ctx.decls.value(base);
        let (base_class, base_signature) = (base_decl.context, base_decl.signature);
        let derived_class = ctx.decls.value(derived).context;
        if base_signature.is_null() {
            return SubstitutionMap::EMPTY;
        }

        let base_depth = ctx.decls.nominal(base_class).signature.next_depth(ctx);
        let orig_depth = ctx.decls.nominal(derived_class).signature.next_depth(ctx);
        let derived_type = ctx.declared_interface_type(derived_class);
        let base_sub_map = ctx.context_substitution_map(derived_type, base_class);

        tracing::debug!(
            base = ctx.interner.resolve(ctx.decls.value(base).name),
            base_depth,
            orig_depth,
            class_map = %base_sub_map.dump(ctx, super::DumpStyle::Minimal).trim_end(),
            "override substitutions"
        );

        SubstitutionMap::get_with(
            ctx,
            base_signature,
            |ctx, param| {
                if is_own_param(ctx, param, base_depth) {
                    let key = ctx.types.generic_param_key(param)?;
                    let is_pack = ctx.types.is_parameter_pack(param);
                    let depth = key.depth - base_depth + orig_depth;
                    Some(ctx.types.generic_param(depth, key.index, is_pack))
                } else {
                    base_sub_map.lookup_substitution(ctx, param)
                }
            },
            |ctx, orig, subst, protocol| {
                if is_own_param(ctx, orig, base_depth) {
                    if ctx.types.is_type_parameter(subst) {
                        return ProtocolConformanceRef::for_abstract(subst, protocol);
                    }
                    return ctx.lookup_conformance(subst, protocol);
                }
                let conformance = base_sub_map.lookup_conformance(ctx, orig, protocol);
                if conformance.is_invalid() {
                    ctx.lookup_conformance(subst, protocol)
                } else {
                    conformance
                }
            },
        )
    }
}

/// Whether `ty` is rooted in one of the method's own parameters rather than
/// its class's.
fn is_own_param(ctx: &GenericContext, ty: TypeId, base_depth: u32) -> bool {
    ctx.types
        .root_generic_param(ty)
        .and_then(|root| ctx.types.generic_param_key(root))
        .is_some_and(|key| key.depth >= base_depth)
}
