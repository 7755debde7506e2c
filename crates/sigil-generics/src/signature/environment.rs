// signature/environment.rs
//
// The primary generic environment of a signature: each reduced type
// parameter gets an archetype standing for "some type satisfying these
// requirements" inside the generic body.

use super::GenericSignature;
use crate::context::GenericContext;
use crate::types::{ArchetypeKind, Ty, TypeId, TypeProperties, transform_type};

impl GenericSignature {
    /// Replace type parameters with this signature's primary archetypes.
    /// Parameters bound to concrete types become those types.
    pub fn map_type_into_context(self, ctx: &mut GenericContext, ty: TypeId) -> TypeId {
        if !ctx.types.has(ty, TypeProperties::HAS_TYPE_PARAMETER) {
            return ty;
        }
        let canonical = self.canonical_signature(ctx);
        let Some(id) = canonical.id() else {
            return ty;
        };
        let reduced = canonical.reduced_type(ctx, ty);
        transform_type(ctx, reduced, &mut |ctx, node| {
            if !ctx.types.is_type_parameter(node) {
                return None;
            }
            Some(ctx.types.archetype(id, node, ArchetypeKind::Primary))
        })
    }

    /// Replace this signature's primary archetypes with their interface
    /// types. Archetypes of other environments are left alone.
    pub fn map_type_out_of_context(self, ctx: &mut GenericContext, ty: TypeId) -> TypeId {
        let Some(id) = self.canonical_signature(ctx).id() else {
            return ty;
        };
        map_archetypes_out(ctx, ty, Some(id))
    }
}

/// Replace every primary archetype in `ty` with its interface type.
pub(crate) fn map_out_of_context(ctx: &mut GenericContext, ty: TypeId) -> TypeId {
    map_archetypes_out(ctx, ty, None)
}

fn map_archetypes_out(
    ctx: &mut GenericContext,
    ty: TypeId,
    only: Option<super::SignatureId>,
) -> TypeId {
    if !ctx.types.has(ty, TypeProperties::HAS_PRIMARY_ARCHETYPE) {
        return ty;
    }
    transform_type(ctx, ty, &mut |ctx, node| match *ctx.types.get(node) {
        Ty::Archetype {
            signature,
            interface,
            kind: ArchetypeKind::Primary,
        } if only.is_none_or(|id| id == signature) => Some(interface),
        _ => None,
    })
}
