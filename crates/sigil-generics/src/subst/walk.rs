// subst/walk.rs
//
// The structural substitution walk. Generic parameter leaves go to the
// source; member types are resolved through conformances; pack expansions
// are expanded component by component and flattened into the enclosing
// element list.

use sigil_identity::AssocTypeId;

use super::in_flight::InFlightSubstitution;
use super::options::SubstOptions;
use crate::context::GenericContext;
use crate::types::{ArchetypeKind, Ty, TypeId, TypeIdVec};

/// Substitute `ty`. `level` picks the active expansion that pack parameter
/// leaves resolve against, counting outwards from the innermost.
pub(super) fn subst(ifs: &mut InFlightSubstitution<'_>, ctx: &mut GenericContext, ty: TypeId, level: u32) -> TypeId {
    if ifs.is_invariant(ctx, ty) {
        return ty;
    }
    if ifs.depth >= ifs.max_depth {
        tracing::warn!(
            depth = ifs.depth,
            ty = %ctx.display_type(ty),
            "substitution depth limit reached"
        );
        return TypeId::ERROR;
    }
    ifs.depth += 1;
    let result = subst_node(ifs, ctx, ty, level);
    ifs.depth -= 1;
    result
}

fn subst_node(ifs: &mut InFlightSubstitution<'_>, ctx: &mut GenericContext, ty: TypeId, level: u32) -> TypeId {
    match ctx.types.get(ty).clone() {
        Ty::GenericParam { .. } => match ifs.subst_param(ctx, ty, level) {
            Some(replacement) => replacement,
            None if ifs.options().contains(SubstOptions::USE_ERROR_TYPE) => TypeId::ERROR,
            None => ty,
        },
        Ty::DependentMember { base, assoc } => subst_member(ifs, ctx, base, assoc, level),
        Ty::PackElement { pack, level: outer } => {
            if (outer as usize) < ifs.active_expansions().len() {
                subst(ifs, ctx, pack, outer)
            } else {
                let pack = subst(ifs, ctx, pack, level);
                ctx.types.pack_element(pack, outer)
            }
        }
        Ty::PackExpansion { .. } => {
            let components = expand(ifs, ctx, ty);
            match components.as_slice() {
                [single] if ctx.types.is_pack_expansion(*single) => *single,
                _ => ctx.types.pack(components),
            }
        }
        Ty::Archetype {
            interface, kind, ..
        } => {
            let option = match kind {
                ArchetypeKind::Primary => SubstOptions::SUBSTITUTE_PRIMARY_ARCHETYPES,
                ArchetypeKind::Local => SubstOptions::SUBSTITUTE_LOCAL_ARCHETYPES,
            };
            if ifs.options().contains(option) {
                subst(ifs, ctx, interface, level)
            } else {
                ty
            }
        }
        Ty::Tuple(elements) => {
            let had_expansion = elements.iter().any(|&e| ctx.types.is_pack_expansion(e));
            let elements = subst_list(ifs, ctx, &elements, level);
            // `(repeat each T)` with a single scalar component is that component.
            match elements.as_slice() {
                [single] if had_expansion && !ctx.types.is_pack_expansion(*single) => *single,
                _ => ctx.types.tuple(elements),
            }
        }
        Ty::Pack(elements) => {
            let elements = subst_list(ifs, ctx, &elements, level);
            ctx.types.pack(elements)
        }
        Ty::Function { params, result } => {
            let params = subst_list(ifs, ctx, &params, level);
            let result = subst(ifs, ctx, result, level);
            ctx.types.function(params, result)
        }
        node => {
            let children = node.children();
            let mapped: TypeIdVec = children
                .iter()
                .map(|&child| subst(ifs, ctx, child, level))
                .collect();
            if mapped == children {
                ty
            } else {
                ctx.types.intern(node.with_children(&mapped))
            }
        }
    }
}

/// `base.assoc`: the type witness of the substituted base's conformance.
fn subst_member(
    ifs: &mut InFlightSubstitution<'_>,
    ctx: &mut GenericContext,
    base: TypeId,
    assoc: AssocTypeId,
    level: u32,
) -> TypeId {
    let protocol = ctx.decls.assoc_type(assoc).protocol;
    let conformance = ifs.lookup_conformance(ctx, base, protocol, level);
    if !conformance.is_invalid() {
        let witness = conformance.type_witness(ctx, assoc);
        if !witness.is_error() {
            return witness;
        }
    }
    let base = subst(ifs, ctx, base, level);
    if ctx.types.is_type_parameter(base) {
        ctx.types.dependent_member(base, assoc)
    } else {
        TypeId::ERROR
    }
}

/// Substitute an element list, splicing in the components of each pack
/// expansion.
fn subst_list(
    ifs: &mut InFlightSubstitution<'_>,
    ctx: &mut GenericContext,
    elements: &[TypeId],
    level: u32,
) -> TypeIdVec {
    let mut out = TypeIdVec::with_capacity(elements.len());
    for &element in elements {
        if ctx.types.is_pack_expansion(element) && !ifs.is_invariant(ctx, element) {
            out.extend(expand(ifs, ctx, element));
        } else {
            out.push(subst(ifs, ctx, element, level));
        }
    }
    out
}

fn expand(ifs: &mut InFlightSubstitution<'_>, ctx: &mut GenericContext, expansion: TypeId) -> TypeIdVec {
    let mut components = TypeIdVec::new();
    ifs.expand_pack_expansion_type(ctx, expansion, &mut |_, component| components.push(component));
    components
}
