// types/transform.rs
//
// Context-aware structural rewriting of types.

use super::ty::Ty;
use super::type_id::TypeIdVec;
use crate::context::GenericContext;
use crate::types::TypeId;

/// Rebuild `ty`, offering each node to `f` before descending into it.
///
/// When `f` returns `Some`, that node is replaced wholesale and its children
/// are not visited; when it returns `None`, the children are transformed and
/// the node is re-interned if any of them changed.
pub fn transform_type<F>(ctx: &mut GenericContext, ty: TypeId, f: &mut F) -> TypeId
where
    F: FnMut(&mut GenericContext, TypeId) -> Option<TypeId>,
{
    if let Some(replacement) = f(ctx, ty) {
        return replacement;
    }
    let node: Ty = ctx.types.get(ty).clone();
    let children = node.children();
    if children.is_empty() {
        return ty;
    }
    let mut changed = false;
    let mut mapped = TypeIdVec::with_capacity(children.len());
    for &child in &children {
        let new_child = transform_type(ctx, child, f);
        changed |= new_child != child;
        mapped.push(new_child);
    }
    if !changed {
        return ty;
    }
    ctx.types.intern(node.with_children(&mapped))
}
