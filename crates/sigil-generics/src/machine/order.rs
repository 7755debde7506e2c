// machine/order.rs
//
// Canonical ordering of terms and requirements, and the reduced term
// (anchor) of each class.

use std::cmp::Ordering;

use sigil_identity::Symbol;

use super::class::ClassId;
use super::RequirementMachine;
use crate::context::GenericContext;
use crate::requirement::Requirement;
use crate::types::TypeId;

/// Shortlex order on type-parameter terms: shorter terms first, then by
/// root parameter position, then by associated type name and protocol at
/// each step.
pub(crate) fn compare_terms(ctx: &GenericContext, a: TypeId, b: TypeId) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (Some((root_a, path_a)), Some((root_b, path_b))) =
        (ctx.types.member_path(a), ctx.types.member_path(b))
    else {
        return a.cmp(&b);
    };
    path_a
        .len()
        .cmp(&path_b.len())
        .then_with(|| {
            let key_a = ctx.types.generic_param_key(root_a);
            let key_b = ctx.types.generic_param_key(root_b);
            key_a.cmp(&key_b)
        })
        .then_with(|| {
            for (&x, &y) in path_a.iter().zip(path_b.iter()) {
                if x == y {
                    continue;
                }
                let decl_x = ctx.decls.assoc_type(x);
                let decl_y = ctx.decls.assoc_type(y);
                let order = ctx
                    .interner
                    .resolve(decl_x.name)
                    .cmp(ctx.interner.resolve(decl_y.name))
                    .then_with(|| {
                        ctx.decls
                            .compare_protocols(&ctx.interner, decl_x.protocol, decl_y.protocol)
                    });
                if order != Ordering::Equal {
                    return order;
                }
            }
            Ordering::Equal
        })
}

/// Order on arbitrary types used to sort requirements: type parameters in
/// term order before everything else.
pub(crate) fn compare_types(ctx: &GenericContext, a: TypeId, b: TypeId) -> Ordering {
    match (ctx.types.is_type_parameter(a), ctx.types.is_type_parameter(b)) {
        (true, true) => compare_terms(ctx, a, b),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(&b),
    }
}

/// Canonical requirement order: by subject, then kind, then protocol or
/// second type.
pub(crate) fn compare_requirements(ctx: &GenericContext, a: &Requirement, b: &Requirement) -> Ordering {
    compare_types(ctx, a.first_type(), b.first_type())
        .then_with(|| a.kind().cmp(&b.kind()))
        .then_with(|| match (a, b) {
            (
                Requirement::Conformance { protocol: pa, .. },
                Requirement::Conformance { protocol: pb, .. },
            ) => ctx.decls.compare_protocols(&ctx.interner, *pa, *pb),
            (Requirement::Layout { layout: la, .. }, Requirement::Layout { layout: lb, .. }) => {
                la.cmp(lb)
            }
            _ => match (a.second_type(), b.second_type()) {
                (Some(x), Some(y)) => compare_types(ctx, x, y),
                _ => Ordering::Equal,
            },
        })
}

impl RequirementMachine {
    /// Reduced term of `class`: the least term in shortlex order among root
    /// parameters in the class and member terms built from the anchors of
    /// its parents.
    pub(crate) fn anchor(&mut self, ctx: &mut GenericContext, class: ClassId) -> TypeId {
        let class = self.find(class);
        if self.anchors.is_none() {
            self.compute_anchors(ctx);
        }
        self.anchors
            .as_ref()
            .and_then(|anchors| anchors[class.0 as usize])
            .unwrap_or_else(|| self.class_term(class))
    }

    fn compute_anchors(&mut self, ctx: &mut GenericContext) {
        let mut anchors: Vec<Option<TypeId>> = vec![None; self.classes.len()];
        let params = self.params.clone();
        for param in params {
            let Some(&class) = self.term_classes.get(&param) else {
                continue;
            };
            let class = self.find(class);
            let slot = &mut anchors[class.0 as usize];
            if slot.is_none_or(|current| compare_terms(ctx, param, current).is_lt()) {
                *slot = Some(param);
            }
        }

        // Relax parent edges until no anchor improves. Each round can only
        // shorten anchors, so the number of classes bounds the rounds.
        let reps = self.representatives();
        for _ in 0..=reps.len() {
            let mut changed = false;
            for &class in &reps {
                let parents = self.class(class).parents.clone();
                for (parent, name) in parents {
                    let parent = self.find(parent);
                    let Some(parent_anchor) = anchors[parent.0 as usize] else {
                        continue;
                    };
                    let Some(assoc) = self.best_assoc(ctx, parent, name) else {
                        continue;
                    };
                    let candidate = ctx.types.dependent_member(parent_anchor, assoc);
                    let slot = anchors[class.0 as usize];
                    if slot.is_none_or(|current| compare_terms(ctx, candidate, current).is_lt()) {
                        anchors[class.0 as usize] = Some(candidate);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        self.anchors = Some(anchors);
    }

    /// The spelling of `class` as its parent's member, using the anchor of
    /// the parent and the preferred associated type.
    pub(crate) fn member_spelling(
        &mut self,
        ctx: &mut GenericContext,
        parent: ClassId,
        name: Symbol,
    ) -> Option<TypeId> {
        let parent = self.find(parent);
        let assoc = self.best_assoc(ctx, parent, name)?;
        let base = self.anchor(ctx, parent);
        Some(ctx.types.dependent_member(base, assoc))
    }
}
