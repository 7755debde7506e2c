// machine/resolve.rs
//
// Mapping type-parameter terms to classes, creating member classes on
// demand, and applying protocol requirement signatures.

use sigil_identity::{AssocTypeId, ProtocolId, Symbol};

use super::class::ClassId;
use super::{Fact, Origin, RequirementMachine};
use crate::context::GenericContext;
use crate::requirement::{LayoutConstraint, Requirement, RequirementKind};
use crate::types::{Ty, TypeId};

/// Outcome of resolving a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Resolved(ClassId),
    /// Not resolvable yet; protocol expansions still in flight may declare
    /// the missing member.
    Stalled,
    Invalid,
}

impl RequirementMachine {
    /// Resolve a canonical type parameter to its class.
    pub(crate) fn resolve(&mut self, ctx: &mut GenericContext, ty: TypeId) -> Resolution {
        if let Some(&class) = self.term_classes.get(&ty) {
            return Resolution::Resolved(self.find(class));
        }
        match *ctx.types.get(ty) {
            Ty::DependentMember { base, assoc } => match self.resolve(ctx, base) {
                Resolution::Resolved(base_class) => {
                    let name = ctx.decls.assoc_type(assoc).name;
                    let resolution = self.member(ctx, base_class, name);
                    if let Resolution::Resolved(member) = resolution {
                        self.term_classes.insert(ty, member);
                    }
                    resolution
                }
                other => other,
            },
            Ty::Sugar { underlying, .. } => self.resolve(ctx, underlying),
            _ => Resolution::Invalid,
        }
    }

    /// The class of `base.name`, created if some protocol of `base`
    /// declares `name`.
    pub(crate) fn member(&mut self, ctx: &mut GenericContext, base: ClassId, name: Symbol) -> Resolution {
        let base = self.find(base);
        if !self.class(base).pending.is_empty() {
            self.force_expand(base);
        }
        if let Some(existing) = self.class(base).member(name) {
            return Resolution::Resolved(self.find(existing));
        }
        let Some(assoc) = self.best_assoc(ctx, base, name) else {
            if !self.worklist.is_empty() {
                return Resolution::Stalled;
            }
            return Resolution::Invalid;
        };
        if self.classes.len() >= self.limits.max_terms {
            self.fail_completion();
            return Resolution::Invalid;
        }
        let base_term = self.class_term(base);
        let term = ctx.types.dependent_member(base_term, assoc);
        let depth = self.class(base).depth + 1;
        let is_pack = self.class(base).is_pack;
        let member = self.new_class(term, depth, is_pack);
        self.class_mut(member).parents.push((base, name));
        self.class_mut(base).members.push((name, member));
        if self.class(base).concrete.is_some() {
            self.bind_member_witness(ctx, base, member);
        }
        Resolution::Resolved(member)
    }

    /// The associated type `name` resolves to on `class`: among the class's
    /// protocols that declare it, the one from the first protocol in
    /// canonical order.
    pub(crate) fn best_assoc(&self, ctx: &GenericContext, class: ClassId, name: Symbol) -> Option<AssocTypeId> {
        let mut best: Option<(ProtocolId, AssocTypeId)> = None;
        for entry in &self.class(class).conformances {
            let Some(assoc) = ctx.decls.find_associated_type(entry.protocol, name) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((current, _)) => {
                    ctx.decls
                        .compare_protocols(&ctx.interner, entry.protocol, current)
                        .is_lt()
                }
            };
            if better {
                best = Some((entry.protocol, assoc));
            }
        }
        best.map(|(_, assoc)| assoc)
    }

    /// Queue every deferred protocol expansion of `class`.
    pub(crate) fn force_expand(&mut self, class: ClassId) {
        let pending = std::mem::take(&mut self.class_mut(class).pending);
        for protocol in pending {
            self.worklist.push_back(Fact::Expand { class, protocol });
        }
    }

    /// Resolve a type parameter for a query, expanding whatever it takes to
    /// answer questions about its class completely.
    pub(crate) fn prepare(&mut self, ctx: &mut GenericContext, ty: TypeId) -> Option<ClassId> {
        let ty = ctx.types.canonical_type(ty);
        if !ctx.types.is_type_parameter(ty) {
            return None;
        }
        loop {
            match self.resolve(ctx, ty) {
                Resolution::Resolved(class) => {
                    self.force_expand(class);
                    self.drain(ctx);
                    return Some(self.find(class));
                }
                Resolution::Invalid => return None,
                Resolution::Stalled => {
                    if self.failed || !self.drain(ctx) {
                        return None;
                    }
                }
            }
        }
    }

    /// Apply `protocol`'s requirement signature to `class`.
    pub(crate) fn expand(&mut self, ctx: &mut GenericContext, class: ClassId, protocol: ProtocolId) {
        let class = self.find(class);
        if self.class(class).expanded.contains(&protocol) {
            return;
        }
        let data = self.class_mut(class);
        data.pending.retain(|p| *p != protocol);
        data.expanded.push(protocol);
        self.progress += 1;

        let self_term = self.class_term(class);
        let protocol_self = ctx.types.protocol_self();
        let decl = ctx.decls.protocol(protocol);
        let superclass = decl.superclass;
        let class_bound = decl.explicit_any_object;
        let mut requirements = decl.requirement_signature.clone();
        // Conformances first so member types they introduce are available
        // to the same-type requirements that follow.
        requirements.sort_by_key(|req| req.kind() != RequirementKind::Conformance);

        let origin = |self_subject| Origin::Protocol {
            parent: self_term,
            protocol,
            self_subject,
        };
        if let Some(superclass) = superclass {
            let superclass = ctx.types.substitute_self(superclass, self_term);
            self.worklist.push_back(Fact::Requirement {
                req: Requirement::superclass(self_term, superclass),
                origin: origin(protocol_self),
            });
        }
        if class_bound {
            self.worklist.push_back(Fact::Requirement {
                req: Requirement::layout(self_term, LayoutConstraint::Class),
                origin: origin(protocol_self),
            });
        }
        for req in requirements {
            let instantiated = req.map_types(|ty| ctx.types.substitute_self(ty, self_term));
            self.worklist.push_back(Fact::Requirement {
                req: instantiated,
                origin: origin(req.first_type()),
            });
        }
    }
}
