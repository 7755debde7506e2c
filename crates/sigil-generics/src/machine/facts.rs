// machine/facts.rs
//
// Recording requirement facts on classes and merging classes.

use sigil_identity::{ProtocolId, Span};

use super::class::{Bound, ClassId, ConformanceEntry, Derivation, LayoutBound};
use super::resolve::Resolution;
use super::{Fact, Origin, RequirementMachine};
use crate::context::GenericContext;
use crate::errors::RequirementError;
use crate::requirement::Requirement;
use crate::signature::GenericSignatureErrors;
use crate::types::{Ty, TypeId};

impl RequirementMachine {
    pub(super) fn process_requirement(&mut self, ctx: &mut GenericContext, req: Requirement, origin: Origin) {
        let req = req.map_types(|ty| ctx.types.canonical_type(ty));
        let subject = req.first_type();
        let span = origin.span();

        match req {
            Requirement::Conformance { subject, protocol } => {
                if !ctx.types.is_type_parameter(subject) {
                    if ctx.lookup_conformance(subject, protocol).is_invalid() {
                        let diagnostic = self.non_conforming(ctx, subject, protocol, span);
                        self.mark_invalid(Some(diagnostic));
                    }
                    return;
                }
                let Some(class) = self.resolve_for_fact(ctx, req, origin, subject) else {
                    return;
                };
                let derivation = match origin {
                    Origin::Explicit(_) | Origin::Derived => Derivation::Explicit { subject },
                    Origin::Protocol {
                        parent,
                        protocol: parent_protocol,
                        self_subject,
                    } => Derivation::Associated {
                        parent,
                        parent_protocol,
                        subject: self_subject,
                    },
                };
                self.add_conformance(ctx, class, protocol, derivation, origin.is_explicit());
            }
            Requirement::SameType { first, second } => {
                let first_param = ctx.types.is_type_parameter(first);
                let second_param = ctx.types.is_type_parameter(second);
                match (first_param, second_param) {
                    (true, true) => {
                        let Some(a) = self.resolve_for_fact(ctx, req, origin, first) else {
                            return;
                        };
                        let Some(b) = self.resolve_for_fact(ctx, req, origin, second) else {
                            return;
                        };
                        if origin.is_explicit() {
                            self.class_mut(a).explicit = true;
                            self.class_mut(b).explicit = true;
                        }
                        self.merge(ctx, a, b);
                    }
                    (true, false) | (false, true) => {
                        let (param, concrete) = if first_param {
                            (first, second)
                        } else {
                            (second, first)
                        };
                        let Some(class) = self.resolve_for_fact(ctx, req, origin, param) else {
                            return;
                        };
                        let bound = Bound {
                            ty: concrete,
                            explicit: origin.is_explicit(),
                            span,
                        };
                        self.set_concrete(ctx, class, bound);
                    }
                    (false, false) => self.unify_concrete(ctx, first, second, origin),
                }
            }
            Requirement::Superclass { subject, superclass } => {
                if !ctx.types.is_type_parameter(subject) {
                    if !ctx.is_subclass_of(subject, superclass) {
                        let diagnostic = RequirementError::NotASubclass {
                            ty: ctx.display_type(subject).to_string(),
                            superclass: ctx.display_type(superclass).to_string(),
                            span: span.map(Into::into),
                        };
                        self.mark_invalid(Some(diagnostic));
                    }
                    return;
                }
                let Some(class) = self.resolve_for_fact(ctx, req, origin, subject) else {
                    return;
                };
                let bound = Bound {
                    ty: superclass,
                    explicit: origin.is_explicit(),
                    span,
                };
                self.set_superclass(ctx, class, bound);
            }
            Requirement::Layout { layout, .. } => {
                if !ctx.types.is_type_parameter(subject) {
                    if !ctx.satisfies_layout(subject, layout) {
                        let diagnostic = RequirementError::LayoutNotSatisfied {
                            ty: ctx.display_type(subject).to_string(),
                            layout: layout.to_string(),
                            span: span.map(Into::into),
                        };
                        self.mark_invalid(Some(diagnostic));
                    }
                    return;
                }
                let Some(class) = self.resolve_for_fact(ctx, req, origin, subject) else {
                    return;
                };
                let bound = LayoutBound {
                    layout,
                    explicit: origin.is_explicit(),
                };
                self.set_layout(ctx, class, bound, span);
            }
            Requirement::SameShape { first, second } => {
                self.process_same_shape(ctx, req, origin, first, second);
            }
        }
    }

    /// Resolve a requirement's type parameter, parking the requirement when
    /// resolution has to wait and reporting it when it never can succeed.
    fn resolve_for_fact(
        &mut self,
        ctx: &mut GenericContext,
        req: Requirement,
        origin: Origin,
        ty: TypeId,
    ) -> Option<ClassId> {
        match self.resolve(ctx, ty) {
            Resolution::Resolved(class) => {
                if origin.is_explicit() {
                    self.class_mut(class).explicit = true;
                }
                Some(class)
            }
            Resolution::Stalled => {
                self.stalled.push(Fact::Requirement { req, origin });
                None
            }
            Resolution::Invalid => {
                if !self.failed {
                    self.report_unresolvable(ctx, req, origin);
                }
                None
            }
        }
    }

    fn process_same_shape(
        &mut self,
        ctx: &mut GenericContext,
        req: Requirement,
        origin: Origin,
        first: TypeId,
        second: TypeId,
    ) {
        let span = origin.span();
        for ty in [first, second] {
            if !ctx.types.is_parameter_pack(ty) {
                let diagnostic = RequirementError::NotAPack {
                    ty: ctx.display_type(ty).to_string(),
                    span: span.map(Into::into),
                };
                self.mark_invalid(Some(diagnostic));
                return;
            }
        }
        if self.resolve_for_fact(ctx, req, origin, first).is_none()
            || self.resolve_for_fact(ctx, req, origin, second).is_none()
        {
            return;
        }
        let (Some(a), Some(b)) = (
            ctx.types.root_generic_param(first),
            ctx.types.root_generic_param(second),
        ) else {
            return;
        };
        self.union_shapes(a, b);
    }

    pub(super) fn shape_root(&mut self, pack: TypeId) -> TypeId {
        let mut root = pack;
        while let Some(&next) = self.shape_parent.get(&root) {
            if next == root {
                break;
            }
            root = next;
        }
        root
    }

    /// Union two shape classes; the smaller parameter becomes the root so
    /// the reduced shape is the first pack parameter in signature order.
    pub(super) fn union_shapes(&mut self, a: TypeId, b: TypeId) {
        let a = self.shape_root(a);
        let b = self.shape_root(b);
        if a == b {
            return;
        }
        let (keep, drop) = if self.param_position(a) <= self.param_position(b) {
            (a, b)
        } else {
            (b, a)
        };
        self.shape_parent.insert(drop, keep);
        self.progress += 1;
    }

    pub(super) fn param_position(&self, param: TypeId) -> usize {
        self.params
            .iter()
            .position(|&p| p == param)
            .unwrap_or(usize::MAX)
    }

    // ========================================================================
    // Conformances
    // ========================================================================

    pub(crate) fn add_conformance(
        &mut self,
        ctx: &mut GenericContext,
        class: ClassId,
        protocol: ProtocolId,
        derivation: Derivation,
        explicit: bool,
    ) {
        let class = self.find(class);
        let concrete = self.class(class).concrete;
        if let Some(index) = self
            .class(class)
            .conformances
            .iter()
            .position(|e| e.protocol == protocol)
        {
            let entry = &mut self.class_mut(class).conformances[index];
            let upgraded = explicit && !entry.explicit;
            entry.explicit |= explicit;
            if upgraded && concrete.is_some() {
                self.errors |= GenericSignatureErrors::HAS_CONCRETE_CONFORMANCES;
            }
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.class_mut(class).conformances.push(ConformanceEntry {
            protocol,
            derivation,
            seq,
            explicit,
        });
        self.progress += 1;
        self.anchors = None;

        if let Some(bound) = concrete {
            self.check_concrete_conformance(ctx, bound, protocol);
            if explicit {
                self.errors |= GenericSignatureErrors::HAS_CONCRETE_CONFORMANCES;
            }
        }

        let inherited = ctx.decls.protocol(protocol).inherited.clone();
        for parent in inherited {
            self.add_conformance(ctx, class, parent, Derivation::Inherited { from: protocol }, false);
        }

        if self.class(class).depth <= self.limits.eager_depth {
            self.worklist.push_back(Fact::Expand { class, protocol });
        } else {
            self.class_mut(class).pending.push(protocol);
        }
    }

    fn check_concrete_conformance(&mut self, ctx: &mut GenericContext, bound: Bound, protocol: ProtocolId) {
        if ctx.types.is_type_parameter(bound.ty) {
            return;
        }
        if ctx.lookup_conformance(bound.ty, protocol).is_invalid() {
            let diagnostic = self.non_conforming(ctx, bound.ty, protocol, bound.span);
            self.mark_invalid(Some(diagnostic));
        }
    }

    fn non_conforming(
        &self,
        ctx: &GenericContext,
        ty: TypeId,
        protocol: ProtocolId,
        span: Option<Span>,
    ) -> RequirementError {
        RequirementError::NonConformingType {
            ty: ctx.display_type(ty).to_string(),
            protocol: ctx.interner.resolve(ctx.decls.protocol(protocol).name).to_string(),
            span: span.map(Into::into),
        }
    }

    // ========================================================================
    // Concrete, superclass and layout bounds
    // ========================================================================

    pub(crate) fn set_concrete(&mut self, ctx: &mut GenericContext, class: ClassId, bound: Bound) {
        let class = self.find(class);
        if let Some(existing) = self.class(class).concrete {
            if bound.explicit && !existing.explicit {
                self.class_mut(class).concrete = Some(Bound {
                    explicit: true,
                    span: bound.span,
                    ..existing
                });
            }
            if existing.ty == bound.ty {
                return;
            }
            if !ctx.types.is_type_parameter(existing.ty)
                && !ctx.types.is_type_parameter(bound.ty)
                && !same_head(ctx, existing.ty, bound.ty)
            {
                let diagnostic = RequirementError::ConflictingConcreteTypes {
                    subject: ctx.display_type(self.class_term(class)).to_string(),
                    first: ctx.display_type(existing.ty).to_string(),
                    second: ctx.display_type(bound.ty).to_string(),
                    span: bound.span.map(Into::into),
                };
                self.mark_invalid(Some(diagnostic));
                return;
            }
            let origin = if bound.explicit {
                Origin::Explicit(bound.span)
            } else {
                Origin::Derived
            };
            self.unify_concrete(ctx, existing.ty, bound.ty, origin);
            return;
        }

        self.class_mut(class).concrete = Some(bound);
        self.progress += 1;
        self.anchors = None;

        let conformances: Vec<(ProtocolId, bool)> = self
            .class(class)
            .conformances
            .iter()
            .map(|e| (e.protocol, e.explicit))
            .collect();
        for (protocol, explicit) in conformances {
            self.check_concrete_conformance(ctx, bound, protocol);
            if explicit {
                self.errors |= GenericSignatureErrors::HAS_CONCRETE_CONFORMANCES;
            }
        }
        if let Some(superclass) = self.class(class).superclass
            && !ctx.types.is_type_parameter(bound.ty)
            && !ctx.is_subclass_of(bound.ty, superclass.ty)
        {
            let diagnostic = RequirementError::NotASubclass {
                ty: ctx.display_type(bound.ty).to_string(),
                superclass: ctx.display_type(superclass.ty).to_string(),
                span: bound.span.map(Into::into),
            };
            self.mark_invalid(Some(diagnostic));
        }
        if let Some(layout) = self.class(class).layout
            && !ctx.types.is_type_parameter(bound.ty)
            && !ctx.satisfies_layout(bound.ty, layout.layout)
        {
            let diagnostic = RequirementError::LayoutNotSatisfied {
                ty: ctx.display_type(bound.ty).to_string(),
                layout: layout.layout.to_string(),
                span: bound.span.map(Into::into),
            };
            self.mark_invalid(Some(diagnostic));
        }

        let members = self.class(class).members.clone();
        for (_, member) in members {
            self.bind_member_witness(ctx, class, member);
        }
    }

    /// Drop every concrete binding that mentions its own class, directly
    /// or through the concrete bindings of the classes it mentions. Such a
    /// type has no finite reduced form.
    pub(super) fn break_concrete_cycles(&mut self, ctx: &mut GenericContext) {
        for class in self.representatives() {
            let Some(bound) = self.class(class).concrete else {
                continue;
            };
            if !self.concrete_reaches(ctx, bound.ty, class) {
                continue;
            }
            let diagnostic = RequirementError::RecursiveSameType {
                subject: ctx.display_type(self.class_term(class)).to_string(),
                ty: ctx.display_type(bound.ty).to_string(),
                span: bound.span.map(Into::into),
            };
            self.class_mut(class).concrete = None;
            self.anchors = None;
            self.mark_invalid(Some(diagnostic));
        }
    }

    /// Whether `ty` mentions a term of `target`, following concrete bindings.
    /// Member types the closure never registered cannot close a cycle and
    /// are skipped.
    fn concrete_reaches(&mut self, ctx: &mut GenericContext, ty: TypeId, target: ClassId) -> bool {
        let mut visited: Vec<ClassId> = Vec::new();
        let mut stack = vec![ty];
        while let Some(ty) = stack.pop() {
            if !ctx.types.is_type_parameter(ty) {
                stack.extend(ctx.types.get(ty).children());
                continue;
            }
            let term = ctx.types.canonical_type(ty);
            let Some(&class) = self.term_classes.get(&term) else {
                continue;
            };
            let class = self.find(class);
            if class == target {
                return true;
            }
            if visited.contains(&class) {
                continue;
            }
            visited.push(class);
            if let Some(bound) = self.class(class).concrete {
                stack.push(bound.ty);
            }
        }
        false
    }

    pub(crate) fn set_superclass(&mut self, ctx: &mut GenericContext, class: ClassId, bound: Bound) {
        let class = self.find(class);
        let Some(existing) = self.class(class).superclass else {
            self.class_mut(class).superclass = Some(bound);
            self.progress += 1;
            if let Some(concrete) = self.class(class).concrete
                && !ctx.types.is_type_parameter(concrete.ty)
                && !ctx.is_subclass_of(concrete.ty, bound.ty)
            {
                let diagnostic = RequirementError::NotASubclass {
                    ty: ctx.display_type(concrete.ty).to_string(),
                    superclass: ctx.display_type(bound.ty).to_string(),
                    span: bound.span.map(Into::into),
                };
                self.mark_invalid(Some(diagnostic));
            }
            return;
        };
        if existing.ty == bound.ty {
            if bound.explicit && !existing.explicit {
                self.class_mut(class).superclass = Some(bound);
            }
            return;
        }
        if ctx.is_subclass_of(bound.ty, existing.ty) {
            self.class_mut(class).superclass = Some(bound);
            self.progress += 1;
        } else if !ctx.is_subclass_of(existing.ty, bound.ty) {
            let diagnostic = RequirementError::ConflictingSuperclasses {
                subject: ctx.display_type(self.class_term(class)).to_string(),
                first: ctx.display_type(existing.ty).to_string(),
                second: ctx.display_type(bound.ty).to_string(),
                span: bound.span.map(Into::into),
            };
            self.mark_invalid(Some(diagnostic));
        }
    }

    pub(crate) fn set_layout(
        &mut self,
        ctx: &mut GenericContext,
        class: ClassId,
        bound: LayoutBound,
        span: Option<Span>,
    ) {
        let class = self.find(class);
        let Some(existing) = self.class(class).layout else {
            self.class_mut(class).layout = Some(bound);
            self.progress += 1;
            if let Some(concrete) = self.class(class).concrete
                && !ctx.types.is_type_parameter(concrete.ty)
                && !ctx.satisfies_layout(concrete.ty, bound.layout)
            {
                let diagnostic = RequirementError::LayoutNotSatisfied {
                    ty: ctx.display_type(concrete.ty).to_string(),
                    layout: bound.layout.to_string(),
                    span: span.map(Into::into),
                };
                self.mark_invalid(Some(diagnostic));
            }
            return;
        };
        match existing.layout.merge(bound.layout) {
            Some(merged) => {
                let explicit = (merged == existing.layout && existing.explicit)
                    || (merged == bound.layout && bound.explicit);
                if merged != existing.layout {
                    self.progress += 1;
                }
                self.class_mut(class).layout = Some(LayoutBound {
                    layout: merged,
                    explicit,
                });
            }
            None => {
                let diagnostic = RequirementError::ConflictingLayouts {
                    subject: ctx.display_type(self.class_term(class)).to_string(),
                    first: existing.layout.to_string(),
                    second: bound.layout.to_string(),
                    span: span.map(Into::into),
                };
                self.mark_invalid(Some(diagnostic));
            }
        }
    }

    /// Equate two types at least one of which is concrete, matching their
    /// structure and equating the type parameters found at corresponding
    /// positions.
    pub(crate) fn unify_concrete(
        &mut self,
        ctx: &mut GenericContext,
        first: TypeId,
        second: TypeId,
        origin: Origin,
    ) {
        let first = ctx.types.canonical_type(first);
        let second = ctx.types.canonical_type(second);
        if first == second {
            return;
        }
        if ctx.types.is_type_parameter(first) || ctx.types.is_type_parameter(second) {
            self.worklist.push_back(Fact::Requirement {
                req: Requirement::same_type(first, second),
                origin,
            });
            return;
        }
        if !same_head(ctx, first, second) {
            let diagnostic = RequirementError::ConflictingSameType {
                first: ctx.display_type(first).to_string(),
                second: ctx.display_type(second).to_string(),
                span: origin.span().map(Into::into),
            };
            self.mark_invalid(Some(diagnostic));
            return;
        }
        let pairs: Vec<(TypeId, TypeId)> = ctx
            .types
            .get(first)
            .children()
            .into_iter()
            .zip(ctx.types.get(second).children())
            .collect();
        for (x, y) in pairs {
            self.unify_concrete(ctx, x, y, origin);
        }
    }

    /// Equate the member class `base.name` of a concrete class with the
    /// matching type witness of the concrete type's conformance.
    pub(crate) fn bind_member_witness(&mut self, ctx: &mut GenericContext, base: ClassId, member: ClassId) {
        let base = self.find(base);
        let Some(concrete) = self.class(base).concrete else {
            return;
        };
        if ctx.types.is_type_parameter(concrete.ty) {
            return;
        }
        let member = self.find(member);
        let member_term = self.class_term(member);
        let Ty::DependentMember { assoc, .. } = *ctx.types.get(member_term) else {
            return;
        };
        let protocol = ctx.decls.assoc_type(assoc).protocol;
        let conformance = ctx.lookup_conformance(concrete.ty, protocol);
        if conformance.is_invalid() {
            return;
        }
        let witness = conformance.type_witness(ctx, assoc);
        if witness.is_error() {
            return;
        }
        self.worklist.push_back(Fact::Requirement {
            req: Requirement::same_type(member_term, witness),
            origin: Origin::Derived,
        });
    }

    // ========================================================================
    // Merging
    // ========================================================================

    /// Union two classes. The older class survives, so root parameters keep
    /// their class and the anchors stay stable.
    pub(crate) fn merge(&mut self, ctx: &mut GenericContext, a: ClassId, b: ClassId) {
        let a = self.find(a);
        let b = self.find(b);
        if a == b {
            return;
        }
        let (keep, gone) = if a.0 < b.0 { (a, b) } else { (b, a) };
        self.parent[gone.0 as usize] = keep.0;
        self.progress += 1;
        self.anchors = None;

        let moved = std::mem::take(self.class_mut(gone));
        let keep_is_pack = self.class(keep).is_pack;
        if moved.is_pack != keep_is_pack {
            let diagnostic = RequirementError::PackScalarMismatch {
                first: ctx.display_type(self.class_term(keep)).to_string(),
                second: ctx.display_type(moved.terms[0]).to_string(),
                span: None,
            };
            self.mark_invalid(Some(diagnostic));
        } else if keep_is_pack {
            let keep_root = ctx.types.root_generic_param(self.class_term(keep));
            let moved_root = ctx.types.root_generic_param(moved.terms[0]);
            if let (Some(x), Some(y)) = (keep_root, moved_root) {
                self.union_shapes(x, y);
            }
        }

        let eager = self.limits.eager_depth;
        let data = self.class_mut(keep);
        data.terms.extend(moved.terms.iter().copied());
        data.parents.extend(moved.parents.iter().copied());
        data.explicit |= moved.explicit;
        data.depth = data.depth.min(moved.depth);
        for protocol in moved.expanded.iter().copied() {
            if !data.expanded.contains(&protocol) {
                data.expanded.push(protocol);
            }
        }
        data.pending.retain(|p| !moved.expanded.contains(p));
        for protocol in moved.pending.iter().copied() {
            if !data.expanded.contains(&protocol) && !data.pending.contains(&protocol) {
                data.pending.push(protocol);
            }
        }
        if data.depth <= eager {
            self.force_expand(keep);
        }

        for entry in moved.conformances.iter().copied() {
            let data = self.class_mut(keep);
            match data.conformances.iter_mut().find(|e| e.protocol == entry.protocol) {
                Some(existing) => {
                    if entry.seq < existing.seq {
                        existing.seq = entry.seq;
                        existing.derivation = entry.derivation;
                    }
                    existing.explicit |= entry.explicit;
                }
                None => {
                    data.conformances.push(entry);
                    if let Some(bound) = data.concrete {
                        self.check_concrete_conformance(ctx, bound, entry.protocol);
                    }
                }
            }
        }

        for (name, member) in moved.members.iter().copied() {
            match self.class(keep).member(name) {
                Some(existing) => self.worklist.push_back(Fact::Merge(existing, member)),
                None => {
                    self.class_mut(keep).members.push((name, member));
                    if self.class(keep).concrete.is_some() {
                        self.bind_member_witness(ctx, keep, member);
                    }
                }
            }
        }
        // Members the surviving class had before may now need witnesses
        // from the concrete type arriving with the merged class.
        if let Some(bound) = moved.concrete {
            self.set_concrete(ctx, keep, bound);
        }
        if let Some(bound) = moved.superclass {
            self.set_superclass(ctx, keep, bound);
        }
        if let Some(bound) = moved.layout {
            self.set_layout(ctx, keep, bound, None);
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Report a requirement whose type parameter never resolved.
    pub(super) fn report_unresolvable(&mut self, ctx: &mut GenericContext, req: Requirement, origin: Origin) {
        let span = origin.span();
        let mut types = vec![req.first_type()];
        if let Some(second) = req.second_type() {
            types.push(second);
        }
        for ty in types {
            let ty = ctx.types.canonical_type(ty);
            if !ctx.types.is_type_parameter(ty) {
                continue;
            }
            if let Some(diagnostic) = self.unresolvable_part(ctx, ty, span) {
                self.mark_invalid(Some(diagnostic));
                return;
            }
        }
        self.mark_invalid(None);
    }

    fn unresolvable_part(
        &mut self,
        ctx: &mut GenericContext,
        ty: TypeId,
        span: Option<Span>,
    ) -> Option<RequirementError> {
        if matches!(self.resolve(ctx, ty), Resolution::Resolved(_)) {
            return None;
        }
        match *ctx.types.get(ty) {
            Ty::DependentMember { base, assoc } => {
                if let Some(inner) = self.unresolvable_part(ctx, base, span) {
                    return Some(inner);
                }
                Some(RequirementError::UnknownMemberType {
                    base: ctx.display_type(base).to_string(),
                    member: ctx
                        .interner
                        .resolve(ctx.decls.assoc_type(assoc).name)
                        .to_string(),
                    span: span.map(Into::into),
                })
            }
            _ => Some(RequirementError::UnknownGenericParam {
                param: ctx.display_type(ty).to_string(),
                span: span.map(Into::into),
            }),
        }
    }
}

/// Same constructor with the same non-type payload, so the two types can
/// only differ in their children.
fn same_head(ctx: &GenericContext, a: TypeId, b: TypeId) -> bool {
    let a = ctx.types.get(a);
    let b = ctx.types.get(b);
    let b_children = b.children();
    !b_children.is_empty()
        && a.children().len() == b_children.len()
        && a.with_children(&b_children) == *b
}
