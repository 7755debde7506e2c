// machine/query.rs
//
// Questions answered by a completed machine. Every query first prepares the
// subject's class, so deferred protocol expansions that could affect the
// answer are applied before it is given.

use sigil_identity::ProtocolId;

use super::class::{ClassId, Derivation};
use super::RequirementMachine;
use crate::context::GenericContext;
use crate::requirement::{LayoutConstraint, Requirement};
use crate::types::{TypeId, TypeIdVec, TypeProperties, transform_type};

/// Bound on how many times a concrete type is reduced within itself, for
/// self-referential bindings such as `T == Array<T>`.
const MAX_CONCRETE_NESTING: usize = 8;

impl RequirementMachine {
    /// Rewrite every type parameter in `ty` to its reduced form: the
    /// class's concrete type if it has one, otherwise the class anchor.
    pub(crate) fn reduced_type(&mut self, ctx: &mut GenericContext, ty: TypeId) -> TypeId {
        self.reduce(ctx, ty, 0)
    }

    fn reduce(&mut self, ctx: &mut GenericContext, ty: TypeId, nesting: usize) -> TypeId {
        let ty = ctx.types.canonical_type(ty);
        if !ctx.types.has(ty, TypeProperties::HAS_TYPE_PARAMETER) {
            return ty;
        }
        transform_type(ctx, ty, &mut |ctx, node| {
            if !ctx.types.is_type_parameter(node) {
                return None;
            }
            let Some(class) = self.prepare(ctx, node) else {
                return Some(node);
            };
            if let Some(bound) = self.class(class).concrete
                && nesting < MAX_CONCRETE_NESTING
            {
                return Some(self.reduce(ctx, bound.ty, nesting + 1));
            }
            Some(self.anchor(ctx, class))
        })
    }

    pub(crate) fn requires_protocol(
        &mut self,
        ctx: &mut GenericContext,
        ty: TypeId,
        protocol: ProtocolId,
    ) -> bool {
        self.prepare(ctx, ty)
            .is_some_and(|class| self.class(class).conforms_to(protocol))
    }

    /// Protocols the class conforms to, minimized under inheritance and in
    /// canonical order.
    pub(crate) fn required_protocols(&mut self, ctx: &mut GenericContext, ty: TypeId) -> Vec<ProtocolId> {
        let Some(class) = self.prepare(ctx, ty) else {
            return Vec::new();
        };
        let mut protocols: Vec<ProtocolId> = self
            .class(class)
            .conformances
            .iter()
            .map(|entry| entry.protocol)
            .collect();
        ctx.decls.minimize_protocols(&ctx.interner, &mut protocols);
        protocols
    }

    pub(crate) fn requires_class(&mut self, ctx: &mut GenericContext, ty: TypeId) -> bool {
        let Some(class) = self.prepare(ctx, ty) else {
            return false;
        };
        let data = self.class(class);
        if data.layout.is_some_and(|bound| bound.layout.is_class()) || data.superclass.is_some() {
            return true;
        }
        if data
            .conformances
            .iter()
            .any(|entry| ctx.decls.protocol_requires_class(entry.protocol))
        {
            return true;
        }
        data.concrete.is_some_and(|bound| ctx.is_class_type(bound.ty))
    }

    pub(crate) fn superclass_bound(&mut self, ctx: &mut GenericContext, ty: TypeId) -> Option<TypeId> {
        let class = self.prepare(ctx, ty)?;
        let bound = self.class(class).superclass?;
        Some(self.reduced_type(ctx, bound.ty))
    }

    pub(crate) fn concrete_type(&mut self, ctx: &mut GenericContext, ty: TypeId) -> Option<TypeId> {
        let class = self.prepare(ctx, ty)?;
        let bound = self.class(class).concrete?;
        Some(self.reduce(ctx, bound.ty, 1))
    }

    pub(crate) fn layout_constraint(
        &mut self,
        ctx: &mut GenericContext,
        ty: TypeId,
    ) -> Option<LayoutConstraint> {
        let class = self.prepare(ctx, ty)?;
        let data = self.class(class);
        match data.layout {
            Some(bound) => Some(bound.layout),
            None if data.superclass.is_some() => Some(LayoutConstraint::Class),
            None => None,
        }
    }

    /// Equality of two type parameters under the signature.
    ///
    /// # Panics
    /// If either type is not a type parameter.
    pub(crate) fn are_equal(&mut self, ctx: &mut GenericContext, a: TypeId, b: TypeId) -> bool {
        assert!(
            ctx.types.is_type_parameter(a) && ctx.types.is_type_parameter(b),
            "INTERNAL ERROR: are_reduced_type_parameters_equal called on a concrete type"
        );
        match (self.prepare(ctx, a), self.prepare(ctx, b)) {
            (Some(x), Some(y)) => x == y,
            _ => ctx.types.canonical_type(a) == ctx.types.canonical_type(b),
        }
    }

    pub(crate) fn is_valid_type_parameter(&mut self, ctx: &mut GenericContext, ty: TypeId) -> bool {
        self.prepare(ctx, ty).is_some()
    }

    /// Derivation chain of `ty: protocol`, starting at a conformance
    /// requirement of the signature. Empty when the conformance is not
    /// required.
    pub(crate) fn conformance_path(
        &mut self,
        ctx: &mut GenericContext,
        ty: TypeId,
        protocol: ProtocolId,
    ) -> Vec<(TypeId, ProtocolId)> {
        let Some(class) = self.prepare(ctx, ty) else {
            return Vec::new();
        };
        let mut steps = Vec::new();
        let budget = self.next_seq as usize + 1;
        if !self.collect_path(ctx, class, protocol, &mut steps, budget) {
            return Vec::new();
        }
        steps
    }

    fn collect_path(
        &mut self,
        ctx: &mut GenericContext,
        class: ClassId,
        protocol: ProtocolId,
        steps: &mut Vec<(TypeId, ProtocolId)>,
        budget: usize,
    ) -> bool {
        if budget == 0 {
            return false;
        }
        let class = self.find(class);
        let Some(entry) = self.class(class).conformance(protocol).copied() else {
            return false;
        };
        match entry.derivation {
            Derivation::Explicit { subject } => {
                let subject = self.reduced_type(ctx, subject);
                steps.push((subject, protocol));
                true
            }
            Derivation::Inherited { from } => {
                if !self.collect_path(ctx, class, from, steps, budget - 1) {
                    return false;
                }
                let protocol_self = ctx.types.protocol_self();
                steps.push((protocol_self, protocol));
                true
            }
            Derivation::Associated {
                parent,
                parent_protocol,
                subject,
            } => {
                let Some(&parent_class) = self.term_classes.get(&parent) else {
                    return false;
                };
                if !self.collect_path(ctx, parent_class, parent_protocol, steps, budget - 1) {
                    return false;
                }
                steps.push((subject, protocol));
                true
            }
        }
    }

    // ========================================================================
    // Shapes
    // ========================================================================

    /// Reduced shape: the first pack parameter of the shape class for pack
    /// type parameters, `()` for scalars, and an element-wise shape for
    /// concrete packs.
    pub(crate) fn reduced_shape(&mut self, ctx: &mut GenericContext, ty: TypeId) -> TypeId {
        let ty = ctx.types.canonical_type(ty);
        if ctx.types.is_parameter_pack(ty) {
            self.drain(ctx);
            return match ctx.types.root_generic_param(ty) {
                Some(root) => self.shape_root(root),
                None => ty,
            };
        }
        if let Some(elements) = ctx.types.pack_elements(ty) {
            let elements: TypeIdVec = elements.iter().copied().collect();
            let shapes: TypeIdVec = elements
                .into_iter()
                .map(|element| match ctx.types.pack_expansion_parts(element) {
                    Some((_, count)) => {
                        let count = self.reduced_shape(ctx, count);
                        ctx.types.pack_expansion(TypeId::EMPTY_TUPLE, count)
                    }
                    None => TypeId::EMPTY_TUPLE,
                })
                .collect();
            return ctx.types.pack(shapes);
        }
        TypeId::EMPTY_TUPLE
    }

    /// Pack parameters grouped by shape, each group led by its reduced
    /// shape.
    pub(crate) fn shape_classes(&mut self, ctx: &mut GenericContext) -> Vec<Vec<TypeId>> {
        self.drain(ctx);
        let mut groups: Vec<Vec<TypeId>> = Vec::new();
        let params = self.params.clone();
        for param in params {
            if !ctx.types.is_parameter_pack(param) {
                continue;
            }
            let root = self.shape_root(param);
            match groups.iter_mut().find(|group| group[0] == root) {
                Some(group) => {
                    if param != root {
                        group.push(param);
                    }
                }
                None => {
                    let mut group = vec![root];
                    if param != root {
                        group.push(param);
                    }
                    groups.push(group);
                }
            }
        }
        groups
    }

    // ========================================================================
    // Entailment
    // ========================================================================

    /// Whether the facts of this machine entail `req`.
    pub(crate) fn is_satisfied(
        &mut self,
        ctx: &mut GenericContext,
        req: Requirement,
        allow_missing: bool,
        broken_pack_behavior: bool,
    ) -> bool {
        let first = self.reduced_type(ctx, req.first_type());
        match req {
            Requirement::Conformance { protocol, .. } => {
                if ctx.types.is_type_parameter(first) {
                    if self.requires_protocol(ctx, first, protocol) {
                        return true;
                    }
                    // A class bound satisfies the conformances of its class.
                    return self
                        .superclass_bound(ctx, first)
                        .is_some_and(|bound| !ctx.lookup_conformance(bound, protocol).is_invalid());
                }
                let conformance = ctx.lookup_conformance(first, protocol);
                if conformance.is_invalid() {
                    return allow_missing && ctx.decls.protocol(protocol).is_marker;
                }
                match conformance.pack() {
                    Some(pack) if !broken_pack_behavior => pack
                        .elements(ctx)
                        .iter()
                        .all(|element| !element.is_invalid()),
                    _ => true,
                }
            }
            Requirement::SameType { second, .. } => {
                let second = self.reduced_type(ctx, second);
                first == second
            }
            Requirement::Superclass { superclass, .. } => {
                let superclass = self.reduced_type(ctx, superclass);
                if ctx.types.is_type_parameter(first) {
                    return self
                        .superclass_bound(ctx, first)
                        .is_some_and(|bound| ctx.is_subclass_of(bound, superclass));
                }
                ctx.is_subclass_of(first, superclass)
            }
            Requirement::Layout { layout, .. } => {
                if ctx.types.is_type_parameter(first) {
                    if layout == LayoutConstraint::Class {
                        return self.requires_class(ctx, first);
                    }
                    return self
                        .layout_constraint(ctx, first)
                        .is_some_and(|known| known.implies(layout));
                }
                ctx.satisfies_layout(first, layout)
            }
            Requirement::SameShape { second, .. } => {
                let a = self.reduced_shape(ctx, req.first_type());
                let b = self.reduced_shape(ctx, second);
                a == b
            }
        }
    }
}
