// subst/in_flight.rs
//
// State of one substitution in progress.
//
// Pack expansions are substituted one component at a time. While a
// component is being produced, a frame on the active-expansion stack says
// which element of each substituted pack is "current": a reference to a
// pack parameter inside the expansion pattern resolves to that element
// rather than to the whole pack. Frames are pushed and popped by scope
// guards so a callback that returns early or unwinds cannot leave the
// stack unbalanced.

use std::ops::{Deref, DerefMut};

use sigil_identity::ProtocolId;

use super::options::SubstOptions;
use super::walk;
use crate::conformance::ProtocolConformanceRef;
use crate::context::GenericContext;
use crate::types::{TypeId, TypeProperties};

/// Where replacement types and conformances come from.
pub trait SubstSource {
    /// Replacement for the generic parameter `param`, or `None` to leave it
    /// alone.
    fn replacement(&mut self, ctx: &mut GenericContext, param: TypeId) -> Option<TypeId>;

    /// Conformance of `subst` (the substituted form of `orig`) to
    /// `protocol`.
    fn conformance(
        &mut self,
        ctx: &mut GenericContext,
        orig: TypeId,
        subst: TypeId,
        protocol: ProtocolId,
    ) -> ProtocolConformanceRef;
}

/// A source built from a pair of callbacks.
pub struct FnSource<F, G> {
    subst: F,
    lookup: G,
}

impl<F, G> FnSource<F, G>
where
    F: FnMut(&mut GenericContext, TypeId) -> Option<TypeId>,
    G: FnMut(&mut GenericContext, TypeId, TypeId, ProtocolId) -> ProtocolConformanceRef,
{
    pub fn new(subst: F, lookup: G) -> Self {
        Self { subst, lookup }
    }
}

impl<F, G> SubstSource for FnSource<F, G>
where
    F: FnMut(&mut GenericContext, TypeId) -> Option<TypeId>,
    G: FnMut(&mut GenericContext, TypeId, TypeId, ProtocolId) -> ProtocolConformanceRef,
{
    fn replacement(&mut self, ctx: &mut GenericContext, param: TypeId) -> Option<TypeId> {
        (self.subst)(ctx, param)
    }

    fn conformance(
        &mut self,
        ctx: &mut GenericContext,
        orig: TypeId,
        subst: TypeId,
        protocol: ProtocolId,
    ) -> ProtocolConformanceRef {
        (self.lookup)(ctx, orig, subst, protocol)
    }
}

/// Conformance callback that ignores the original type and looks the
/// substituted one up globally.
pub fn lookup_in_context(
    ctx: &mut GenericContext,
    _orig: TypeId,
    subst: TypeId,
    protocol: ProtocolId,
) -> ProtocolConformanceRef {
    ctx.lookup_conformance(subst, protocol)
}

/// One pack expansion being expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePackExpansion {
    /// The current component is itself an expansion (the pack parameter
    /// was replaced by another pack's expansion).
    pub is_subst_expansion: bool,
    /// Index of the current component in the substituted pack.
    pub index: usize,
}

pub struct InFlightSubstitution<'a> {
    source: &'a mut dyn SubstSource,
    options: SubstOptions,
    active: Vec<ActivePackExpansion>,
    pub(super) depth: usize,
    pub(super) max_depth: usize,
}

impl<'a> InFlightSubstitution<'a> {
    pub fn new(ctx: &GenericContext, source: &'a mut dyn SubstSource, options: SubstOptions) -> Self {
        Self {
            source,
            options,
            active: Vec::new(),
            depth: 0,
            max_depth: ctx.config().max_substitution_depth,
        }
    }

    pub fn options(&self) -> SubstOptions {
        self.options
    }

    pub fn active_expansions(&self) -> &[ActivePackExpansion] {
        &self.active
    }

    /// True when substitution cannot change `ty`.
    pub fn is_invariant(&self, ctx: &GenericContext, ty: TypeId) -> bool {
        let mut relevant = TypeProperties::HAS_TYPE_PARAMETER | TypeProperties::HAS_PACK_ELEMENT;
        if self.options.contains(SubstOptions::SUBSTITUTE_PRIMARY_ARCHETYPES) {
            relevant |= TypeProperties::HAS_PRIMARY_ARCHETYPE;
        }
        if self.options.contains(SubstOptions::SUBSTITUTE_LOCAL_ARCHETYPES) {
            relevant |= TypeProperties::HAS_LOCAL_ARCHETYPE;
        }
        !ctx.types.has(ty, relevant)
    }

    /// Substitute `ty` completely.
    pub fn subst_type(&mut self, ctx: &mut GenericContext, ty: TypeId) -> TypeId {
        walk::subst(self, ctx, ty, 0)
    }

    /// Replacement for a generic parameter leaf. Inside an active
    /// expansion, a pack parameter resolves to the current element of its
    /// replacement pack, chosen by the frame `level` expansions out.
    pub fn subst_param(&mut self, ctx: &mut GenericContext, param: TypeId, level: u32) -> Option<TypeId> {
        let subst = self.source.replacement(ctx, param)?;
        if self.active.is_empty() || !ctx.types.is_parameter_pack(param) {
            return Some(subst);
        }
        let frame = self.frame(level);
        let Some(elements) = ctx.types.pack_elements(subst) else {
            return Some(subst);
        };
        let Some(&element) = elements.get(frame.index) else {
            debug_assert!(false, "INTERNAL ERROR: pack replacement shorter than its shape");
            return Some(TypeId::ERROR);
        };
        if !frame.is_subst_expansion {
            debug_assert!(
                !ctx.types.is_pack_expansion(element),
                "INTERNAL ERROR: scalar component replaced by an expansion"
            );
            return Some(element);
        }
        Some(
            ctx.types
                .pack_expansion_parts(element)
                .map_or(element, |(pattern, _)| pattern),
        )
    }

    /// Conformance of the substituted `orig` to `protocol`. Inside an active
    /// expansion, a pack conformance is narrowed to the current element.
    pub fn lookup_conformance(
        &mut self,
        ctx: &mut GenericContext,
        orig: TypeId,
        protocol: ProtocolId,
        level: u32,
    ) -> ProtocolConformanceRef {
        let subst = self.baseline(|ifs| walk::subst(ifs, ctx, orig, 0));
        let conformance = self.source.conformance(ctx, orig, subst, protocol);
        if self.active.is_empty() || !ctx.types.is_parameter_pack(orig) {
            return conformance;
        }
        let Some(pack) = conformance.pack() else {
            return conformance;
        };
        let frame = self.frame(level);
        pack.elements(ctx)
            .get(frame.index)
            .copied()
            .unwrap_or(ProtocolConformanceRef::Invalid)
    }

    /// Expand the pack expansion whose count is `shape`.
    ///
    /// `shape` is substituted without the current active expansions, then
    /// `f` runs once per component of the result: with `None` for a scalar
    /// component and `Some(count)` for a component that is itself an
    /// expansion. A frame for the component is active while `f` runs.
    pub fn expand_pack_expansion_shape(
        &mut self,
        ctx: &mut GenericContext,
        shape: TypeId,
        f: &mut dyn FnMut(&mut GenericContext, &mut InFlightSubstitution<'a>, Option<TypeId>),
    ) {
        let subst_shape = self.baseline(|ifs| walk::subst(ifs, ctx, shape, 0));
        let Some(components) = ctx.types.pack_elements(subst_shape).map(<[TypeId]>::to_vec) else {
            tracing::trace!(shape = %ctx.display_type(subst_shape), "expanding abstract pack shape");
            let mut scope = self.push_expansion(ActivePackExpansion {
                is_subst_expansion: true,
                index: 0,
            });
            f(ctx, &mut *scope, Some(subst_shape));
            return;
        };
        tracing::trace!(components = components.len(), "expanding pack shape");
        for (index, component) in components.into_iter().enumerate() {
            let count = ctx.types.pack_expansion_parts(component).map(|(_, count)| count);
            let mut scope = self.push_expansion(ActivePackExpansion {
                is_subst_expansion: count.is_some(),
                index,
            });
            f(ctx, &mut *scope, count);
        }
    }

    /// Expand `expansion` (a `repeat pattern` type), passing each
    /// substituted component to `f`. A non-expansion is substituted and
    /// passed through as a single component.
    pub fn expand_pack_expansion_type(
        &mut self,
        ctx: &mut GenericContext,
        expansion: TypeId,
        f: &mut dyn FnMut(&mut GenericContext, TypeId),
    ) {
        let Some((pattern, count)) = ctx.types.pack_expansion_parts(expansion) else {
            let substituted = self.subst_type(ctx, expansion);
            f(ctx, substituted);
            return;
        };
        self.expand_pack_expansion_shape(ctx, count, &mut |ctx, ifs, shape| {
            let substituted = ifs.subst_type(ctx, pattern);
            let component = match shape {
                Some(shape) => ctx.types.pack_expansion(substituted, shape),
                None => substituted,
            };
            f(ctx, component);
        });
    }

    /// Run `f` with `options` in effect, restoring the current options
    /// afterwards.
    pub fn with_new_options<R>(
        &mut self,
        options: SubstOptions,
        f: impl FnOnce(&mut InFlightSubstitution<'a>) -> R,
    ) -> R {
        let mut scope = OptionsAdjustmentScope::new(self, options);
        f(&mut *scope)
    }

    fn frame(&self, level: u32) -> ActivePackExpansion {
        let level = level as usize;
        assert!(
            level < self.active.len(),
            "INTERNAL ERROR: pack element refers to an expansion that is not active"
        );
        self.active[self.active.len() - 1 - level]
    }

    fn push_expansion(&mut self, frame: ActivePackExpansion) -> ActiveExpansionScope<'_, 'a> {
        self.active.push(frame);
        ActiveExpansionScope { ifs: self }
    }

    /// Run `f` with no active expansions, as when substituting a whole
    /// pack rather than one of its elements.
    fn baseline<R>(&mut self, f: impl FnOnce(&mut InFlightSubstitution<'a>) -> R) -> R {
        let saved = std::mem::take(&mut self.active);
        let mut scope = BaselineScope { ifs: self, saved };
        f(&mut *scope)
    }
}

/// Pops the frame it was created for.
struct ActiveExpansionScope<'s, 'a> {
    ifs: &'s mut InFlightSubstitution<'a>,
}

impl Drop for ActiveExpansionScope<'_, '_> {
    fn drop(&mut self) {
        self.ifs.active.pop();
    }
}

impl<'a> Deref for ActiveExpansionScope<'_, 'a> {
    type Target = InFlightSubstitution<'a>;

    fn deref(&self) -> &InFlightSubstitution<'a> {
        self.ifs
    }
}

impl<'a> DerefMut for ActiveExpansionScope<'_, 'a> {
    fn deref_mut(&mut self) -> &mut InFlightSubstitution<'a> {
        self.ifs
    }
}

/// Restores the options in effect when it was created.
struct OptionsAdjustmentScope<'s, 'a> {
    ifs: &'s mut InFlightSubstitution<'a>,
    saved: SubstOptions,
}

impl<'s, 'a> OptionsAdjustmentScope<'s, 'a> {
    fn new(ifs: &'s mut InFlightSubstitution<'a>, options: SubstOptions) -> Self {
        let saved = std::mem::replace(&mut ifs.options, options);
        Self { ifs, saved }
    }
}

impl Drop for OptionsAdjustmentScope<'_, '_> {
    fn drop(&mut self) {
        self.ifs.options = self.saved;
    }
}

impl<'a> Deref for OptionsAdjustmentScope<'_, 'a> {
    type Target = InFlightSubstitution<'a>;

    fn deref(&self) -> &InFlightSubstitution<'a> {
        self.ifs
    }
}

impl<'a> DerefMut for OptionsAdjustmentScope<'_, 'a> {
    fn deref_mut(&mut self) -> &mut InFlightSubstitution<'a> {
        self.ifs
    }
}

/// Restores the active expansions set aside by `baseline`.
struct BaselineScope<'s, 'a> {
    ifs: &'s mut InFlightSubstitution<'a>,
    saved: Vec<ActivePackExpansion>,
}

impl Drop for BaselineScope<'_, '_> {
    fn drop(&mut self) {
        self.ifs.active = std::mem::take(&mut self.saved);
    }
}

impl<'a> Deref for BaselineScope<'_, 'a> {
    type Target = InFlightSubstitution<'a>;

    fn deref(&self) -> &InFlightSubstitution<'a> {
        self.ifs
    }
}

impl<'a> DerefMut for BaselineScope<'_, 'a> {
    fn deref_mut(&mut self) -> &mut InFlightSubstitution<'a> {
        self.ifs
    }
}
