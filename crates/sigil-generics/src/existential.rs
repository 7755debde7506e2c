// existential.rs
//
// ExistentialLayout: the flattened description of a protocol composition
// consulted for class-boundness, representation and self-conformance.
// Computed on demand and never uniqued.

use sigil_identity::ProtocolId;
use smallvec::SmallVec;

use crate::context::GenericContext;
use crate::decls::KnownProtocolKind;
use crate::requirement::InvertibleProtocolSet;
use crate::types::{Ty, TypeId};

/// Representation class of an existential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistentialLayoutKind {
    /// A single class reference.
    Class,
    /// The boxed representation of `any Error`.
    Error,
    /// An opaque buffer plus witness tables.
    Opaque,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistentialLayout {
    pub explicit_superclass: Option<TypeId>,
    pub has_explicit_any_object: bool,
    pub contains_foreign_protocol: bool,
    /// A non-marker protocol that is not foreign.
    pub contains_native_protocol: bool,
    /// Member protocols in the order the composition names them, without
    /// duplicates or invertible protocols.
    pub protocols: SmallVec<[ProtocolId; 4]>,
    pub parameterized_protocols: SmallVec<[TypeId; 2]>,
    pub inverses: InvertibleProtocolSet,
    protocols_require_class: bool,
    protocol_superclass: Option<TypeId>,
}

impl ExistentialLayout {
    /// Layout of an existential type or of the constraint type inside one.
    /// Non-constraint types have the empty layout.
    pub fn new(ctx: &GenericContext, ty: TypeId) -> Self {
        let mut layout = Self::default();
        let mut ty = ctx.types.look_through_sugar(ty);
        if let Ty::Existential(constraint) = *ctx.types.get(ty) {
            ty = ctx.types.look_through_sugar(constraint);
        }
        layout.add_member(ctx, ty);
        layout
    }

    pub fn for_protocol(ctx: &GenericContext, protocol: ProtocolId) -> Self {
        let mut layout = Self::default();
        layout.add_protocol(ctx, protocol);
        layout
    }

    pub fn for_composition(ctx: &GenericContext, composition: TypeId) -> Self {
        debug_assert!(
            matches!(
                ctx.types.get(ctx.types.look_through_sugar(composition)),
                Ty::Composition { .. }
            ),
            "INTERNAL ERROR: not a protocol composition"
        );
        Self::new(ctx, composition)
    }

    pub fn for_parameterized(ctx: &GenericContext, parameterized: TypeId) -> Self {
        debug_assert!(
            matches!(
                ctx.types.get(ctx.types.look_through_sugar(parameterized)),
                Ty::ParameterizedProtocol { .. }
            ),
            "INTERNAL ERROR: not a parameterized protocol"
        );
        Self::new(ctx, parameterized)
    }

    fn add_member(&mut self, ctx: &GenericContext, member: TypeId) {
        let member = ctx.types.look_through_sugar(member);
        match ctx.types.get(member) {
            Ty::Protocol(protocol) => self.add_protocol(ctx, *protocol),
            Ty::ParameterizedProtocol { base, .. } => {
                self.add_protocol(ctx, *base);
                if !self.parameterized_protocols.contains(&member) {
                    self.parameterized_protocols.push(member);
                }
            }
            Ty::Composition {
                members,
                any_object,
                inverses,
            } => {
                self.has_explicit_any_object |= *any_object;
                self.inverses |= *inverses;
                for &nested in members {
                    self.add_member(ctx, nested);
                }
            }
            Ty::Nominal { .. } | Ty::Foreign(_) | Ty::Archetype { .. } => {
                if self.explicit_superclass.is_none() {
                    self.explicit_superclass = Some(member);
                }
            }
            _ => {}
        }
    }

    fn add_protocol(&mut self, ctx: &GenericContext, protocol: ProtocolId) {
        let decl = ctx.decls.protocol(protocol);
        if decl.known.and_then(KnownProtocolKind::invertible).is_some()
            || self.protocols.contains(&protocol)
        {
            return;
        }
        if decl.is_foreign {
            self.contains_foreign_protocol = true;
        } else if !decl.is_marker {
            self.contains_native_protocol = true;
        }
        if ctx.decls.protocol_requires_class(protocol) {
            self.protocols_require_class = true;
        }
        if self.protocol_superclass.is_none() {
            self.protocol_superclass = ctx.decls.protocol_superclass(protocol);
        }
        self.protocols.push(protocol);
    }

    pub fn kind(&self, ctx: &GenericContext) -> ExistentialLayoutKind {
        if self.requires_class() {
            ExistentialLayoutKind::Class
        } else if self.is_error_existential(ctx) {
            ExistentialLayoutKind::Error
        } else {
            ExistentialLayoutKind::Opaque
        }
    }

    pub fn requires_class(&self) -> bool {
        self.has_explicit_any_object
            || self.explicit_superclass.is_some()
            || self.protocols_require_class
    }

    /// Exactly `any Error`, with nothing else composed in.
    pub fn is_error_existential(&self, ctx: &GenericContext) -> bool {
        !self.has_explicit_any_object
            && self.explicit_superclass.is_none()
            && self.parameterized_protocols.is_empty()
            && self.inverses.is_empty()
            && matches!(
                self.protocols.as_slice(),
                [only] if ctx.decls.protocol(*only).known == Some(KnownProtocolKind::Error)
            )
    }

    /// `AnyObject` alone.
    pub fn represents_plain_any_object(&self) -> bool {
        self.has_explicit_any_object
            && self.explicit_superclass.is_none()
            && self.protocols.is_empty()
            && self.parameterized_protocols.is_empty()
    }

    /// Representable as a foreign object reference. Any native protocol
    /// rules this out.
    pub fn is_objc(&self) -> bool {
        (self.explicit_superclass.is_some()
            || self.has_explicit_any_object
            || self.contains_foreign_protocol)
            && !self.contains_native_protocol
    }

    /// Whether the runtime shape needs more than the flat protocol list.
    pub fn needs_extended_shape(&self, allow_inverses: bool) -> bool {
        !self.parameterized_protocols.is_empty() || (allow_inverses && !self.inverses.is_empty())
    }

    pub fn contains_non_marker_protocols(&self, ctx: &GenericContext) -> bool {
        self.protocols
            .iter()
            .any(|&protocol| !ctx.decls.protocol(protocol).is_marker)
    }

    /// The explicit superclass, else the first superclass a member protocol
    /// imposes.
    pub fn superclass(&self) -> Option<TypeId> {
        self.explicit_superclass.or(self.protocol_superclass)
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::testing::Stdlib;

    #[test]
    fn any_object_and_sendable_is_class_bound() {
        let mut lib = Stdlib::new();
        let sendable = lib.ctx.types.protocol(lib.sendable);
        let composition = lib.ctx.types.composition(
            smallvec![sendable],
            true,
            InvertibleProtocolSet::empty(),
        );
        let existential = lib.ctx.types.existential(composition);
        let layout = ExistentialLayout::new(&lib.ctx, existential);
        assert!(layout.has_explicit_any_object);
        assert_eq!(layout.kind(&lib.ctx), ExistentialLayoutKind::Class);
        assert!(!layout.is_error_existential(&lib.ctx));
        assert!(!layout.contains_non_marker_protocols(&lib.ctx));
        assert!(layout.is_objc());
    }

    #[test]
    fn error_existential_is_a_strict_singleton() {
        let mut lib = Stdlib::new();
        let error = lib.ctx.types.protocol(lib.error);
        let layout = ExistentialLayout::new(&lib.ctx, error);
        assert_eq!(layout.kind(&lib.ctx), ExistentialLayoutKind::Error);

        let equatable = lib.ctx.types.protocol(lib.equatable);
        let both = lib.ctx.types.composition(
            smallvec![error, equatable],
            false,
            InvertibleProtocolSet::empty(),
        );
        let layout = ExistentialLayout::for_composition(&lib.ctx, both);
        assert!(!layout.is_error_existential(&lib.ctx));
        assert_eq!(layout.kind(&lib.ctx), ExistentialLayoutKind::Opaque);

        let base = lib.base_of(lib.int);
        let with_class = lib.ctx.types.composition(
            smallvec![error, base],
            false,
            InvertibleProtocolSet::empty(),
        );
        let layout = ExistentialLayout::new(&lib.ctx, with_class);
        assert_eq!(layout.explicit_superclass, Some(base));
        assert_eq!(layout.kind(&lib.ctx), ExistentialLayoutKind::Class);
    }

    #[test]
    fn native_protocol_vetoes_objc() {
        let mut lib = Stdlib::new();
        let objc = lib.ctx.types.protocol(lib.ns_object_protocol);
        let layout = ExistentialLayout::new(&lib.ctx, objc);
        assert!(layout.contains_foreign_protocol);
        assert!(layout.requires_class());
        assert!(layout.is_objc());

        let equatable = lib.ctx.types.protocol(lib.equatable);
        let mixed = lib.ctx.types.composition(
            smallvec![objc, equatable],
            false,
            InvertibleProtocolSet::empty(),
        );
        let layout = ExistentialLayout::new(&lib.ctx, mixed);
        assert!(layout.contains_native_protocol);
        assert!(!layout.is_objc());
    }

    #[test]
    fn inverses_and_parameterized_protocols_need_extended_shape() {
        let mut lib = Stdlib::new();
        let sequence_of_int = lib
            .ctx
            .types
            .parameterized_protocol(lib.sequence, smallvec![lib.int]);
        let layout = ExistentialLayout::for_parameterized(&lib.ctx, sequence_of_int);
        assert_eq!(layout.protocols.as_slice(), &[lib.sequence]);
        assert!(layout.needs_extended_shape(false));

        let noncopyable = lib.ctx.types.composition(
            smallvec![],
            false,
            InvertibleProtocolSet::COPYABLE,
        );
        let layout = ExistentialLayout::new(&lib.ctx, noncopyable);
        assert!(layout.needs_extended_shape(true));
        assert!(!layout.needs_extended_shape(false));
        assert_eq!(layout.kind(&lib.ctx), ExistentialLayoutKind::Opaque);
    }

    #[test]
    fn member_order_is_kept_and_duplicates_dropped() {
        let mut lib = Stdlib::new();
        let hashable = lib.ctx.types.protocol(lib.hashable);
        let equatable = lib.ctx.types.protocol(lib.equatable);
        let copyable = lib.ctx.types.protocol(lib.copyable);
        let composition = lib.ctx.types.composition(
            smallvec![hashable, equatable, hashable, copyable],
            false,
            InvertibleProtocolSet::empty(),
        );
        let layout = ExistentialLayout::new(&lib.ctx, composition);
        assert_eq!(layout.protocols.as_slice(), &[lib.hashable, lib.equatable]);
    }
}
