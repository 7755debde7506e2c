// requirement/mod.rs
//
// Requirement primitives: one fact about a type parameter.

mod invertible;
mod layout;

pub use invertible::{InverseRequirement, InvertibleProtocolKind, InvertibleProtocolSet};
pub use layout::LayoutConstraint;

use sigil_identity::{ProtocolId, Span};

use crate::context::GenericContext;
use crate::subst::{SubstOptions, SubstitutionMap};
use crate::types::TypeId;

/// Requirement kinds in canonical sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequirementKind {
    SameShape,
    Conformance,
    Superclass,
    SameType,
    Layout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// `subject: Protocol`
    Conformance { subject: TypeId, protocol: ProtocolId },
    /// `first == second`
    SameType { first: TypeId, second: TypeId },
    /// `subject: ClassType`
    Superclass { subject: TypeId, superclass: TypeId },
    /// `subject: AnyObject` and friends
    Layout {
        subject: TypeId,
        layout: LayoutConstraint,
    },
    /// `(repeat (each first, each second))`: both packs have one shape.
    SameShape { first: TypeId, second: TypeId },
}

impl Requirement {
    pub fn conformance(subject: TypeId, protocol: ProtocolId) -> Self {
        Requirement::Conformance { subject, protocol }
    }

    pub fn same_type(first: TypeId, second: TypeId) -> Self {
        Requirement::SameType { first, second }
    }

    pub fn superclass(subject: TypeId, superclass: TypeId) -> Self {
        Requirement::Superclass {
            subject,
            superclass,
        }
    }

    pub fn layout(subject: TypeId, layout: LayoutConstraint) -> Self {
        Requirement::Layout { subject, layout }
    }

    pub fn same_shape(first: TypeId, second: TypeId) -> Self {
        Requirement::SameShape { first, second }
    }

    pub fn kind(&self) -> RequirementKind {
        match self {
            Requirement::Conformance { .. } => RequirementKind::Conformance,
            Requirement::SameType { .. } => RequirementKind::SameType,
            Requirement::Superclass { .. } => RequirementKind::Superclass,
            Requirement::Layout { .. } => RequirementKind::Layout,
            Requirement::SameShape { .. } => RequirementKind::SameShape,
        }
    }

    /// The constrained type (the left-hand side).
    pub fn first_type(&self) -> TypeId {
        match *self {
            Requirement::Conformance { subject, .. }
            | Requirement::Superclass { subject, .. }
            | Requirement::Layout { subject, .. } => subject,
            Requirement::SameType { first, .. } | Requirement::SameShape { first, .. } => first,
        }
    }

    /// The right-hand type, for requirements that have one.
    pub fn second_type(&self) -> Option<TypeId> {
        match *self {
            Requirement::SameType { second, .. } | Requirement::SameShape { second, .. } => {
                Some(second)
            }
            Requirement::Superclass { superclass, .. } => Some(superclass),
            Requirement::Conformance { .. } | Requirement::Layout { .. } => None,
        }
    }

    pub fn protocol(&self) -> Option<ProtocolId> {
        match *self {
            Requirement::Conformance { protocol, .. } => Some(protocol),
            _ => None,
        }
    }

    /// Rebuild with both types mapped through `f`.
    pub fn map_types(self, mut f: impl FnMut(TypeId) -> TypeId) -> Self {
        match self {
            Requirement::Conformance { subject, protocol } => Requirement::Conformance {
                subject: f(subject),
                protocol,
            },
            Requirement::SameType { first, second } => Requirement::SameType {
                first: f(first),
                second: f(second),
            },
            Requirement::Superclass {
                subject,
                superclass,
            } => Requirement::Superclass {
                subject: f(subject),
                superclass: f(superclass),
            },
            Requirement::Layout { subject, layout } => Requirement::Layout {
                subject: f(subject),
                layout,
            },
            Requirement::SameShape { first, second } => Requirement::SameShape {
                first: f(first),
                second: f(second),
            },
        }
    }

    /// Apply a substitution map to both sides.
    pub fn subst(self, ctx: &mut GenericContext, map: SubstitutionMap) -> Self {
        let first = ctx.subst_type(self.first_type(), map, SubstOptions::empty());
        let second = self
            .second_type()
            .map(|ty| ctx.subst_type(ty, map, SubstOptions::empty()));
        match self {
            Requirement::Conformance { protocol, .. } => Requirement::conformance(first, protocol),
            Requirement::Layout { layout, .. } => Requirement::layout(first, layout),
            Requirement::SameType { .. } => {
                Requirement::same_type(first, second.unwrap_or(TypeId::ERROR))
            }
            Requirement::Superclass { .. } => {
                Requirement::superclass(first, second.unwrap_or(TypeId::ERROR))
            }
            Requirement::SameShape { .. } => {
                Requirement::same_shape(first, second.unwrap_or(TypeId::ERROR))
            }
        }
    }
}

/// A requirement as written, with its location for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenRequirement {
    pub requirement: Requirement,
    pub span: Option<Span>,
}

impl WrittenRequirement {
    pub fn new(requirement: Requirement) -> Self {
        Self {
            requirement,
            span: None,
        }
    }

    pub fn with_span(requirement: Requirement, span: Span) -> Self {
        Self {
            requirement,
            span: Some(span),
        }
    }
}

impl From<Requirement> for WrittenRequirement {
    fn from(requirement: Requirement) -> Self {
        WrittenRequirement::new(requirement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_sort_in_canonical_order() {
        let mut kinds = vec![
            RequirementKind::Layout,
            RequirementKind::SameType,
            RequirementKind::Conformance,
            RequirementKind::SameShape,
            RequirementKind::Superclass,
        ];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                RequirementKind::SameShape,
                RequirementKind::Conformance,
                RequirementKind::Superclass,
                RequirementKind::SameType,
                RequirementKind::Layout,
            ]
        );
    }

    #[test]
    fn map_types_visits_both_sides() {
        let a = TypeId::new_for_test(10);
        let b = TypeId::new_for_test(11);
        let req = Requirement::same_type(a, b);
        let swapped = req.map_types(|ty| if ty == a { b } else { a });
        assert_eq!(swapped, Requirement::same_type(b, a));
        assert_eq!(swapped.first_type(), b);
        assert_eq!(swapped.second_type(), Some(a));
    }
}
