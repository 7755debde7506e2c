// requirement/invertible.rs
//
// Capability protocols every type conforms to unless it opts out.

use bitflags::bitflags;

use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvertibleProtocolKind {
    Copyable,
    Escapable,
}

impl InvertibleProtocolKind {
    pub const ALL: [InvertibleProtocolKind; 2] =
        [InvertibleProtocolKind::Copyable, InvertibleProtocolKind::Escapable];

    pub fn as_set(self) -> InvertibleProtocolSet {
        match self {
            InvertibleProtocolKind::Copyable => InvertibleProtocolSet::COPYABLE,
            InvertibleProtocolKind::Escapable => InvertibleProtocolSet::ESCAPABLE,
        }
    }
}

bitflags! {
    /// Set of suppressed (`~P`) invertible protocols.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InvertibleProtocolSet: u8 {
        const COPYABLE = 1 << 0;
        const ESCAPABLE = 1 << 1;
    }
}

/// `subject: ~Protocol`: the default conformance is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InverseRequirement {
    pub subject: TypeId,
    pub protocol: InvertibleProtocolKind,
}

impl InverseRequirement {
    pub fn new(subject: TypeId, protocol: InvertibleProtocolKind) -> Self {
        Self { subject, protocol }
    }
}
