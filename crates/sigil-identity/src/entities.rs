//! First-class identity types for declarations the generics core refers to.
//!
//! Declarations live in the generics crate's registry; these ids are the
//! handles every type, requirement and conformance stores instead of names.

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $name(u32);

        impl $name {
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            pub fn index(self) -> u32 {
                self.0
            }
        }
    };
}

define_entity_id! {
    /// Identity for a protocol declaration
    pub struct ProtocolId;
}

define_entity_id! {
    /// Identity for an associated type declared inside a protocol
    pub struct AssocTypeId;
}

define_entity_id! {
    /// Identity for a nominal type declaration (struct, enum, class)
    pub struct NominalId;
}

define_entity_id! {
    /// Identity for a value declaration (method, property) inside a nominal
    pub struct ValueDeclId;
}

define_entity_id! {
    /// Identity for an opaque type imported from a foreign declaration
    pub struct ForeignTypeId;
}
