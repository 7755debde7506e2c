// types/properties.rs
//
// Recursive type properties computed once at interning time.

use bitflags::bitflags;

bitflags! {
    /// Summary of what a type contains anywhere inside it. The substitution
    /// walk uses these to skip subtrees that cannot change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeProperties: u16 {
        const HAS_TYPE_PARAMETER = 1 << 0;
        const HAS_PRIMARY_ARCHETYPE = 1 << 1;
        const HAS_LOCAL_ARCHETYPE = 1 << 2;
        /// A pack type parameter or pack archetype.
        const HAS_PARAMETER_PACK = 1 << 3;
        /// A concrete `Pack { .. }` type.
        const HAS_PACK = 1 << 4;
        const HAS_PACK_EXPANSION = 1 << 5;
        const HAS_PACK_ELEMENT = 1 << 6;
        const HAS_ERROR = 1 << 7;
        /// Type alias sugar or a named generic parameter.
        const HAS_SUGAR = 1 << 8;
        const HAS_FOREIGN = 1 << 9;
    }
}

impl TypeProperties {
    pub const HAS_ARCHETYPE: TypeProperties = TypeProperties::HAS_PRIMARY_ARCHETYPE
        .union(TypeProperties::HAS_LOCAL_ARCHETYPE);
}
