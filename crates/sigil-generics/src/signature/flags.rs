// signature/flags.rs

use bitflags::bitflags;

bitflags! {
    /// Problems found while building a signature. The signature is still
    /// usable; these tell the caller how far to trust it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GenericSignatureErrors: u8 {
        /// A requirement named an unknown type or contradicted another.
        const HAS_INVALID_REQUIREMENTS = 1 << 0;
        /// A conformance requirement was implied by a same-type requirement
        /// to a concrete type.
        const HAS_CONCRETE_CONFORMANCES = 1 << 1;
        /// The machine gave up; queries are best-effort.
        const COMPLETION_FAILED = 1 << 2;
    }
}
