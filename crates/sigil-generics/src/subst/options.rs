// subst/options.rs

use bitflags::bitflags;

bitflags! {
    /// How a substitution treats the leaves it meets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SubstOptions: u8 {
        /// Substitute primary archetypes through their interface types.
        const SUBSTITUTE_PRIMARY_ARCHETYPES = 1 << 0;
        /// Substitute local (pack element) archetypes through their
        /// interface types.
        const SUBSTITUTE_LOCAL_ARCHETYPES = 1 << 1;
        /// Parameters the source has no replacement for become the error
        /// type instead of staying as they are.
        const USE_ERROR_TYPE = 1 << 2;
    }
}
