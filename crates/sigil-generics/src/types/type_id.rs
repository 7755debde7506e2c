// types/type_id.rs
//
// TypeId: interned type handle with reserved constants for sentinel types.

use smallvec::SmallVec;

/// Identity of an interned type in the `TypeArena`.
///
/// Two structurally equal types always share a `TypeId`, so type equality is
/// handle equality. Sugared and canonical spellings of the same type are
/// distinct ids; compare `canonical_type` results when sugar must be ignored.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    // ========================================================================
    // Reserved TypeIds, interned at these indices by TypeArena::new()
    // ========================================================================

    /// The error type (must be 0 for is_error()).
    pub const ERROR: TypeId = TypeId(0);

    /// The empty tuple `()`.
    pub const EMPTY_TUPLE: TypeId = TypeId(1);

    /// First non-reserved TypeId index.
    pub const FIRST_DYNAMIC: u32 = 2;

    /// Get the raw index (for debugging and deterministic tie-breaks)
    pub fn index(self) -> u32 {
        self.0
    }

    pub(super) fn from_raw(index: u32) -> Self {
        TypeId(index)
    }

    #[inline]
    pub fn is_error(self) -> bool {
        self == Self::ERROR
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(index: u32) -> Self {
        TypeId(index)
    }
}

/// Small vector for child type lists. Most generic argument lists, tuples
/// and packs have four or fewer elements.
pub type TypeIdVec = SmallVec<[TypeId; 4]>;
