// requirement/layout.rs
//
// Layout constraints and their meet.

use std::fmt;

/// Representation constraint on a type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayoutConstraint {
    /// `AnyObject`: any class reference.
    Class,
    /// A class reference with native reference counting.
    NativeClass,
    /// Bitwise-copyable, any size.
    Trivial,
    TrivialOfExactSize(u32),
    TrivialOfAtMostSize(u32),
}

impl LayoutConstraint {
    pub fn is_class(self) -> bool {
        matches!(self, LayoutConstraint::Class | LayoutConstraint::NativeClass)
    }

    pub fn is_trivial(self) -> bool {
        !self.is_class()
    }

    /// The strongest constraint implied by both, or `None` if they conflict.
    pub fn merge(self, other: LayoutConstraint) -> Option<LayoutConstraint> {
        use LayoutConstraint::*;
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Class, NativeClass) | (NativeClass, Class) => Some(NativeClass),
            (Trivial, sized @ (TrivialOfExactSize(_) | TrivialOfAtMostSize(_)))
            | (sized @ (TrivialOfExactSize(_) | TrivialOfAtMostSize(_)), Trivial) => Some(sized),
            (TrivialOfExactSize(n), TrivialOfAtMostSize(m))
            | (TrivialOfAtMostSize(m), TrivialOfExactSize(n)) => {
                (n <= m).then_some(TrivialOfExactSize(n))
            }
            (TrivialOfAtMostSize(n), TrivialOfAtMostSize(m)) => Some(TrivialOfAtMostSize(n.min(m))),
            _ => None,
        }
    }

    /// True if every type satisfying `self` also satisfies `other`.
    pub fn implies(self, other: LayoutConstraint) -> bool {
        self.merge(other) == Some(self)
    }
}

impl fmt::Display for LayoutConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutConstraint::Class => f.write_str("AnyObject"),
            LayoutConstraint::NativeClass => f.write_str("_NativeClass"),
            LayoutConstraint::Trivial => f.write_str("_Trivial"),
            LayoutConstraint::TrivialOfExactSize(bits) => write!(f, "_Trivial({bits})"),
            LayoutConstraint::TrivialOfAtMostSize(bits) => write!(f, "_TrivialAtMost({bits})"),
        }
    }
}
