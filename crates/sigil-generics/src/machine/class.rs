// machine/class.rs
//
// Equivalence classes of type-parameter terms and their union-find.

use sigil_identity::{ProtocolId, Span, Symbol};
use smallvec::SmallVec;

use super::RequirementMachine;
use crate::requirement::LayoutConstraint;
use crate::types::TypeId;

/// Index of an equivalence class. Stale after merges; always pass through
/// `RequirementMachine::find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ClassId(pub(crate) u32);

/// How a conformance became known. Each derivation only refers to facts
/// recorded earlier, so following them always terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Derivation {
    /// Stated by the signature as `subject: P`.
    Explicit { subject: TypeId },
    /// Implied by conforming to a protocol that inherits P.
    Inherited { from: ProtocolId },
    /// Stated by `parent_protocol`'s requirement signature as
    /// `subject: P`, applied to `parent` as Self.
    Associated {
        parent: TypeId,
        parent_protocol: ProtocolId,
        subject: TypeId,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ConformanceEntry {
    pub(crate) protocol: ProtocolId,
    pub(crate) derivation: Derivation,
    /// Order in which the fact was recorded.
    pub(crate) seq: u32,
    pub(crate) explicit: bool,
}

/// A concrete type or superclass bound and whether a written requirement
/// stated it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bound {
    pub(crate) ty: TypeId,
    pub(crate) explicit: bool,
    pub(crate) span: Option<Span>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LayoutBound {
    pub(crate) layout: LayoutConstraint,
    pub(crate) explicit: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EquivClass {
    /// Root parameters and member terms created for this class.
    pub(crate) terms: SmallVec<[TypeId; 2]>,
    /// `(parent, name)` edges: this class is `parent.name`.
    pub(crate) parents: SmallVec<[(ClassId, Symbol); 1]>,
    pub(crate) members: SmallVec<[(Symbol, ClassId); 4]>,
    pub(crate) conformances: SmallVec<[ConformanceEntry; 4]>,
    /// Protocols whose requirement signatures were applied to this class.
    pub(crate) expanded: SmallVec<[ProtocolId; 4]>,
    /// Protocols whose requirement signatures are still to be applied.
    pub(crate) pending: SmallVec<[ProtocolId; 2]>,
    pub(crate) concrete: Option<Bound>,
    pub(crate) superclass: Option<Bound>,
    pub(crate) layout: Option<LayoutBound>,
    /// Touched by a written requirement.
    pub(crate) explicit: bool,
    pub(crate) is_pack: bool,
    /// Length of the shortest term this class was created from.
    pub(crate) depth: usize,
}

impl EquivClass {
    pub(crate) fn new(term: TypeId, depth: usize, is_pack: bool) -> Self {
        Self {
            terms: smallvec::smallvec![term],
            depth,
            is_pack,
            ..Self::default()
        }
    }

    pub(crate) fn conformance(&self, protocol: ProtocolId) -> Option<&ConformanceEntry> {
        self.conformances.iter().find(|e| e.protocol == protocol)
    }

    pub(crate) fn conforms_to(&self, protocol: ProtocolId) -> bool {
        self.conformance(protocol).is_some()
    }

    pub(crate) fn member(&self, name: Symbol) -> Option<ClassId> {
        self.members
            .iter()
            .find_map(|&(n, class)| (n == name).then_some(class))
    }
}

impl RequirementMachine {
    pub(crate) fn find(&mut self, class: ClassId) -> ClassId {
        let mut root = class.0;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Path compression.
        let mut cur = class.0;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        ClassId(root)
    }

    pub(crate) fn class(&self, class: ClassId) -> &EquivClass {
        &self.classes[class.0 as usize]
    }

    pub(crate) fn class_mut(&mut self, class: ClassId) -> &mut EquivClass {
        &mut self.classes[class.0 as usize]
    }

    pub(crate) fn new_class(&mut self, term: TypeId, depth: usize, is_pack: bool) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(EquivClass::new(term, depth, is_pack));
        self.parent.push(id.0);
        self.term_classes.insert(term, id);
        self.progress += 1;
        self.anchors = None;
        id
    }

    /// Representative term used when a class must be spelled as a type
    /// (e.g. as `Self` of an expanded protocol).
    pub(crate) fn class_term(&self, class: ClassId) -> TypeId {
        self.class(class).terms[0]
    }

    /// Live class representatives, in creation order.
    pub(crate) fn representatives(&self) -> Vec<ClassId> {
        (0..self.classes.len() as u32)
            .map(ClassId)
            .filter(|&c| self.parent[c.0 as usize] == c.0)
            .collect()
    }
}
