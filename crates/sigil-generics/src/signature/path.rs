// signature/path.rs

use sigil_identity::ProtocolId;
use smallvec::SmallVec;

use crate::context::GenericContext;
use crate::types::TypeId;

/// How a conformance follows from a signature's requirements.
///
/// The first step is a conformance requirement of the signature itself.
/// Each later step is a requirement of the previous step's protocol, with
/// its subject written relative to that protocol's `Self` (τ_0_0).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConformancePath {
    steps: SmallVec<[(TypeId, ProtocolId); 4]>,
}

impl ConformancePath {
    pub(crate) fn new(steps: impl IntoIterator<Item = (TypeId, ProtocolId)>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, ProtocolId)> + '_ {
        self.steps.iter().copied()
    }

    pub fn first(&self) -> Option<(TypeId, ProtocolId)> {
        self.steps.first().copied()
    }

    pub fn last(&self) -> Option<(TypeId, ProtocolId)> {
        self.steps.last().copied()
    }

    /// `T: P -> Self.A: Q -> Self: R`
    pub fn display(&self, ctx: &GenericContext) -> String {
        self.steps
            .iter()
            .map(|&(ty, proto)| {
                format!(
                    "{}: {}",
                    ctx.display_type(ty),
                    ctx.interner.resolve(ctx.decls.protocol(proto).name)
                )
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
