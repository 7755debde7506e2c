// machine/mod.rs
//
// The requirement machine: closure of a generic signature's requirements
// into equivalence classes of type-parameter terms.
//
// Classes are merged with union-find. Protocol requirement signatures are
// applied lazily: a conformance is recorded immediately, but the protocol's
// own requirements are only instantiated for classes within the eager depth,
// or on demand when a query or a stalled requirement needs them. This keeps
// recursive protocols (`associatedtype Sub: P where Sub.Sub == Sub`) finite.

mod class;
mod facts;
mod minimize;
mod order;
mod query;
mod resolve;

#[cfg(test)]
mod tests;

pub(crate) use class::ClassId;
pub(crate) use minimize::minimize;

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use sigil_identity::{ProtocolId, Span};

use crate::config::MachineLimits;
use crate::context::GenericContext;
use crate::errors::RequirementError;
use crate::requirement::{Requirement, WrittenRequirement};
use crate::signature::{CanGenericSignature, GenericSignatureErrors};
use crate::types::TypeId;
use class::EquivClass;

/// Where a requirement fact came from.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Origin {
    Explicit(Option<Span>),
    /// Instantiated from `protocol`'s requirement signature with
    /// `parent` as Self; `self_subject` is the uninstantiated subject.
    Protocol {
        parent: TypeId,
        protocol: ProtocolId,
        self_subject: TypeId,
    },
    /// Inferred by the machine itself (witness bindings, structural
    /// unification of concrete types).
    Derived,
}

impl Origin {
    pub(crate) fn is_explicit(self) -> bool {
        matches!(self, Origin::Explicit(_))
    }

    pub(crate) fn span(self) -> Option<Span> {
        match self {
            Origin::Explicit(span) => span,
            Origin::Protocol { .. } | Origin::Derived => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Fact {
    Requirement { req: Requirement, origin: Origin },
    Merge(ClassId, ClassId),
    Expand { class: ClassId, protocol: ProtocolId },
}

pub(crate) struct RequirementMachine {
    /// Canonical generic parameters, in signature order.
    params: Vec<TypeId>,
    classes: Vec<EquivClass>,
    parent: Vec<u32>,
    term_classes: FxHashMap<TypeId, ClassId>,
    /// Union-find over root pack parameters.
    shape_parent: FxHashMap<TypeId, TypeId>,
    worklist: VecDeque<Fact>,
    stalled: Vec<Fact>,
    errors: GenericSignatureErrors,
    diagnostics: Vec<RequirementError>,
    limits: MachineLimits,
    next_seq: u32,
    /// Bumped whenever the closure learns something.
    progress: u64,
    /// Cached reduced term per class index; `None` when stale.
    anchors: Option<Vec<Option<TypeId>>>,
    failed: bool,
}

impl RequirementMachine {
    pub(crate) fn new(ctx: &mut GenericContext, params: &[TypeId]) -> Self {
        let mut machine = Self {
            params: Vec::with_capacity(params.len()),
            classes: Vec::new(),
            parent: Vec::new(),
            term_classes: FxHashMap::default(),
            shape_parent: FxHashMap::default(),
            worklist: VecDeque::new(),
            stalled: Vec::new(),
            errors: GenericSignatureErrors::empty(),
            diagnostics: Vec::new(),
            limits: ctx.config().machine,
            next_seq: 0,
            progress: 0,
            anchors: None,
            failed: false,
        };
        for &param in params {
            let param = ctx.types.canonical_type(param);
            let is_pack = ctx.types.is_parameter_pack(param);
            machine.params.push(param);
            machine.new_class(param, 0, is_pack);
            if is_pack {
                machine.shape_parent.insert(param, param);
            }
        }
        machine
    }

    /// Machine answering queries for a canonical signature.
    pub(crate) fn for_signature(ctx: &mut GenericContext, sig: CanGenericSignature) -> Self {
        let params = sig.generic_params(ctx).to_vec();
        let requirements: Vec<WrittenRequirement> = sig
            .requirements(ctx)
            .iter()
            .map(|&req| WrittenRequirement::new(req))
            .collect();
        tracing::debug!(
            params = params.len(),
            requirements = requirements.len(),
            "building requirement machine"
        );
        let mut machine = Self::new(ctx, &params);
        machine.add_requirements(ctx, &requirements);
        machine
    }

    pub(crate) fn add_requirements(&mut self, ctx: &mut GenericContext, reqs: &[WrittenRequirement]) {
        for written in reqs {
            self.worklist.push_back(Fact::Requirement {
                req: written.requirement,
                origin: Origin::Explicit(written.span),
            });
        }
        self.drain(ctx);
    }

    pub(crate) fn errors(&self) -> GenericSignatureErrors {
        self.errors
    }

    pub(crate) fn take_diagnostics(&mut self) -> Vec<RequirementError> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Process facts until the closure is stable. Stalled requirements are
    /// retried as long as the previous round learned something; whatever is
    /// still stalled after a fruitless round is reported invalid.
    pub(crate) fn drain(&mut self, ctx: &mut GenericContext) -> bool {
        let start = self.progress;
        let mut last_retry = u64::MAX;
        loop {
            while let Some(fact) = self.worklist.pop_front() {
                if self.failed {
                    self.worklist.clear();
                    self.stalled.clear();
                    break;
                }
                self.process(ctx, fact);
            }
            if self.stalled.is_empty() {
                break;
            }
            if self.progress == last_retry {
                let stuck = std::mem::take(&mut self.stalled);
                for fact in stuck {
                    if let Fact::Requirement { req, origin } = fact {
                        self.report_unresolvable(ctx, req, origin);
                    }
                }
                break;
            }
            last_retry = self.progress;
            let retry = std::mem::take(&mut self.stalled);
            self.worklist.extend(retry);
        }
        if self.progress == start {
            return false;
        }
        self.break_concrete_cycles(ctx);
        true
    }

    fn process(&mut self, ctx: &mut GenericContext, fact: Fact) {
        match fact {
            Fact::Requirement { req, origin } => self.process_requirement(ctx, req, origin),
            Fact::Merge(a, b) => self.merge(ctx, a, b),
            Fact::Expand { class, protocol } => self.expand(ctx, class, protocol),
        }
    }

    /// Stop the closure after exceeding the term budget.
    pub(crate) fn fail_completion(&mut self) {
        if self.failed {
            return;
        }
        tracing::warn!(
            limit = self.limits.max_terms,
            "requirement machine exceeded its term budget"
        );
        self.failed = true;
        self.errors |= GenericSignatureErrors::COMPLETION_FAILED;
        self.diagnostics.push(RequirementError::CompletionFailed {
            limit: self.limits.max_terms,
        });
    }

    pub(crate) fn mark_invalid(&mut self, diagnostic: Option<RequirementError>) {
        self.errors |= GenericSignatureErrors::HAS_INVALID_REQUIREMENTS;
        if let Some(diagnostic) = diagnostic {
            tracing::debug!(%diagnostic, "invalid requirement");
            self.diagnostics.push(diagnostic);
        }
    }
}
