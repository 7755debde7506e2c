// machine/minimize.rs
//
// Minimal canonical requirements for a set of written requirements.
//
// Candidates are read off the closure: for each class touched by a written
// requirement, the same-type links between its spellings (or from each
// spelling to its concrete type) and its explicit conformance, superclass
// and layout bounds, all spelled with reduced terms. Candidates are sorted canonically and then
// dropped from the end whenever the remaining ones already entail them.

use super::class::ClassId;
use super::order::compare_requirements;
use super::RequirementMachine;
use crate::context::GenericContext;
use crate::errors::RequirementError;
use crate::requirement::{Requirement, WrittenRequirement};
use crate::signature::GenericSignatureErrors;
use crate::types::TypeId;

/// Result of minimizing a requirement list.
#[derive(Debug, Clone, Default)]
pub(crate) struct Minimized {
    pub(crate) requirements: Vec<Requirement>,
    pub(crate) errors: GenericSignatureErrors,
    pub(crate) diagnostics: Vec<RequirementError>,
}

pub(crate) fn minimize(
    ctx: &mut GenericContext,
    params: &[TypeId],
    written: &[WrittenRequirement],
) -> Minimized {
    let mut machine = RequirementMachine::new(ctx, params);
    machine.add_requirements(ctx, written);

    let mut candidates = machine.candidates(ctx);
    sort_requirements(ctx, &mut candidates);

    let errors = machine.errors();
    let diagnostics = machine.take_diagnostics();
    if errors.contains(GenericSignatureErrors::COMPLETION_FAILED) {
        tracing::debug!(
            candidates = candidates.len(),
            "completion failed, keeping unminimized requirements"
        );
        return Minimized {
            requirements: candidates,
            errors,
            diagnostics,
        };
    }

    let mut index = candidates.len();
    while index > 0 {
        index -= 1;
        let candidate = candidates[index];
        let rest: Vec<WrittenRequirement> = candidates
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != index)
            .map(|(_, &req)| WrittenRequirement::new(req))
            .collect();
        let mut probe = RequirementMachine::new(ctx, params);
        probe.add_requirements(ctx, &rest);
        if !probe.failed && probe.is_satisfied(ctx, candidate, false, false) {
            tracing::trace!(
                requirement = %ctx.display_requirement(candidate),
                "dropping redundant requirement"
            );
            candidates.remove(index);
        }
    }

    tracing::debug!(
        requirements = candidates.len(),
        errors = ?errors,
        "minimized requirements"
    );
    Minimized {
        requirements: candidates,
        errors,
        diagnostics,
    }
}

/// Sort into canonical order and drop duplicates.
pub(crate) fn sort_requirements(ctx: &GenericContext, reqs: &mut Vec<Requirement>) {
    reqs.sort_by(|a, b| compare_requirements(ctx, a, b));
    reqs.dedup();
}

impl RequirementMachine {
    fn candidates(&mut self, ctx: &mut GenericContext) -> Vec<Requirement> {
        let mut out = Vec::new();
        for class in self.representatives() {
            if self.class(class).explicit {
                self.class_candidates(ctx, class, &mut out);
            }
        }
        for group in self.shape_classes(ctx) {
            let Some((&root, rest)) = group.split_first() else {
                continue;
            };
            for &param in rest {
                out.push(Requirement::same_shape(root, param));
            }
        }
        out
    }

    fn class_candidates(&mut self, ctx: &mut GenericContext, class: ClassId, out: &mut Vec<Requirement>) {
        let anchor = self.anchor(ctx, class);
        let data = self.class(class).clone();

        let mut spellings: Vec<TypeId> = data
            .terms
            .iter()
            .copied()
            .filter(|&term| self.params.contains(&term))
            .collect();
        for &(parent, name) in &data.parents {
            if let Some(spelling) = self.member_spelling(ctx, parent, name) {
                spellings.push(spelling);
            }
        }
        spellings.sort();
        spellings.dedup();

        match data.concrete {
            Some(bound) => {
                let concrete = self.reduced_type(ctx, bound.ty);
                spellings.push(anchor);
                spellings.sort();
                spellings.dedup();
                for term in spellings {
                    out.push(Requirement::same_type(term, concrete));
                }
            }
            None => {
                for term in spellings {
                    if term != anchor {
                        out.push(Requirement::same_type(anchor, term));
                    }
                }
            }
        }

        for entry in data.conformances.iter().filter(|e| e.explicit) {
            out.push(Requirement::conformance(anchor, entry.protocol));
        }
        if let Some(bound) = data.superclass
            && bound.explicit
        {
            let superclass = self.reduced_type(ctx, bound.ty);
            out.push(Requirement::superclass(anchor, superclass));
        }
        if let Some(bound) = data.layout
            && bound.explicit
        {
            out.push(Requirement::layout(anchor, bound.layout));
        }
    }
}
