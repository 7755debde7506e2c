// signature/builder.rs
//
// Building a signature from written requirements: the entry point used by
// declaration checking. Unlike `GenericSignature::get` this validates the
// requirements, adds the default `Copyable`/`Escapable` conformances and
// reports what went wrong.

use sigil_identity::Span;

use super::{GenericSignature, GenericSignatureErrors};
use crate::context::GenericContext;
use crate::errors::RequirementError;
use crate::machine;
use crate::requirement::{
    InverseRequirement, InvertibleProtocolKind, Requirement, WrittenRequirement,
};
use crate::types::TypeId;

/// Inputs for a new signature nested inside `base`.
#[derive(Debug, Clone, Default)]
pub struct SignatureRequest {
    /// Outer signature whose parameters and requirements are inherited.
    pub base: GenericSignature,
    /// Parameters introduced by this declaration.
    pub params: Vec<TypeId>,
    pub requirements: Vec<WrittenRequirement>,
    /// `T: ~Copyable` and friends, with their source locations.
    pub inverses: Vec<(InverseRequirement, Option<Span>)>,
    /// When false, inverses are ignored and every new parameter gets its
    /// default conformances.
    pub allow_inverses: bool,
}

impl SignatureRequest {
    pub fn new(base: GenericSignature) -> Self {
        Self {
            base,
            allow_inverses: true,
            ..Self::default()
        }
    }

    pub fn param(mut self, param: TypeId) -> Self {
        self.params.push(param);
        self
    }

    pub fn requirement(mut self, requirement: impl Into<WrittenRequirement>) -> Self {
        self.requirements.push(requirement.into());
        self
    }

    pub fn inverse(mut self, inverse: InverseRequirement) -> Self {
        self.inverses.push((inverse, None));
        self
    }
}

/// The outcome of `build_generic_signature`.
#[derive(Debug, Clone)]
pub struct BuiltSignature {
    pub signature: GenericSignature,
    pub errors: GenericSignatureErrors,
    pub diagnostics: Vec<RequirementError>,
}

impl BuiltSignature {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Build and canonicalize a signature. Never fails: problems are reported in
/// the returned flags and diagnostics, and the signature is still usable.
pub fn build_generic_signature(ctx: &mut GenericContext, request: SignatureRequest) -> BuiltSignature {
    let SignatureRequest {
        base,
        params: added,
        requirements: written,
        inverses,
        allow_inverses,
    } = request;

    let mut params = base.generic_params(ctx).to_vec();
    params.extend(added.iter().copied());
    let canonical_params: Vec<TypeId> = params
        .iter()
        .map(|&p| ctx.types.canonical_type(p))
        .collect();

    let mut errors = GenericSignatureErrors::empty();
    let mut diagnostics = Vec::new();

    let mut requirements: Vec<WrittenRequirement> = base
        .canonical_signature(ctx)
        .requirements(ctx)
        .iter()
        .map(|&req| WrittenRequirement::new(req))
        .collect();
    requirements.extend(written.iter().map(|w| WrittenRequirement {
        requirement: w.requirement.map_types(|ty| ctx.types.canonical_type(ty)),
        span: w.span,
    }));

    let added_canonical: Vec<TypeId> = added
        .iter()
        .map(|&p| ctx.types.canonical_type(p))
        .collect();
    let mut suppressed: Vec<InverseRequirement> = Vec::new();
    if allow_inverses {
        for (inverse, span) in inverses {
            let subject = ctx.types.canonical_type(inverse.subject);
            let protocol_name = invertible_name(inverse);
            if !added_canonical.contains(&subject) {
                errors |= GenericSignatureErrors::HAS_INVALID_REQUIREMENTS;
                diagnostics.push(RequirementError::InvalidInverseSubject {
                    subject: ctx.display_type(inverse.subject).to_string(),
                    protocol: protocol_name.to_string(),
                    span: span.map(Into::into),
                });
                continue;
            }
            let protocol = ctx.decls.known_protocol(inverse.protocol.into());
            let conflicting = protocol.is_some_and(|protocol| {
                written.iter().any(|w| {
                    w.requirement.protocol() == Some(protocol)
                        && ctx.types.canonical_type(w.requirement.first_type()) == subject
                })
            });
            if conflicting {
                errors |= GenericSignatureErrors::HAS_INVALID_REQUIREMENTS;
                diagnostics.push(RequirementError::ConflictingInverse {
                    subject: ctx.display_type(inverse.subject).to_string(),
                    protocol: protocol_name.to_string(),
                    span: span.map(Into::into),
                });
                continue;
            }
            suppressed.push(InverseRequirement::new(subject, inverse.protocol));
        }
    } else if !inverses.is_empty() {
        tracing::debug!(count = inverses.len(), "ignoring inverse requirements");
    }

    for &param in &added_canonical {
        for kind in InvertibleProtocolKind::ALL {
            let Some(protocol) = ctx.decls.known_protocol(kind.into()) else {
                continue;
            };
            if suppressed.contains(&InverseRequirement::new(param, kind)) {
                continue;
            }
            requirements.push(WrittenRequirement::new(Requirement::conformance(param, protocol)));
        }
    }

    let minimized = machine::minimize(ctx, &canonical_params, &requirements);
    errors |= minimized.errors;
    diagnostics.extend(minimized.diagnostics);

    let canonical = GenericSignature::get(ctx, &canonical_params, &minimized.requirements, true);
    let signature = if params == canonical_params {
        canonical
    } else {
        let sugared = GenericSignature::get(ctx, &params, &minimized.requirements, false);
        if let (Some(sugared_id), Some(canonical_id)) = (sugared.id(), canonical.id()) {
            ctx.signatures.get_mut(sugared_id).canonical = Some(canonical_id);
            ctx.signatures.record_errors(sugared_id, errors);
        }
        sugared
    };
    if let Some(id) = canonical.id() {
        ctx.signatures.record_errors(id, errors);
    }

    tracing::debug!(
        params = params.len(),
        requirements = minimized.requirements.len(),
        errors = ?errors,
        diagnostics = diagnostics.len(),
        "built generic signature"
    );
    BuiltSignature {
        signature,
        errors,
        diagnostics,
    }
}

fn invertible_name(inverse: InverseRequirement) -> &'static str {
    match inverse.protocol {
        InvertibleProtocolKind::Copyable => "Copyable",
        InvertibleProtocolKind::Escapable => "Escapable",
    }
}
