// errors/mod.rs
//! Requirement diagnostics (E3xxx).
//!
//! Invalid requirements never abort signature construction. The machine
//! records one of these per problem and flags the signature; callers decide
//! whether and how to render them.

#![allow(unused_assignments)] // False positives from thiserror derive

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum RequirementError {
    #[error("cannot find generic parameter '{param}' in this signature")]
    #[diagnostic(code(E3001))]
    UnknownGenericParam {
        param: String,
        #[label("not a parameter of this signature")]
        span: Option<SourceSpan>,
    },

    #[error("'{member}' is not a member type of '{base}'")]
    #[diagnostic(
        code(E3002),
        help("add a conformance requirement to a protocol declaring '{member}'")
    )]
    UnknownMemberType {
        base: String,
        member: String,
        #[label("unknown member type")]
        span: Option<SourceSpan>,
    },

    #[error("'{subject}' cannot be equal to both '{first}' and '{second}'")]
    #[diagnostic(code(E3003))]
    ConflictingConcreteTypes {
        subject: String,
        first: String,
        second: String,
        #[label("conflicting same-type requirement")]
        span: Option<SourceSpan>,
    },

    #[error("'{subject}' cannot be a subclass of both '{first}' and '{second}'")]
    #[diagnostic(code(E3004))]
    ConflictingSuperclasses {
        subject: String,
        first: String,
        second: String,
        #[label("conflicting superclass requirement")]
        span: Option<SourceSpan>,
    },

    #[error("'{subject}' cannot satisfy both '{first}' and '{second}'")]
    #[diagnostic(code(E3005))]
    ConflictingLayouts {
        subject: String,
        first: String,
        second: String,
        #[label("conflicting layout requirement")]
        span: Option<SourceSpan>,
    },

    #[error("type '{ty}' does not conform to protocol '{protocol}'")]
    #[diagnostic(code(E3006))]
    NonConformingType {
        ty: String,
        protocol: String,
        #[label("required here")]
        span: Option<SourceSpan>,
    },

    #[error("type '{ty}' is not a subclass of '{superclass}'")]
    #[diagnostic(code(E3007))]
    NotASubclass {
        ty: String,
        superclass: String,
        #[label("required here")]
        span: Option<SourceSpan>,
    },

    #[error("type '{ty}' does not satisfy layout constraint '{layout}'")]
    #[diagnostic(code(E3008))]
    LayoutNotSatisfied {
        ty: String,
        layout: String,
        #[label("required here")]
        span: Option<SourceSpan>,
    },

    #[error("cannot equate pack '{first}' with scalar '{second}'")]
    #[diagnostic(code(E3009))]
    PackScalarMismatch {
        first: String,
        second: String,
        #[label("pack and scalar mixed here")]
        span: Option<SourceSpan>,
    },

    #[error("'{ty}' is not a parameter pack")]
    #[diagnostic(code(E3010))]
    NotAPack {
        ty: String,
        #[label("same-shape requirements relate parameter packs")]
        span: Option<SourceSpan>,
    },

    #[error("'{subject}' cannot both require and suppress '{protocol}'")]
    #[diagnostic(code(E3011))]
    ConflictingInverse {
        subject: String,
        protocol: String,
        #[label("suppressed here")]
        span: Option<SourceSpan>,
    },

    #[error("cannot suppress '{protocol}' on '{subject}'")]
    #[diagnostic(
        code(E3012),
        help("inverse requirements apply to generic parameters introduced by this signature")
    )]
    InvalidInverseSubject {
        subject: String,
        protocol: String,
        #[label("not a parameter of this signature")]
        span: Option<SourceSpan>,
    },

    #[error("requirements are too complex to check")]
    #[diagnostic(
        code(E3013),
        help("the requirement machine gave up after {limit} terms; raise SIGIL_MAX_TERMS or simplify the requirements")
    )]
    CompletionFailed { limit: usize },

    #[error("'{first}' cannot be equal to '{second}'")]
    #[diagnostic(code(E3014))]
    ConflictingSameType {
        first: String,
        second: String,
        #[label("conflicting same-type requirement")]
        span: Option<SourceSpan>,
    },

    #[error("'{subject}' cannot be equal to '{ty}', which contains it")]
    #[diagnostic(code(E3015))]
    RecursiveSameType {
        subject: String,
        ty: String,
        #[label("recursive same-type requirement")]
        span: Option<SourceSpan>,
    },
}

impl RequirementError {
    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            RequirementError::UnknownGenericParam { span, .. }
            | RequirementError::UnknownMemberType { span, .. }
            | RequirementError::ConflictingConcreteTypes { span, .. }
            | RequirementError::ConflictingSuperclasses { span, .. }
            | RequirementError::ConflictingLayouts { span, .. }
            | RequirementError::NonConformingType { span, .. }
            | RequirementError::NotASubclass { span, .. }
            | RequirementError::LayoutNotSatisfied { span, .. }
            | RequirementError::PackScalarMismatch { span, .. }
            | RequirementError::NotAPack { span, .. }
            | RequirementError::ConflictingInverse { span, .. }
            | RequirementError::InvalidInverseSubject { span, .. }
            | RequirementError::ConflictingSameType { span, .. }
            | RequirementError::RecursiveSameType { span, .. } => *span,
            RequirementError::CompletionFailed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let err = RequirementError::UnknownMemberType {
            base: "T".to_string(),
            member: "Element".to_string(),
            span: Some((4, 9).into()),
        };
        assert_eq!(err.code().map(|c| c.to_string()), Some("E3002".to_string()));
        assert_eq!(err.to_string(), "'Element' is not a member type of 'T'");
        assert_eq!(err.span(), Some(SourceSpan::from((4, 9))));
    }

    #[test]
    fn completion_failure_has_help() {
        let err = RequirementError::CompletionFailed { limit: 100 };
        let help = err.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("100 terms"));
        assert_eq!(err.span(), None);
    }
}
