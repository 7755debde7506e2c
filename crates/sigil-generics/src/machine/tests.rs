// machine/tests.rs

use super::{RequirementMachine, minimize};
use crate::config::ContextBuilder;
use crate::context::GenericContext;
use crate::errors::RequirementError;
use crate::requirement::{LayoutConstraint, Requirement, WrittenRequirement};
use crate::signature::GenericSignatureErrors;
use crate::testing::Stdlib;
use crate::types::TypeId;

fn written(reqs: &[Requirement]) -> Vec<WrittenRequirement> {
    reqs.iter().copied().map(WrittenRequirement::new).collect()
}

fn machine(ctx: &mut GenericContext, params: &[TypeId], reqs: &[Requirement]) -> RequirementMachine {
    let mut machine = RequirementMachine::new(ctx, params);
    machine.add_requirements(ctx, &written(reqs));
    machine
}

// ========================================================================
// Closure
// ========================================================================

#[test]
fn protocol_requirements_merge_member_types() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let mut m = machine(&mut lib.ctx, &[t], &[Requirement::conformance(t, lib.sequence)]);

    let iterator = lib.member(t, lib.iterator);
    let iterator_element = lib.member(iterator, lib.iterator_element);
    let element = lib.member(t, lib.element);
    assert_eq!(m.reduced_type(&mut lib.ctx, iterator_element), element);
    assert!(m.are_equal(&mut lib.ctx, iterator_element, element));
    assert!(m.requires_protocol(&mut lib.ctx, iterator, lib.iterator_protocol));
    assert!(m.errors().is_empty());
}

#[test]
fn inherited_protocols_are_required() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let mut m = machine(&mut lib.ctx, &[t], &[Requirement::conformance(t, lib.hashable)]);
    assert!(m.requires_protocol(&mut lib.ctx, t, lib.equatable));
    assert_eq!(m.required_protocols(&mut lib.ctx, t), vec![lib.hashable]);
}

#[test]
fn concrete_same_type_reduces_to_the_concrete_type() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let element = lib.member(t, lib.element);
    let mut m = machine(
        &mut lib.ctx,
        &[t],
        &[
            Requirement::conformance(t, lib.sequence),
            Requirement::same_type(element, lib.int),
        ],
    );
    let iterator = lib.member(t, lib.iterator);
    let iterator_element = lib.member(iterator, lib.iterator_element);
    assert_eq!(m.reduced_type(&mut lib.ctx, iterator_element), lib.int);
    assert_eq!(m.concrete_type(&mut lib.ctx, element), Some(lib.int));
    let array = lib.array_of(iterator_element);
    let expected = lib.array_of(lib.int);
    assert_eq!(m.reduced_type(&mut lib.ctx, array), expected);
}

#[test]
fn self_referential_concrete_type_is_invalid() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let array_t = lib.array_of(t);
    let mut m = machine(&mut lib.ctx, &[t], &[Requirement::same_type(t, array_t)]);

    assert!(m.errors().contains(GenericSignatureErrors::HAS_INVALID_REQUIREMENTS));
    assert!(matches!(
        m.take_diagnostics().as_slice(),
        [RequirementError::RecursiveSameType { .. }]
    ));
    assert_eq!(m.concrete_type(&mut lib.ctx, t), None);
    assert_eq!(m.reduced_type(&mut lib.ctx, t), t);
    let once = m.reduced_type(&mut lib.ctx, array_t);
    assert_eq!(once, array_t);
    assert_eq!(m.reduced_type(&mut lib.ctx, once), once);
}

#[test]
fn concrete_cycle_through_two_parameters_is_invalid() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let u = lib.param(0, 1);
    let array_t = lib.array_of(t);
    let array_u = lib.array_of(u);
    let result = minimize(
        &mut lib.ctx,
        &[t, u],
        &written(&[Requirement::same_type(t, array_u), Requirement::same_type(u, array_t)]),
    );
    assert!(result.errors.contains(GenericSignatureErrors::HAS_INVALID_REQUIREMENTS));
    let recursive = result
        .diagnostics
        .iter()
        .filter(|d| matches!(d, RequirementError::RecursiveSameType { .. }))
        .count();
    assert_eq!(recursive, 1);
}

#[test]
fn concrete_type_of_another_parameter_is_not_recursive() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let u = lib.param(0, 1);
    let array_u = lib.array_of(u);
    let mut m = machine(&mut lib.ctx, &[t, u], &[Requirement::same_type(t, array_u)]);
    assert!(m.errors().is_empty());
    assert_eq!(m.reduced_type(&mut lib.ctx, t), array_u);
}

#[test]
fn recursive_protocols_stay_finite() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let mut m = machine(&mut lib.ctx, &[t], &[Requirement::conformance(t, lib.collection)]);
    let sub = lib.member(t, lib.sub_sequence);
    let sub_sub = lib.member(sub, lib.sub_sequence);
    let sub_sub_sub = lib.member(sub_sub, lib.sub_sequence);
    assert_eq!(m.reduced_type(&mut lib.ctx, sub_sub_sub), sub);
    let sub_element = lib.member(sub, lib.element);
    let element = lib.member(t, lib.element);
    assert_eq!(m.reduced_type(&mut lib.ctx, sub_element), element);
    assert!(m.requires_protocol(&mut lib.ctx, sub_sub, lib.collection));
    assert!(!m.errors().contains(GenericSignatureErrors::COMPLETION_FAILED));
}

#[test]
fn superclass_and_layout_bounds() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let base = lib.base_of(lib.int);
    let mut m = machine(&mut lib.ctx, &[t], &[Requirement::superclass(t, base)]);
    assert_eq!(m.superclass_bound(&mut lib.ctx, t), Some(base));
    assert!(m.requires_class(&mut lib.ctx, t));
    let derived = lib.derived_type();
    assert!(m.is_satisfied(&mut lib.ctx, Requirement::layout(t, LayoutConstraint::Class), false, false));
    assert!(!m.is_satisfied(&mut lib.ctx, Requirement::superclass(t, derived), false, false));
}

#[test]
fn conformance_path_follows_derivations() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let mut m = machine(&mut lib.ctx, &[t], &[Requirement::conformance(t, lib.sequence)]);
    let iterator = lib.member(t, lib.iterator);
    let path = m.conformance_path(&mut lib.ctx, iterator, lib.iterator_protocol);
    let this = lib.ctx.types.protocol_self();
    let self_iterator = lib.member(this, lib.iterator);
    assert_eq!(
        path,
        vec![(t, lib.sequence), (self_iterator, lib.iterator_protocol)]
    );

    let mut m = machine(&mut lib.ctx, &[t], &[Requirement::conformance(t, lib.hashable)]);
    let path = m.conformance_path(&mut lib.ctx, t, lib.equatable);
    assert_eq!(path, vec![(t, lib.hashable), (this, lib.equatable)]);
    assert!(m.conformance_path(&mut lib.ctx, t, lib.sequence).is_empty());
}

// ========================================================================
// Shapes
// ========================================================================

#[test]
fn same_shape_requirements_union_packs() {
    let mut lib = Stdlib::new();
    let t = lib.pack_param(0, 0);
    let u = lib.pack_param(0, 1);
    let v = lib.pack_param(0, 2);
    let mut m = machine(&mut lib.ctx, &[t, u, v], &[Requirement::same_shape(v, t)]);
    assert_eq!(m.reduced_shape(&mut lib.ctx, v), t);
    assert_eq!(m.reduced_shape(&mut lib.ctx, u), u);
    assert_eq!(m.reduced_shape(&mut lib.ctx, lib.int), TypeId::EMPTY_TUPLE);
    assert_eq!(m.shape_classes(&mut lib.ctx), vec![vec![t, v], vec![u]]);
}

#[test]
fn same_shape_on_a_scalar_is_invalid() {
    let mut lib = Stdlib::new();
    let t = lib.pack_param(0, 0);
    let u = lib.param(0, 1);
    let mut m = machine(&mut lib.ctx, &[t, u], &[Requirement::same_shape(t, u)]);
    assert!(m.errors().contains(GenericSignatureErrors::HAS_INVALID_REQUIREMENTS));
    assert!(matches!(
        m.take_diagnostics().as_slice(),
        [RequirementError::NotAPack { .. }]
    ));
}

// ========================================================================
// Minimization
// ========================================================================

#[test]
fn minimize_drops_inherited_conformances() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let result = minimize(
        &mut lib.ctx,
        &[t],
        &written(&[
            Requirement::conformance(t, lib.equatable),
            Requirement::conformance(t, lib.hashable),
        ]),
    );
    assert_eq!(result.requirements, vec![Requirement::conformance(t, lib.hashable)]);
    assert!(result.errors.is_empty());
    assert!(result.diagnostics.is_empty());
}

#[test]
fn minimize_keeps_the_anchor_first() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let u = lib.param(0, 1);
    let t_element = lib.member(t, lib.element);
    let u_element = lib.member(u, lib.element);
    let result = minimize(
        &mut lib.ctx,
        &[t, u],
        &written(&[
            Requirement::same_type(u_element, t_element),
            Requirement::conformance(u, lib.sequence),
            Requirement::conformance(t, lib.sequence),
        ]),
    );
    assert_eq!(
        result.requirements,
        vec![
            Requirement::conformance(t, lib.sequence),
            Requirement::conformance(u, lib.sequence),
            Requirement::same_type(t_element, u_element),
        ]
    );
}

#[test]
fn minimize_flags_concrete_conformances() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let result = minimize(
        &mut lib.ctx,
        &[t],
        &written(&[
            Requirement::conformance(t, lib.hashable),
            Requirement::same_type(t, lib.int),
        ]),
    );
    assert_eq!(result.requirements, vec![Requirement::same_type(t, lib.int)]);
    assert!(result.errors.contains(GenericSignatureErrors::HAS_CONCRETE_CONFORMANCES));
    assert!(!result.errors.contains(GenericSignatureErrors::HAS_INVALID_REQUIREMENTS));
}

#[test]
fn minimize_reports_conflicts() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let result = minimize(
        &mut lib.ctx,
        &[t],
        &written(&[
            Requirement::same_type(t, lib.int),
            Requirement::same_type(t, lib.string),
        ]),
    );
    assert!(result.errors.contains(GenericSignatureErrors::HAS_INVALID_REQUIREMENTS));
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| matches!(d, RequirementError::ConflictingConcreteTypes { .. }))
    );

    let result = minimize(
        &mut lib.ctx,
        &[t],
        &written(&[Requirement::same_type(t, lib.double), Requirement::conformance(t, lib.hashable)]),
    );
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| matches!(d, RequirementError::NonConformingType { .. }))
    );
}

#[test]
fn unknown_member_types_are_invalid() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let element = lib.member(t, lib.element);
    let result = minimize(&mut lib.ctx, &[t], &written(&[Requirement::conformance(element, lib.equatable)]));
    assert!(result.errors.contains(GenericSignatureErrors::HAS_INVALID_REQUIREMENTS));
    assert!(result.requirements.is_empty());
}

#[test]
fn term_budget_sets_completion_failed() {
    let ctx = ContextBuilder::new().with_max_terms(3).with_eager_depth(8).build();
    let mut lib = Stdlib::with_context(ctx);
    let t = lib.param(0, 0);
    let u = lib.param(0, 1);
    let result = minimize(
        &mut lib.ctx,
        &[t, u],
        &written(&[
            Requirement::conformance(t, lib.collection),
            Requirement::conformance(u, lib.collection),
        ]),
    );
    assert!(result.errors.contains(GenericSignatureErrors::COMPLETION_FAILED));
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| matches!(d, RequirementError::CompletionFailed { limit: 3 }))
    );
}
