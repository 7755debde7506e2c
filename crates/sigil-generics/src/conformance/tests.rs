// conformance/tests.rs

use smallvec::smallvec;

use super::*;
use crate::requirement::Requirement;
use crate::subst::{SubstOptions, SubstitutionMap};
use crate::testing::Stdlib;

fn concrete(conformance: ProtocolConformanceRef) -> ConcreteConformance {
    match conformance.concrete() {
        Some(concrete) => concrete,
        None => panic!("expected a concrete conformance, got {conformance:?}"),
    }
}

#[test]
fn declared_conformances_are_normal() {
    let mut lib = Stdlib::new();
    let hashable = concrete(lib.ctx.lookup_conformance(lib.int, lib.hashable));
    assert_eq!(hashable.kind(&lib.ctx), ConcreteConformanceKind::Normal);
    assert_eq!(hashable.conforming_type(&lib.ctx), lib.int);
    assert_eq!(
        ProtocolConformanceRef::Concrete(hashable).display(&lib.ctx).to_string(),
        "normal Int: Hashable"
    );

    // Inherited protocols are declared along with the conformance.
    let equatable = lib.ctx.lookup_conformance(lib.int, lib.equatable);
    assert_eq!(equatable.protocol(&lib.ctx), Some(lib.equatable));
    assert_eq!(
        concrete(equatable).kind(&lib.ctx),
        ConcreteConformanceKind::Normal
    );

    assert!(lib.ctx.lookup_conformance(lib.double, lib.hashable).is_invalid());
}

#[test]
fn redeclaring_returns_the_existing_conformance() {
    let mut lib = Stdlib::new();
    let first = concrete(lib.ctx.lookup_conformance(lib.int, lib.hashable));
    let int_decl = match lib.ctx.types.get(lib.int) {
        crate::types::Ty::Nominal { decl, .. } => *decl,
        other => panic!("unexpected {other:?}"),
    };
    let again = lib.ctx.declare_conformance(int_decl, lib.hashable, &[]);
    assert_eq!(first, again);
}

#[test]
fn generic_conformances_are_specialized() {
    let mut lib = Stdlib::new();
    let array_int = lib.array_of(lib.int);
    let conformance = lib.ctx.lookup_conformance(array_int, lib.collection);
    let specialized = concrete(conformance);
    assert_eq!(specialized.kind(&lib.ctx), ConcreteConformanceKind::Specialized);
    assert_eq!(specialized.conforming_type(&lib.ctx), array_int);
    assert_eq!(
        specialized.generic_conformance(&lib.ctx).kind(&lib.ctx),
        ConcreteConformanceKind::Normal
    );
    assert!(!specialized.substitution_map(&lib.ctx).is_empty());

    assert_eq!(conformance.type_witness(&mut lib.ctx, lib.element), lib.int);
    let iterator = conformance.type_witness(&mut lib.ctx, lib.iterator);
    assert_eq!(lib.ctx.display_type(iterator).to_string(), "ArrayIterator<Int>");
    let sub = conformance.type_witness(&mut lib.ctx, lib.sub_sequence);
    assert_eq!(sub, lib.slice_of(lib.int));

    // Uniqued: looking up again gives the same handle.
    assert_eq!(lib.ctx.lookup_conformance(array_int, lib.collection), conformance);
}

#[test]
fn associated_conformances_follow_witnesses() {
    let mut lib = Stdlib::new();
    let array_int = lib.array_of(lib.int);
    let conformance = lib.ctx.lookup_conformance(array_int, lib.sequence);
    let this = lib.ctx.types.protocol_self();
    let this_iterator = lib.member(this, lib.iterator);

    let iterator = conformance.associated_conformance(&mut lib.ctx, this_iterator, lib.iterator_protocol);
    assert_eq!(
        iterator.display(&lib.ctx).to_string(),
        "specialized ArrayIterator<Int>: IteratorProtocol"
    );
    assert_eq!(iterator.type_witness(&mut lib.ctx, lib.iterator_element), lib.int);

    // `Self: Sequence` from a Collection conformance is the inherited one.
    let collection = lib.ctx.lookup_conformance(array_int, lib.collection);
    let inherited = collection.associated_conformance(&mut lib.ctx, this, lib.sequence);
    assert_eq!(inherited, conformance);
}

#[test]
fn subclasses_inherit_conformances() {
    let mut lib = Stdlib::new();
    let derived = lib.derived_type();
    let conformance = lib.ctx.lookup_conformance(derived, lib.equatable);
    assert!(!conformance.is_invalid());
    let base_int = lib.base_of(lib.int);
    assert_eq!(conformance.conforming_type(&lib.ctx), base_int);
}

#[test]
fn foreign_and_invertible_conformances() {
    let mut lib = Stdlib::new();
    let cf_string = lib.cf_string_type();
    let hashable = lib.ctx.lookup_conformance(cf_string, lib.hashable);
    assert_eq!(concrete(hashable).kind(&lib.ctx), ConcreteConformanceKind::Normal);

    let copyable = lib.ctx.lookup_conformance(cf_string, lib.copyable);
    assert_eq!(concrete(copyable).kind(&lib.ctx), ConcreteConformanceKind::Builtin);
    let copyable = lib.ctx.lookup_conformance(lib.int, lib.copyable);
    assert_eq!(concrete(copyable).kind(&lib.ctx), ConcreteConformanceKind::Builtin);
    assert!(lib.ctx.lookup_conformance(cf_string, lib.sequence).is_invalid());
}

#[test]
fn structural_types_conform_to_marker_protocols() {
    let mut lib = Stdlib::new();
    let tuple = lib.ctx.types.tuple(smallvec![lib.int, lib.string]);
    let sendable = lib.ctx.lookup_conformance(tuple, lib.sendable);
    assert_eq!(concrete(sendable).kind(&lib.ctx), ConcreteConformanceKind::Builtin);
    assert!(lib.ctx.lookup_conformance(tuple, lib.hashable).is_invalid());

    let array_int = lib.array_of(lib.int);
    let with_array = lib.ctx.types.tuple(smallvec![lib.int, array_int]);
    assert!(lib.ctx.lookup_conformance(with_array, lib.sendable).is_invalid());

    let function = lib.ctx.types.function(smallvec![lib.int], lib.string);
    assert!(!lib.ctx.lookup_conformance(function, lib.sendable).is_invalid());
    assert!(lib.ctx.lookup_conformance(function, lib.equatable).is_invalid());
}

#[test]
fn existentials_self_conform_only_to_some_protocols() {
    let mut lib = Stdlib::new();
    let error = lib.ctx.types.protocol(lib.error);
    let any_error = lib.ctx.types.existential(error);
    assert!(!lib.ctx.lookup_conformance(any_error, lib.error).is_invalid());

    let hashable = lib.ctx.types.protocol(lib.hashable);
    let any_hashable = lib.ctx.types.existential(hashable);
    assert!(lib.ctx.lookup_conformance(any_hashable, lib.hashable).is_invalid());
    assert!(!lib.ctx.lookup_conformance(any_hashable, lib.copyable).is_invalid());

    let ns_object = lib.ctx.types.protocol(lib.ns_object_protocol);
    let any_ns_object = lib.ctx.types.existential(ns_object);
    assert!(
        !lib.ctx
            .lookup_conformance(any_ns_object, lib.ns_object_protocol)
            .is_invalid()
    );
}

#[test]
fn pack_conformances_are_element_wise() {
    let mut lib = Stdlib::new();
    let array_int = lib.array_of(lib.int);
    let slice_string = lib.slice_of(lib.string);
    let pack = lib.ctx.types.pack(smallvec![array_int, slice_string]);
    let conformance = lib.ctx.lookup_conformance(pack, lib.sequence);
    let Some(pack_conformance) = conformance.pack() else {
        panic!("expected a pack conformance");
    };
    assert_eq!(pack_conformance.elements(&lib.ctx).len(), 2);
    assert_eq!(pack_conformance.conforming_type(&lib.ctx), pack);

    let elements = conformance.type_witness(&mut lib.ctx, lib.element);
    assert_eq!(elements, lib.ctx.types.pack(smallvec![lib.int, lib.string]));

    let mixed = lib.ctx.types.pack(smallvec![lib.int, lib.double]);
    let hashable = lib.ctx.lookup_conformance(mixed, lib.hashable);
    let elements = hashable.pack().map(|p| p.elements(&lib.ctx).to_vec());
    assert!(matches!(
        elements.as_deref(),
        Some([ProtocolConformanceRef::Concrete(_), ProtocolConformanceRef::Invalid])
    ));
}

#[test]
fn type_parameters_conform_abstractly() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let conformance = lib.ctx.lookup_conformance(t, lib.sequence);
    assert_eq!(conformance, ProtocolConformanceRef::for_abstract(t, lib.sequence));
    assert!(conformance.is_abstract());

    let element = conformance.type_witness(&mut lib.ctx, lib.element);
    assert_eq!(element, lib.member(t, lib.element));

    let this = lib.ctx.types.protocol_self();
    let this_iterator = lib.member(this, lib.iterator);
    let iterator = conformance.associated_conformance(&mut lib.ctx, this_iterator, lib.iterator_protocol);
    let t_iterator = lib.member(t, lib.iterator);
    assert_eq!(
        iterator,
        ProtocolConformanceRef::for_abstract(t_iterator, lib.iterator_protocol)
    );
}

#[test]
fn archetypes_conform_through_their_signature() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let u = lib.param(0, 1);
    let base_int = lib.base_of(lib.int);
    let sig = lib.signature(
        &[t, u],
        &[
            Requirement::conformance(t, lib.sequence),
            Requirement::superclass(u, base_int),
        ],
    );
    let archetype = sig.map_type_into_context(&mut lib.ctx, t);
    let conformance = lib.ctx.lookup_conformance(archetype, lib.sequence);
    assert!(conformance.is_abstract());
    assert!(lib.ctx.lookup_conformance(archetype, lib.hashable).is_invalid());

    // Member types of an archetype are archetypes of the same environment.
    let element = conformance.type_witness(&mut lib.ctx, lib.element);
    let t_element = lib.member(t, lib.element);
    assert_eq!(
        lib.ctx.types.archetype_parts(element).map(|(_, interface, _)| interface),
        Some(t_element)
    );

    // Superclass bounds supply conformances too.
    let class_archetype = sig.map_type_into_context(&mut lib.ctx, u);
    let equatable = lib.ctx.lookup_conformance(class_archetype, lib.equatable);
    assert_eq!(equatable.conforming_type(&lib.ctx), base_int);
}

#[test]
fn substituting_conformances() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let sig = lib.signature(&[t], &[Requirement::conformance(t, lib.hashable)]);
    let int_hashable = lib.ctx.lookup_conformance(lib.int, lib.hashable);
    let map = SubstitutionMap::get(&mut lib.ctx, sig.as_signature(), &[lib.int], &[int_hashable]);

    // Abstract conformances become the map's conformance.
    let abstract_ref = ProtocolConformanceRef::for_abstract(t, lib.hashable);
    let mut source = map;
    let mut ifs = crate::subst::InFlightSubstitution::new(&lib.ctx, &mut source, SubstOptions::empty());
    assert_eq!(abstract_ref.subst(&mut lib.ctx, &mut ifs), int_hashable);

    // Specialized conformances substitute their map.
    let array_t = lib.array_of(t);
    let generic = lib.ctx.lookup_conformance(array_t, lib.sequence);
    let substituted = generic.subst(&mut lib.ctx, &mut ifs);
    let array_int = lib.array_of(lib.int);
    assert_eq!(substituted, lib.ctx.lookup_conformance(array_int, lib.sequence));

    // Builtin conformances are looked up again on the substituted type.
    let tuple = lib.ctx.types.tuple(smallvec![t, lib.string]);
    let builtin = lib.ctx.lookup_conformance(tuple, lib.sendable);
    let substituted = builtin.subst(&mut lib.ctx, &mut ifs);
    let expected = lib.ctx.types.tuple(smallvec![lib.int, lib.string]);
    assert_eq!(substituted.conforming_type(&lib.ctx), expected);
}

#[test]
fn canonical_conformances_strip_sugar() {
    let mut lib = Stdlib::new();
    let alias = lib.ctx.intern("MyInt");
    let sugared = lib.ctx.types.sugar(alias, lib.int);
    let array_sugared = lib.array_of(sugared);
    let conformance = lib.ctx.lookup_conformance(array_sugared, lib.sequence);
    // Lookup canonicalizes its input, so the result is already canonical.
    assert!(conformance.is_canonical(&lib.ctx));

    let t = lib.param(0, 0);
    let named = lib.ctx.types.named_generic_param(alias, 0, 0, false);
    let sugared_abstract = ProtocolConformanceRef::for_abstract(named, lib.sequence);
    assert!(!sugared_abstract.is_canonical(&lib.ctx));
    assert_eq!(
        sugared_abstract.canonical(&mut lib.ctx),
        ProtocolConformanceRef::for_abstract(t, lib.sequence)
    );
}
