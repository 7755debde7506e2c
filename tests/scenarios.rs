// tests/scenarios.rs
//! End-to-end behavior of signatures, substitution maps, pack expansion and
//! existential layouts, driven through the public facade.

mod common;

use smallvec::smallvec;

use common::{generic_params_in, stdlib};
use sigil::generics::{
    ExistentialLayoutKind, InFlightSubstitution, InvertibleProtocolSet, PackConformance,
    SubstitutionMap as Map,
};
use sigil::{ExistentialLayout, GenericSignature, ProtocolConformanceRef, Requirement, SubstOptions};

// ========================================================================
// Concrete scenarios
// ========================================================================

#[test]
fn single_conformance_requirement() {
    let mut lib = stdlib();
    let t = lib.param(0, 0);
    let sig = lib.signature(&[t], &[Requirement::conformance(t, lib.equatable)]);
    assert_eq!(
        sig.as_signature().required_protocols(&mut lib.ctx, t),
        vec![lib.equatable]
    );
    assert!(!sig.as_signature().requires_class(&mut lib.ctx, t));
    assert_eq!(sig.as_signature().display(&lib.ctx), "<τ_0_0 where τ_0_0: Equatable>");
}

#[test]
fn concrete_same_type_requirement() {
    let mut lib = stdlib();
    let t = lib.param(0, 0);
    let sig = lib.signature(&[t], &[Requirement::same_type(t, lib.int)]).as_signature();
    assert!(sig.is_concrete_type(&mut lib.ctx, t));
    assert_eq!(sig.concrete_type(&mut lib.ctx, t), Some(lib.int));

    let identity = sig.identity_substitution_map(&mut lib.ctx);
    assert_eq!(lib.ctx.subst_type(t, identity, SubstOptions::empty()), lib.int);
    let array_t = lib.array_of(t);
    let array_int = lib.array_of(lib.int);
    assert_eq!(lib.ctx.subst_type(array_t, identity, SubstOptions::empty()), array_int);
}

#[test]
fn stated_conformance_is_returned_unchanged() {
    let mut lib = stdlib();
    let t = lib.param(0, 0);
    let sig = lib.signature(&[t], &[Requirement::conformance(t, lib.equatable)]);
    let equatable = lib.ctx.lookup_conformance(lib.string, lib.equatable);
    assert!(equatable.concrete().is_some());
    let map = Map::get(&mut lib.ctx, sig.as_signature(), &[lib.string], &[equatable]);
    assert_eq!(map.lookup_conformance(&mut lib.ctx, t, lib.equatable), equatable);
}

#[test]
fn pack_expansion_substitutes_to_its_components() {
    let mut lib = stdlib();
    let u = lib.pack_param(0, 0);
    let sig = lib.signature(&[u], &[]);
    let replacement = lib.ctx.types.pack(smallvec![lib.bool, lib.double]);
    let mut map = Map::get(&mut lib.ctx, sig.as_signature(), &[replacement], &[]);

    let expansion = lib.ctx.types.pack_expansion(u, u);
    let pack = lib.ctx.types.pack(smallvec![lib.int, expansion]);
    let substituted = lib.ctx.subst_type(pack, map, SubstOptions::empty());
    assert_eq!(
        lib.ctx.types.pack_elements(substituted),
        Some(&[lib.int, lib.bool, lib.double][..])
    );
    assert_eq!(lib.ctx.display_type(substituted).to_string(), "Pack{Int, Bool, Double}");

    let mut ifs = InFlightSubstitution::new(&lib.ctx, &mut map, SubstOptions::empty());
    let mut components = 0;
    ifs.expand_pack_expansion_shape(&mut lib.ctx, u, &mut |_, _, _| components += 1);
    assert_eq!(components, 2);
}

#[test]
fn any_object_and_sendable_is_a_class_existential() {
    let mut lib = stdlib();
    let sendable = lib.ctx.types.protocol(lib.sendable);
    let composition =
        lib.ctx
            .types
            .composition(smallvec![sendable], true, InvertibleProtocolSet::empty());
    let existential = lib.ctx.types.existential(composition);

    let layout = ExistentialLayout::new(&lib.ctx, existential);
    assert!(layout.has_explicit_any_object);
    assert_eq!(layout.kind(&lib.ctx), ExistentialLayoutKind::Class);
    assert!(!layout.is_error_existential(&lib.ctx));
    assert!(!layout.contains_non_marker_protocols(&lib.ctx));
    assert_eq!(
        lib.ctx.display_type(existential).to_string(),
        "any Sendable & AnyObject"
    );
}

// ========================================================================
// Laws
// ========================================================================

#[test]
fn uniquing_returns_equal_handles() {
    let mut lib = stdlib();
    let t = lib.param(0, 0);
    let reqs = [Requirement::conformance(t, lib.hashable)];
    let a = GenericSignature::get(&mut lib.ctx, &[t], &reqs, false);
    let b = GenericSignature::get(&mut lib.ctx, &[t], &reqs, false);
    assert_eq!(a, b);

    let hashable = lib.ctx.lookup_conformance(lib.int, lib.hashable);
    let m1 = Map::get(&mut lib.ctx, a, &[lib.int], &[hashable]);
    let m2 = Map::get(&mut lib.ctx, b, &[lib.int], &[hashable]);
    assert_eq!(m1, m2);

    let pack = lib.ctx.types.pack(smallvec![lib.int, lib.string]);
    let elements = [
        lib.ctx.lookup_conformance(lib.int, lib.hashable),
        lib.ctx.lookup_conformance(lib.string, lib.hashable),
    ];
    let p1 = PackConformance::get(&mut lib.ctx, pack, lib.hashable, &elements);
    let p2 = PackConformance::get(&mut lib.ctx, pack, lib.hashable, &elements);
    assert_eq!(p1, p2);
    assert_eq!(
        lib.ctx.lookup_conformance(pack, lib.hashable),
        ProtocolConformanceRef::Pack(p1)
    );
}

#[test]
fn canonicalization_is_idempotent() {
    let mut lib = stdlib();
    let t = lib.param(0, 0);
    let u = lib.param(0, 1);
    let element = lib.member(t, lib.element);
    let written = GenericSignature::get(
        &mut lib.ctx,
        &[t, u],
        &[
            Requirement::conformance(u, lib.equatable),
            Requirement::same_type(u, element),
            Requirement::conformance(t, lib.collection),
            Requirement::conformance(t, lib.sequence),
            Requirement::conformance(u, lib.hashable),
        ],
        false,
    );
    let canonical = written.canonical_signature(&mut lib.ctx);
    assert_eq!(canonical.as_signature().canonical_signature(&mut lib.ctx), canonical);
    assert!(canonical.as_signature().is_canonical(&lib.ctx));
    assert_eq!(
        canonical.as_signature().display(&lib.ctx),
        "<τ_0_0, τ_0_1 where τ_0_0: Collection, τ_0_1: Hashable, τ_0_1 == τ_0_0.Element>"
    );
}

#[test]
fn reduced_types_are_fixed_points() {
    let mut lib = stdlib();
    let t = lib.param(0, 0);
    let u = lib.param(0, 1);
    let element = lib.member(t, lib.element);
    let sig = lib
        .signature(
            &[t, u],
            &[
                Requirement::conformance(t, lib.sequence),
                Requirement::same_type(u, element),
            ],
        )
        .as_signature();
    let iterator = lib.member(t, lib.iterator);
    let iterator_element = lib.member(iterator, lib.iterator_element);
    let array_u = lib.array_of(u);
    let function = lib.ctx.types.function(smallvec![array_u, iterator_element], u);
    for ty in [u, iterator_element, array_u, function] {
        let once = sig.reduced_type(&mut lib.ctx, ty);
        assert_eq!(sig.reduced_type(&mut lib.ctx, once), once);
        assert!(sig.is_reduced_type(&mut lib.ctx, once));
    }
    assert_eq!(sig.reduced_type(&mut lib.ctx, element), u);
    assert_eq!(sig.reduced_type(&mut lib.ctx, iterator_element), u);
}

#[test]
fn empty_map_is_the_identity_on_concrete_types() {
    let mut lib = stdlib();
    let array = lib.array_of(lib.string);
    let slice = lib.slice_of(array);
    let tuple = lib.ctx.types.tuple(smallvec![lib.int, slice]);
    let function = lib.ctx.types.function(smallvec![tuple], lib.bool);
    for ty in [lib.int, array, slice, tuple, function] {
        assert_eq!(lib.ctx.subst_type(ty, Map::EMPTY, SubstOptions::empty()), ty);
    }
}

#[test]
fn pack_conformance_witnesses_keep_expansion_shape() {
    let mut lib = stdlib();
    let u = lib.pack_param(0, 0);
    let expansion = lib.ctx.types.pack_expansion(u, u);
    let array_int = lib.array_of(lib.int);
    let pack = lib.ctx.types.pack(smallvec![array_int, expansion]);
    let conformance = lib.ctx.lookup_conformance(pack, lib.sequence);
    let Some(pack_conformance) = conformance.pack() else {
        panic!("expected a pack conformance");
    };

    for assoc in [lib.element, lib.iterator] {
        let witness = pack_conformance.type_witness(&mut lib.ctx, assoc);
        let Some(elements) = lib.ctx.types.pack_elements(witness) else {
            panic!("expected a pack of witnesses");
        };
        assert_eq!(elements.len(), 2);
        assert!(!lib.ctx.types.is_pack_expansion(elements[0]));
        assert!(lib.ctx.types.is_pack_expansion(elements[1]));
    }
}

#[test]
fn required_protocols_have_conformance_paths() {
    let mut lib = stdlib();
    let t = lib.param(0, 0);
    let u = lib.param(0, 1);
    let sig = lib
        .signature(
            &[t, u],
            &[
                Requirement::conformance(t, lib.collection),
                Requirement::conformance(u, lib.hashable),
            ],
        )
        .as_signature();
    let element = lib.member(t, lib.element);
    let iterator = lib.member(t, lib.iterator);
    let sub_sequence = lib.member(t, lib.sub_sequence);
    let protocols = [
        lib.equatable,
        lib.hashable,
        lib.sequence,
        lib.collection,
        lib.iterator_protocol,
    ];

    let mut checked = 0;
    for ty in [t, u, element, iterator, sub_sequence] {
        for protocol in protocols {
            if !sig.requires_protocol(&mut lib.ctx, ty, protocol) {
                continue;
            }
            let path = sig.conformance_path(&mut lib.ctx, ty, protocol);
            assert!(!path.is_empty());
            assert_eq!(path.last().map(|(_, last)| last), Some(protocol));
            checked += 1;
        }
    }
    assert!(checked >= 6, "only {checked} conformances were required");
}

#[test]
fn override_substitution_round_trips() {
    let mut lib = stdlib();
    for derived in [lib.derived_method, lib.generic_derived_method] {
        let map = Map::override_substitutions(&mut lib.ctx, lib.base_method, derived);
        let base_type = lib.ctx.decls.value(lib.base_method).interface_type;
        let derived_decl = lib.ctx.decls.value(derived);
        let (derived_sig, derived_type) = (derived_decl.signature, derived_decl.interface_type);

        let substituted = lib.ctx.subst_type(base_type, map, SubstOptions::empty());
        assert_eq!(substituted, derived_type);
        let derived_params = derived_sig.generic_params(&lib.ctx).to_vec();
        for param in generic_params_in(&mut lib.ctx.types, substituted) {
            assert!(derived_params.contains(&param));
        }
    }
}
