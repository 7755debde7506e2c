// types/tests.rs

use smallvec::smallvec;

use super::*;
use crate::context::GenericContext;
use crate::requirement::InvertibleProtocolSet;
use crate::testing::Stdlib;

#[test]
fn reserved_ids() {
    let arena = TypeArena::new();
    assert!(matches!(arena.get(TypeId::ERROR), Ty::Error));
    assert!(matches!(arena.get(TypeId::EMPTY_TUPLE), Ty::Tuple(elems) if elems.is_empty()));
    assert!(arena.has(TypeId::ERROR, TypeProperties::HAS_ERROR));
}

#[test]
fn interning_shares_ids() {
    let mut arena = TypeArena::new();
    let t = arena.generic_param(0, 0, false);
    let a = arena.tuple(smallvec![t, t]);
    let b = arena.tuple(smallvec![t, t]);
    assert_eq!(a, b);
    let packed = arena.generic_param(0, 0, true);
    assert_ne!(t, packed);
}

#[test]
fn properties_propagate_to_parents() {
    let mut arena = TypeArena::new();
    let pack = arena.generic_param(0, 0, true);
    let expansion = arena.pack_expansion(pack, pack);
    let tuple = arena.tuple(smallvec![TypeId::EMPTY_TUPLE, expansion]);
    let props = arena.properties(tuple);
    assert!(props.contains(TypeProperties::HAS_TYPE_PARAMETER));
    assert!(props.contains(TypeProperties::HAS_PARAMETER_PACK));
    assert!(props.contains(TypeProperties::HAS_PACK_EXPANSION));
    assert!(!props.contains(TypeProperties::HAS_PACK));
    assert!(!arena.is_fully_concrete(tuple));
}

#[test]
fn canonical_type_strips_sugar_and_names() {
    let mut ctx = GenericContext::new();
    let name = ctx.intern("T");
    let named = ctx.types.named_generic_param(name, 0, 0, false);
    let alias = ctx.intern("Alias");
    let sugared = ctx.types.sugar(alias, named);
    let tuple = ctx.types.tuple(smallvec![sugared, named]);
    assert!(!ctx.types.is_canonical(tuple));

    let canonical = ctx.types.canonical_type(tuple);
    let t = ctx.types.generic_param(0, 0, false);
    assert_eq!(canonical, ctx.types.tuple(smallvec![t, t]));
    assert!(ctx.types.is_canonical(canonical));
    assert_eq!(ctx.types.canonical_type(canonical), canonical);
    assert_eq!(ctx.types.generic_param_key(sugared), Some(GenericParamKey::new(0, 0)));
}

#[test]
fn member_paths() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let iterator = lib.member(t, lib.iterator);
    let element = lib.member(iterator, lib.iterator_element);
    assert!(lib.ctx.types.is_type_parameter(element));
    assert_eq!(lib.ctx.types.root_generic_param(element), Some(t));
    assert_eq!(lib.ctx.types.term_length(element), 2);
    let (root, path) = lib.ctx.types.member_path(element).expect("member path");
    assert_eq!(root, t);
    assert_eq!(path.as_slice(), &[lib.iterator, lib.iterator_element]);
    assert!(!lib.ctx.types.is_type_parameter(lib.int));
}

#[test]
fn substitute_self_replaces_only_the_protocol_self() {
    let mut lib = Stdlib::new();
    let this = lib.param(0, 0);
    let other = lib.param(0, 1);
    let element = lib.member(this, lib.element);
    let tuple = lib.ctx.types.tuple(smallvec![element, other]);
    let array = lib.array_of(lib.int);
    let replaced = lib.ctx.types.substitute_self(tuple, array);
    let expected_element = lib.member(array, lib.element);
    assert_eq!(replaced, lib.ctx.types.tuple(smallvec![expected_element, other]));
}

#[test]
fn transform_type_replaces_maximal_subterms() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let element = lib.member(t, lib.element);
    let array = lib.array_of(element);
    let mut visited = Vec::new();
    let result = transform_type(&mut lib.ctx, array, &mut |ctx, node| {
        if ctx.types.is_type_parameter(node) {
            visited.push(node);
            return Some(TypeId::EMPTY_TUPLE);
        }
        None
    });
    assert_eq!(visited, vec![element]);
    let expected = lib.array_of(TypeId::EMPTY_TUPLE);
    assert_eq!(result, expected);
}

#[test]
fn display_uses_names_and_positions() {
    let mut lib = Stdlib::new();
    let t = lib.param(0, 0);
    let u = lib.pack_param(1, 2);
    let element = lib.member(t, lib.element);
    let expansion = lib.ctx.types.pack_expansion(u, u);
    let function = lib.ctx.types.function(smallvec![element, expansion], lib.int);
    assert_eq!(
        lib.ctx.display_type(function).to_string(),
        "(τ_0_0.Element, repeat τ_1_2) -> Int"
    );

    let equatable = lib.ctx.types.protocol(lib.equatable);
    let composition = lib
        .ctx
        .types
        .composition(smallvec![equatable], true, InvertibleProtocolSet::COPYABLE);
    let existential = lib.ctx.types.existential(composition);
    assert_eq!(
        lib.ctx.display_type(existential).to_string(),
        "any Equatable & AnyObject & ~Copyable"
    );
    let element = lib.ctx.types.pack_element(u, 1);
    assert_eq!(lib.ctx.display_type(element).to_string(), "each^ τ_1_2");
}
