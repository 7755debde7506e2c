// tests/properties.rs
//! Seeded randomized checks of the canonicalization laws over signatures
//! drawn from a fixed pool of compatible requirements.

mod common;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use smallvec::smallvec;

use common::{Stdlib, stdlib};
use sigil::generics::LayoutConstraint;
use sigil::{GenericSignature, Requirement, TypeId};

const ROUNDS: usize = 64;

/// `<T, U>` where `T: Sequence` always holds and every other requirement is
/// optional. No combination of them conflicts.
struct Pool {
    params: [TypeId; 2],
    leaves: Vec<TypeId>,
    base: Requirement,
    optional: Vec<Requirement>,
    queries: Vec<Requirement>,
}

impl Pool {
    fn new(lib: &mut Stdlib) -> Self {
        let t = lib.param(0, 0);
        let u = lib.param(0, 1);
        let element = lib.member(t, lib.element);
        let iterator = lib.member(t, lib.iterator);
        let iterator_element = lib.member(iterator, lib.iterator_element);
        let optional = vec![
            Requirement::conformance(t, lib.hashable),
            Requirement::conformance(u, lib.equatable),
            Requirement::conformance(u, lib.hashable),
            Requirement::same_type(u, element),
            Requirement::conformance(element, lib.hashable),
            Requirement::layout(u, LayoutConstraint::Class),
        ];
        let mut queries = optional.clone();
        queries.extend([
            Requirement::conformance(t, lib.equatable),
            Requirement::conformance(element, lib.equatable),
            Requirement::conformance(iterator, lib.iterator_protocol),
            Requirement::conformance(iterator_element, lib.hashable),
            Requirement::same_type(iterator_element, u),
            Requirement::layout(element, LayoutConstraint::Class),
        ]);
        Pool {
            params: [t, u],
            leaves: vec![lib.int, lib.string, t, u, element, iterator, iterator_element],
            base: Requirement::conformance(t, lib.sequence),
            optional,
            queries,
        }
    }

    fn requirements(&self, rng: &mut StdRng) -> Vec<Requirement> {
        let mut reqs = vec![self.base];
        reqs.extend(self.optional.iter().copied().filter(|_| rng.gen_bool(0.5)));
        reqs.shuffle(rng);
        reqs
    }

    fn signature(&self, lib: &mut Stdlib, reqs: &[Requirement]) -> GenericSignature {
        GenericSignature::get(&mut lib.ctx, &self.params, reqs, false)
    }

    fn random_type(&self, lib: &mut Stdlib, rng: &mut StdRng, depth: u32) -> TypeId {
        if depth == 0 || rng.gen_bool(0.4) {
            return self.leaves[rng.gen_range(0..self.leaves.len())];
        }
        match rng.gen_range(0..3) {
            0 => {
                let element = self.random_type(lib, rng, depth - 1);
                lib.array_of(element)
            }
            1 => {
                let a = self.random_type(lib, rng, depth - 1);
                let b = self.random_type(lib, rng, depth - 1);
                lib.ctx.types.tuple(smallvec![a, b])
            }
            _ => {
                let param = self.random_type(lib, rng, depth - 1);
                let result = self.random_type(lib, rng, depth - 1);
                lib.ctx.types.function(smallvec![param], result)
            }
        }
    }
}

#[test]
fn canonical_signature_is_idempotent_and_order_independent() {
    let mut lib = stdlib();
    let pool = Pool::new(&mut lib);
    let mut rng = StdRng::seed_from_u64(0x5161_1001);
    for _ in 0..ROUNDS {
        let mut reqs = pool.requirements(&mut rng);
        let canonical = pool.signature(&mut lib, &reqs).canonical_signature(&mut lib.ctx);
        assert_eq!(canonical.as_signature().canonical_signature(&mut lib.ctx), canonical);
        assert!(canonical.as_signature().errors(&mut lib.ctx).is_empty());

        reqs.shuffle(&mut rng);
        let reordered = pool.signature(&mut lib, &reqs).canonical_signature(&mut lib.ctx);
        assert_eq!(
            reordered,
            canonical,
            "{} vs {}",
            reordered.as_signature().display(&lib.ctx),
            canonical.as_signature().display(&lib.ctx)
        );
    }
}

#[test]
fn reduced_type_is_a_fixed_point() {
    let mut lib = stdlib();
    let pool = Pool::new(&mut lib);
    let mut rng = StdRng::seed_from_u64(0x5161_1002);
    for _ in 0..ROUNDS {
        let reqs = pool.requirements(&mut rng);
        let sig = pool.signature(&mut lib, &reqs);
        for _ in 0..8 {
            let ty = pool.random_type(&mut lib, &mut rng, 3);
            let once = sig.reduced_type(&mut lib.ctx, ty);
            let twice = sig.reduced_type(&mut lib.ctx, once);
            assert_eq!(
                twice,
                once,
                "{} reduced to {} then {} in {}",
                lib.ctx.display_type(ty),
                lib.ctx.display_type(once),
                lib.ctx.display_type(twice),
                sig.display(&lib.ctx)
            );
        }
    }
}

#[test]
fn requirement_satisfaction_is_monotone() {
    let mut lib = stdlib();
    let pool = Pool::new(&mut lib);
    let mut rng = StdRng::seed_from_u64(0x5161_1003);
    for _ in 0..ROUNDS {
        let smaller_reqs = pool.requirements(&mut rng);
        let mut larger_reqs = smaller_reqs.clone();
        larger_reqs.extend(pool.requirements(&mut rng));
        let smaller = pool.signature(&mut lib, &smaller_reqs);
        let larger = pool.signature(&mut lib, &larger_reqs);

        for &req in &smaller_reqs {
            assert!(smaller.is_requirement_satisfied(&mut lib.ctx, req, false, false));
        }
        for &query in &pool.queries {
            if smaller.is_requirement_satisfied(&mut lib.ctx, query, false, false) {
                assert!(
                    larger.is_requirement_satisfied(&mut lib.ctx, query, false, false),
                    "{} holds in {} but not in {}",
                    lib.ctx.display_requirement(query),
                    smaller.display(&lib.ctx),
                    larger.display(&lib.ctx)
                );
            }
        }
    }
}
