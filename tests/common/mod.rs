// tests/common/mod.rs
//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use sigil::generics::TypeArena;
use sigil::TypeId;

pub use sigil::generics::testing::Stdlib;

/// A fresh miniature standard library, with logging routed through
/// `SIGIL_LOG` when it is set.
pub fn stdlib() -> Stdlib {
    sigil::init_tracing();
    Stdlib::new()
}

/// Every generic parameter reachable from `ty`, outermost first.
pub fn generic_params_in(types: &mut TypeArena, ty: TypeId) -> Vec<TypeId> {
    let mut out = Vec::new();
    collect_params(types, ty, &mut out);
    out
}

fn collect_params(types: &mut TypeArena, ty: TypeId, out: &mut Vec<TypeId>) {
    if types.generic_param_key(ty).is_some() {
        if !out.contains(&ty) {
            out.push(ty);
        }
        return;
    }
    types.map_children(ty, &mut |types, child| {
        collect_params(types, child, out);
        child
    });
}
