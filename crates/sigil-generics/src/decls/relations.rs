// decls/relations.rs
//
// Declaration queries that need the type arena: declared types, class
// hierarchies and layout satisfaction for concrete types.

use sigil_identity::NominalId;

use crate::conformance::nominal_args;
use crate::context::GenericContext;
use crate::existential::ExistentialLayout;
use crate::requirement::LayoutConstraint;
use crate::signature::CanGenericSignature;
use crate::subst::{SubstOptions, SubstitutionMap};
use crate::types::{Ty, TypeId};

impl GenericContext {
    /// `D<T...>` applied to its own generic parameters.
    pub fn declared_interface_type(&mut self, decl: NominalId) -> TypeId {
        let signature = self.decls.nominal(decl).signature;
        let args = signature.generic_params(self).iter().copied().collect();
        self.types.nominal(decl, args)
    }

    /// The map from `decl`'s generic parameters to the arguments `ty`
    /// supplies for them, looking through `ty`'s superclasses when `decl`
    /// is one of its ancestors.
    pub fn context_substitution_map(&mut self, ty: TypeId, decl: NominalId) -> SubstitutionMap {
        let signature = self.decls.nominal(decl).signature;
        if signature.is_null() {
            return SubstitutionMap::EMPTY;
        }
        let Some(base) = self.superclass_for_decl(ty, decl) else {
            tracing::debug!(
                ty = %self.display_type(ty),
                decl = %self.interner.resolve(self.decls.nominal(decl).name),
                "no context substitutions"
            );
            return SubstitutionMap::EMPTY;
        };
        let Some((_, args)) = nominal_args(self, base) else {
            return SubstitutionMap::EMPTY;
        };
        SubstitutionMap::get_with_lookup(self, signature, &args, |ctx, _, subst, protocol| {
            ctx.lookup_conformance(subst, protocol)
        })
    }

    /// Direct superclass of a class type with its arguments substituted,
    /// or the superclass bound of an archetype.
    pub fn superclass_of(&mut self, ty: TypeId) -> Option<TypeId> {
        let ty = self.types.look_through_sugar(ty);
        match *self.types.get(ty) {
            Ty::Nominal { decl, .. } => {
                let nominal = self.decls.nominal(decl);
                let superclass = nominal.superclass?;
                if nominal.signature.is_null() {
                    return Some(superclass);
                }
                let map = self.context_substitution_map(ty, decl);
                Some(self.subst_type(superclass, map, SubstOptions::empty()))
            }
            Ty::Archetype {
                signature,
                interface,
                ..
            } => {
                let signature = CanGenericSignature::from_id(signature);
                let bound = signature.superclass_bound(self, interface)?;
                Some(signature.map_type_into_context(self, bound))
            }
            _ => None,
        }
    }

    /// `ty` or its closest ancestor declared by `decl`.
    pub fn superclass_for_decl(&mut self, ty: TypeId, decl: NominalId) -> Option<TypeId> {
        let mut current = self.types.look_through_sugar(ty);
        // Each step strictly climbs the hierarchy.
        loop {
            if let Ty::Nominal { decl: d, .. } = *self.types.get(current)
                && d == decl
            {
                return Some(current);
            }
            let superclass = self.superclass_of(current)?;
            current = self.types.look_through_sugar(superclass);
        }
    }

    /// Whether `sub` is `sup` or inherits from it.
    pub fn is_subclass_of(&mut self, sub: TypeId, sup: TypeId) -> bool {
        let sub = self.types.canonical_type(sub);
        let sup = self.types.canonical_type(sup);
        if sub == sup {
            return true;
        }
        let Ty::Nominal { decl, .. } = *self.types.get(sup) else {
            return false;
        };
        self.superclass_for_decl(sub, decl)
            .is_some_and(|ancestor| self.types.canonical_type(ancestor) == sup)
    }

    /// Class types: class nominals, foreign classes, archetypes whose
    /// signature requires a class, and class-bound existentials.
    pub fn is_class_type(&mut self, ty: TypeId) -> bool {
        let ty = self.types.look_through_sugar(ty);
        match *self.types.get(ty) {
            Ty::Nominal { decl, .. } => self.decls.nominal(decl).is_class(),
            Ty::Foreign(_) => true,
            Ty::Archetype {
                signature,
                interface,
                ..
            } => CanGenericSignature::from_id(signature).requires_class(self, interface),
            Ty::Existential(_) => ExistentialLayout::new(self, ty).requires_class(),
            _ => false,
        }
    }

    /// Whether the concrete type `ty` satisfies `layout`.
    pub fn satisfies_layout(&mut self, ty: TypeId, layout: LayoutConstraint) -> bool {
        let ty = self.types.look_through_sugar(ty);
        if let Some((signature, interface, _)) = self.types.archetype_parts(ty) {
            let signature = CanGenericSignature::from_id(signature);
            if layout.is_class() {
                return signature.requires_class(self, interface);
            }
            return signature
                .layout_constraint(self, interface)
                .is_some_and(|known| known.implies(layout));
        }
        match layout {
            LayoutConstraint::Class => self.is_class_type(ty),
            LayoutConstraint::NativeClass => {
                !matches!(self.types.get(ty), Ty::Foreign(_)) && self.is_class_type(ty)
            }
            LayoutConstraint::Trivial
            | LayoutConstraint::TrivialOfExactSize(_)
            | LayoutConstraint::TrivialOfAtMostSize(_) => self.is_trivial_type(ty),
        }
    }

    /// Sizes are not modeled, so every sized trivial layout reduces to
    /// plain triviality.
    fn is_trivial_type(&self, ty: TypeId) -> bool {
        let ty = self.types.look_through_sugar(ty);
        match self.types.get(ty) {
            Ty::Nominal { decl, args } => {
                let nominal = self.decls.nominal(*decl);
                !nominal.is_class()
                    && nominal.is_trivial
                    && args.iter().all(|&arg| self.is_trivial_type(arg))
            }
            Ty::Tuple(elems) => elems.iter().all(|&elem| self.is_trivial_type(elem)),
            Ty::Metatype(_) => true,
            _ => false,
        }
    }
}
