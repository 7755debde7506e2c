//! Type display for diagnostics, dumps and test assertions.

use std::fmt;

use super::ty::Ty;
use super::type_id::TypeId;
use crate::context::GenericContext;
use crate::requirement::{InvertibleProtocolSet, Requirement};

/// Display adapter returned by `GenericContext::display_type`.
pub struct TypeDisplay<'a> {
    ctx: &'a GenericContext,
    ty: TypeId,
}

impl<'a> TypeDisplay<'a> {
    pub(crate) fn new(ctx: &'a GenericContext, ty: TypeId) -> Self {
        Self { ctx, ty }
    }

    fn child(&self, ty: TypeId) -> TypeDisplay<'a> {
        TypeDisplay::new(self.ctx, ty)
    }

    fn write_list(&self, f: &mut fmt::Formatter<'_>, types: &[TypeId]) -> fmt::Result {
        for (i, &ty) in types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", self.child(ty))?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.ctx;
        let name = |sym| ctx.interner.resolve(sym);
        match ctx.types.get(self.ty) {
            Ty::Error => f.write_str("<<error type>>"),
            Ty::GenericParam {
                name: Some(sym), ..
            } => f.write_str(name(*sym)),
            Ty::GenericParam {
                depth, index, name: None, ..
            } => write!(f, "τ_{}_{}", depth, index),
            Ty::DependentMember { base, assoc } => {
                let assoc_name = ctx.decls.assoc_type(*assoc).name;
                write!(f, "{}.{}", self.child(*base), name(assoc_name))
            }
            Ty::Nominal { decl, args } => {
                f.write_str(name(ctx.decls.nominal(*decl).name))?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    self.write_list(f, args)?;
                    f.write_str(">")?;
                }
                Ok(())
            }
            Ty::Tuple(elems) => {
                f.write_str("(")?;
                self.write_list(f, elems)?;
                f.write_str(")")
            }
            Ty::Function { params, result } => {
                f.write_str("(")?;
                self.write_list(f, params)?;
                write!(f, ") -> {}", self.child(*result))
            }
            Ty::Metatype(instance) => write!(f, "{}.Type", self.child(*instance)),
            Ty::Pack(elems) => {
                f.write_str("Pack{")?;
                self.write_list(f, elems)?;
                f.write_str("}")
            }
            Ty::PackExpansion { pattern, .. } => write!(f, "repeat {}", self.child(*pattern)),
            Ty::PackElement { pack, level } => {
                write!(f, "each{} {}", "^".repeat(*level as usize), self.child(*pack))
            }
            Ty::Protocol(proto) => f.write_str(name(ctx.decls.protocol(*proto).name)),
            Ty::ParameterizedProtocol { base, args } => {
                write!(f, "{}<", name(ctx.decls.protocol(*base).name))?;
                self.write_list(f, args)?;
                f.write_str(">")
            }
            Ty::Composition {
                members,
                any_object,
                inverses,
            } => {
                let mut parts: Vec<String> =
                    members.iter().map(|&m| self.child(m).to_string()).collect();
                if *any_object {
                    parts.push("AnyObject".to_string());
                }
                if inverses.contains(InvertibleProtocolSet::COPYABLE) {
                    parts.push("~Copyable".to_string());
                }
                if inverses.contains(InvertibleProtocolSet::ESCAPABLE) {
                    parts.push("~Escapable".to_string());
                }
                if parts.is_empty() {
                    return f.write_str("Any");
                }
                f.write_str(&parts.join(" & "))
            }
            Ty::Existential(constraint) => write!(f, "any {}", self.child(*constraint)),
            Ty::Archetype { interface, .. } => write!(f, "{}", self.child(*interface)),
            Ty::Foreign(decl) => f.write_str(name(ctx.decls.foreign_type(*decl).name)),
            Ty::Sugar { name: sym, .. } => f.write_str(name(*sym)),
        }
    }
}

/// Display adapter returned by `GenericContext::display_requirement`.
pub struct RequirementDisplay<'a> {
    ctx: &'a GenericContext,
    req: Requirement,
}

impl<'a> RequirementDisplay<'a> {
    pub(crate) fn new(ctx: &'a GenericContext, req: Requirement) -> Self {
        Self { ctx, req }
    }
}

impl fmt::Display for RequirementDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.ctx;
        let show = |ty| TypeDisplay::new(ctx, ty);
        match self.req {
            Requirement::Conformance { subject, protocol } => {
                let name = ctx.interner.resolve(ctx.decls.protocol(protocol).name);
                write!(f, "{}: {}", show(subject), name)
            }
            Requirement::SameType { first, second } => {
                write!(f, "{} == {}", show(first), show(second))
            }
            Requirement::Superclass {
                subject,
                superclass,
            } => write!(f, "{}: {}", show(subject), show(superclass)),
            Requirement::Layout { subject, layout } => write!(f, "{}: {}", show(subject), layout),
            Requirement::SameShape { first, second } => {
                write!(f, "{}.shape == {}.shape", show(first), show(second))
            }
        }
    }
}
