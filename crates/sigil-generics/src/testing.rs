// testing.rs
//
// A miniature standard library for tests: protocols with associated types,
// value types, generic collections and a small class hierarchy.

use sigil_identity::{AssocTypeId, ForeignTypeId, NominalId, ProtocolId, ValueDeclId};
use smallvec::smallvec;

use crate::context::GenericContext;
use crate::decls::{ForeignTypeDecl, KnownProtocolKind, NominalDecl, NominalKind, ProtocolDecl, ValueDecl};
use crate::requirement::Requirement;
use crate::signature::{CanGenericSignature, GenericSignature};
use crate::types::TypeId;

pub struct Stdlib {
    pub ctx: GenericContext,

    pub copyable: ProtocolId,
    pub escapable: ProtocolId,
    pub sendable: ProtocolId,
    pub error: ProtocolId,
    pub equatable: ProtocolId,
    pub hashable: ProtocolId,
    pub iterator_protocol: ProtocolId,
    pub sequence: ProtocolId,
    pub collection: ProtocolId,
    /// Class-bound foreign protocol.
    pub ns_object_protocol: ProtocolId,

    /// `IteratorProtocol.Element`
    pub iterator_element: AssocTypeId,
    /// `Sequence.Element`
    pub element: AssocTypeId,
    /// `Sequence.Iterator`
    pub iterator: AssocTypeId,
    /// `Collection.SubSequence`
    pub sub_sequence: AssocTypeId,

    pub int: TypeId,
    pub string: TypeId,
    pub bool: TypeId,
    pub double: TypeId,

    pub array: NominalId,
    pub array_iterator: NominalId,
    pub array_slice: NominalId,
    /// `class Base<T>: Equatable`
    pub base: NominalId,
    /// `class Derived: Base<Int>`
    pub derived: NominalId,
    /// `class GenericDerived<V>: Base<Array<V>>`
    pub generic_derived: NominalId,
    pub cf_string: ForeignTypeId,

    /// `Base<T>.method<U>(_: T, _: U) -> T`
    pub base_method: ValueDeclId,
    /// `Derived.method<U>(_: Int, _: U) -> Int`
    pub derived_method: ValueDeclId,
    /// `GenericDerived<V>.method<U>(_: Array<V>, _: U) -> Array<V>`
    pub generic_derived_method: ValueDeclId,
}

impl Default for Stdlib {
    fn default() -> Self {
        Self::new()
    }
}

impl Stdlib {
    pub fn new() -> Self {
        Self::with_context(GenericContext::new())
    }

    pub fn with_context(mut ctx: GenericContext) -> Self {
        let protocol = |ctx: &mut GenericContext, name: &str, f: fn(ProtocolDecl) -> ProtocolDecl| {
            let decl = f(ProtocolDecl::new(ctx.intern(name)));
            ctx.decls.add_protocol(decl)
        };
        let copyable = protocol(&mut ctx, "Copyable", |p| p.marker().known(KnownProtocolKind::Copyable));
        let escapable = protocol(&mut ctx, "Escapable", |p| p.marker().known(KnownProtocolKind::Escapable));
        let sendable = protocol(&mut ctx, "Sendable", |p| p.marker().known(KnownProtocolKind::Sendable));
        let error = protocol(&mut ctx, "Error", |p| p.known(KnownProtocolKind::Error));
        let equatable = protocol(&mut ctx, "Equatable", |p| p);
        let hashable = {
            let decl = ProtocolDecl::new(ctx.intern("Hashable")).with_inherited(&[equatable]);
            ctx.decls.add_protocol(decl)
        };
        let iterator_protocol = protocol(&mut ctx, "IteratorProtocol", |p| p);
        let sequence = protocol(&mut ctx, "Sequence", |p| p);
        let collection = {
            let decl = ProtocolDecl::new(ctx.intern("Collection")).with_inherited(&[sequence]);
            ctx.decls.add_protocol(decl)
        };
        let ns_object_protocol = protocol(&mut ctx, "NSObjectProtocol", |p| p.class_bound().foreign());

        let name = ctx.intern("Element");
        let iterator_element = ctx.decls.add_associated_type(iterator_protocol, name);
        let element = ctx.decls.add_associated_type(sequence, name);
        let name = ctx.intern("Iterator");
        let iterator = ctx.decls.add_associated_type(sequence, name);
        let name = ctx.intern("SubSequence");
        let sub_sequence = ctx.decls.add_associated_type(collection, name);

        // Sequence: Iterator: IteratorProtocol, Iterator.Element == Element
        let this = ctx.types.protocol_self();
        let this_iterator = ctx.types.dependent_member(this, iterator);
        let this_iterator_element = ctx.types.dependent_member(this_iterator, iterator_element);
        let this_element = ctx.types.dependent_member(this, element);
        ctx.decls.add_protocol_requirements(
            sequence,
            [
                Requirement::conformance(this_iterator, iterator_protocol),
                Requirement::same_type(this_iterator_element, this_element),
            ],
        );

        // Collection: SubSequence: Collection, SubSequence.Element == Element,
        // SubSequence.SubSequence == SubSequence
        let this_sub = ctx.types.dependent_member(this, sub_sequence);
        let this_sub_element = ctx.types.dependent_member(this_sub, element);
        let this_sub_sub = ctx.types.dependent_member(this_sub, sub_sequence);
        ctx.decls.add_protocol_requirements(
            collection,
            [
                Requirement::conformance(this_sub, collection),
                Requirement::same_type(this_sub_element, this_element),
                Requirement::same_type(this_sub_sub, this_sub),
            ],
        );

        let value_type = |ctx: &mut GenericContext, name: &str, trivial: bool| {
            let mut decl = NominalDecl::new(ctx.intern(name), NominalKind::Struct);
            if trivial {
                decl = decl.trivial();
            }
            let id = ctx.decls.add_nominal(decl);
            (id, ctx.types.nominal(id, smallvec![]))
        };
        let (int_decl, int) = value_type(&mut ctx, "Int", true);
        let (string_decl, string) = value_type(&mut ctx, "String", false);
        let (bool_decl, bool) = value_type(&mut ctx, "Bool", true);
        let (double_decl, double) = value_type(&mut ctx, "Double", true);
        for decl in [int_decl, string_decl, bool_decl] {
            ctx.declare_conformance(decl, hashable, &[]);
            ctx.declare_conformance(decl, sendable, &[]);
        }
        ctx.declare_conformance(double_decl, equatable, &[]);
        ctx.declare_conformance(double_decl, sendable, &[]);

        // Generic containers, all over <τ_0_0>.
        let t = ctx.types.generic_param(0, 0, false);
        let one_param = GenericSignature::get(&mut ctx, &[t], &[], true);
        let container = |ctx: &mut GenericContext, name: &str, kind: NominalKind| {
            let decl = NominalDecl::new(ctx.intern(name), kind).with_signature(one_param);
            ctx.decls.add_nominal(decl)
        };
        let array = container(&mut ctx, "Array", NominalKind::Struct);
        let array_iterator = container(&mut ctx, "ArrayIterator", NominalKind::Struct);
        let array_slice = container(&mut ctx, "ArraySlice", NominalKind::Struct);
        let base = container(&mut ctx, "Base", NominalKind::Class);

        let iterator_of_t = ctx.types.nominal(array_iterator, smallvec![t]);
        let slice_of_t = ctx.types.nominal(array_slice, smallvec![t]);
        ctx.declare_conformance(array_iterator, iterator_protocol, &[(iterator_element, t)]);
        let collection_witnesses = [(element, t), (iterator, iterator_of_t), (sub_sequence, slice_of_t)];
        ctx.declare_conformance(array, collection, &collection_witnesses);
        ctx.declare_conformance(array_slice, collection, &collection_witnesses);
        ctx.declare_conformance(base, equatable, &[]);

        let base_of_int = ctx.types.nominal(base, smallvec![int]);
        let derived = {
            let decl = NominalDecl::new(ctx.intern("Derived"), NominalKind::Class).with_superclass(base_of_int);
            ctx.decls.add_nominal(decl)
        };
        let array_of_t = ctx.types.nominal(array, smallvec![t]);
        let base_of_array = ctx.types.nominal(base, smallvec![array_of_t]);
        let generic_derived = {
            let decl = NominalDecl::new(ctx.intern("GenericDerived"), NominalKind::Class)
                .with_signature(one_param)
                .with_superclass(base_of_array);
            ctx.decls.add_nominal(decl)
        };

        let cf_string = {
            let name = ctx.intern("CFString");
            ctx.decls.add_foreign_type(ForeignTypeDecl { name })
        };
        ctx.declare_conformance(cf_string, hashable, &[]);
        ctx.declare_conformance(cf_string, ns_object_protocol, &[]);

        // Methods: the class's parameters, then the method's own <U> one
        // level deeper.
        let u_inner = ctx.types.generic_param(1, 0, false);
        let u_outer = ctx.types.generic_param(0, 0, false);
        let nested = GenericSignature::get(&mut ctx, &[t, u_inner], &[], true);
        let method_name = ctx.intern("method");
        let method = |ctx: &mut GenericContext,
                          context: NominalId,
                          signature: GenericSignature,
                          first: TypeId,
                          second: TypeId,
                          overridden: Option<ValueDeclId>| {
            let interface_type = ctx.types.function(smallvec![first, second], first);
            ctx.decls.add_value(ValueDecl {
                name: method_name,
                context,
                signature,
                interface_type,
                overridden,
            })
        };
        let base_method = method(&mut ctx, base, nested, t, u_inner, None);
        let derived_method = method(&mut ctx, derived, one_param, int, u_outer, Some(base_method));
        let generic_derived_method = method(
            &mut ctx,
            generic_derived,
            nested,
            array_of_t,
            u_inner,
            Some(base_method),
        );

        Self {
            ctx,
            copyable,
            escapable,
            sendable,
            error,
            equatable,
            hashable,
            iterator_protocol,
            sequence,
            collection,
            ns_object_protocol,
            iterator_element,
            element,
            iterator,
            sub_sequence,
            int,
            string,
            bool,
            double,
            array,
            array_iterator,
            array_slice,
            base,
            derived,
            generic_derived,
            cf_string,
            base_method,
            derived_method,
            generic_derived_method,
        }
    }

    /// `τ_depth_index`
    pub fn param(&mut self, depth: u32, index: u32) -> TypeId {
        self.ctx.types.generic_param(depth, index, false)
    }

    /// `each τ_depth_index`
    pub fn pack_param(&mut self, depth: u32, index: u32) -> TypeId {
        self.ctx.types.generic_param(depth, index, true)
    }

    pub fn member(&mut self, base: TypeId, assoc: AssocTypeId) -> TypeId {
        self.ctx.types.dependent_member(base, assoc)
    }

    pub fn array_of(&mut self, element: TypeId) -> TypeId {
        self.ctx.types.nominal(self.array, smallvec![element])
    }

    pub fn slice_of(&mut self, element: TypeId) -> TypeId {
        self.ctx.types.nominal(self.array_slice, smallvec![element])
    }

    pub fn base_of(&mut self, arg: TypeId) -> TypeId {
        self.ctx.types.nominal(self.base, smallvec![arg])
    }

    pub fn derived_type(&mut self) -> TypeId {
        self.ctx.types.nominal(self.derived, smallvec![])
    }

    pub fn generic_derived_of(&mut self, arg: TypeId) -> TypeId {
        self.ctx.types.nominal(self.generic_derived, smallvec![arg])
    }

    pub fn cf_string_type(&mut self) -> TypeId {
        self.ctx.types.foreign(self.cf_string)
    }

    /// A signature over `params` from written requirements, minimized.
    pub fn signature(&mut self, params: &[TypeId], requirements: &[Requirement]) -> CanGenericSignature {
        let written = GenericSignature::get(&mut self.ctx, params, requirements, false);
        written.canonical_signature(&mut self.ctx)
    }
}
