//! Identity primitives shared by the sigil crates: interned symbols, source
//! spans for diagnostics, and typed declaration ids.

pub mod entities;
mod intern;
mod span;
mod symbol;

pub use entities::{AssocTypeId, ForeignTypeId, NominalId, ProtocolId, ValueDeclId};
pub use intern::Interner;
pub use span::Span;
pub use symbol::Symbol;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_order_by_index() {
        let a = ProtocolId::new(1);
        let b = ProtocolId::new(4);
        assert!(a < b);
        assert_eq!(b.index(), 4);
    }

    #[test]
    fn span_converts_to_source_span() {
        let span = Span::new(10, 18);
        let source: miette::SourceSpan = span.into();
        assert_eq!(source.offset(), 10);
        assert_eq!(source.len(), 8);
        assert_eq!(span.merge(Span::new(4, 12)), Span::new(4, 18));
    }
}
