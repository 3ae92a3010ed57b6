//! Term placement classification
//!
//! Decides, per distinct term, whether the identifier sinks see it at all:
//! inline values encode themselves into the identifier, oversized values go
//! to the overflow sink, everything else goes to the direct sink.

use graphload_ir::{LiteralValue, Term};

use crate::canonical::TermId;

/// Where a term's identifier comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The value encodes into the identifier itself; no sink write.
    Inline(TermId),
    /// Direct identifier sink
    Direct,
    /// Oversized-value sink
    Overflow,
}

/// Classification must be pure: the term-assignment task and the downstream
/// tasks both classify, and they must agree.
pub trait TermClassifier: Send + Sync {
    fn classify(&self, term: &Term) -> Placement;
}

/// Default classifier: booleans and small non-negative integers inline;
/// lexical forms longer than `overflow_bytes` overflow; the rest is direct.
#[derive(Debug, Clone)]
pub struct ByteThresholdClassifier {
    overflow_bytes: usize,
}

impl ByteThresholdClassifier {
    /// Integers in `0..2^62` fit the inline payload alongside a type tag.
    const MAX_INLINE_INTEGER: i64 = (1 << 62) - 1;
    const TAG_INTEGER: u64 = 0;
    const TAG_BOOLEAN: u64 = 1 << 62;

    pub fn new(overflow_bytes: usize) -> Self {
        Self { overflow_bytes }
    }
}

impl Default for ByteThresholdClassifier {
    fn default() -> Self {
        // Matches a typical blob threshold for lexicon values.
        Self::new(256)
    }
}

impl TermClassifier for ByteThresholdClassifier {
    fn classify(&self, term: &Term) -> Placement {
        if let Term::Literal {
            value, language, ..
        } = term
        {
            if language.is_none() {
                match value {
                    LiteralValue::Boolean(b) => {
                        return Placement::Inline(TermId::inline(
                            Self::TAG_BOOLEAN | u64::from(*b),
                        ));
                    }
                    LiteralValue::Integer(i)
                        if (0..=Self::MAX_INLINE_INTEGER).contains(i) =>
                    {
                        return Placement::Inline(TermId::inline(
                            Self::TAG_INTEGER | *i as u64,
                        ));
                    }
                    _ => {}
                }
            }
        }
        if term.lexical_len() > self.overflow_bytes {
            Placement::Overflow
        } else {
            Placement::Direct
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booleans_and_small_integers_inline() {
        let c = ByteThresholdClassifier::default();
        assert!(matches!(c.classify(&Term::boolean(true)), Placement::Inline(_)));
        assert!(matches!(c.classify(&Term::integer(42)), Placement::Inline(_)));
        // Negative integers are not inlined.
        assert_eq!(c.classify(&Term::integer(-1)), Placement::Direct);
    }

    #[test]
    fn test_inline_ids_are_value_distinct() {
        let c = ByteThresholdClassifier::default();
        let id_of = |t: &Term| match c.classify(t) {
            Placement::Inline(id) => id,
            other => panic!("expected inline, got {other:?}"),
        };
        assert_ne!(id_of(&Term::integer(1)), id_of(&Term::integer(2)));
        assert_ne!(id_of(&Term::boolean(true)), id_of(&Term::boolean(false)));
        assert_ne!(id_of(&Term::boolean(false)), id_of(&Term::integer(0)));
        assert!(id_of(&Term::integer(5)).is_inline());
    }

    #[test]
    fn test_oversized_values_overflow() {
        let c = ByteThresholdClassifier::new(10);
        assert_eq!(c.classify(&Term::string("short")), Placement::Direct);
        assert_eq!(
            c.classify(&Term::string("a value well past ten bytes")),
            Placement::Overflow
        );
        assert_eq!(
            c.classify(&Term::iri("http://example.org/quite/long")),
            Placement::Overflow
        );
    }

    #[test]
    fn test_blank_nodes_never_inline() {
        let c = ByteThresholdClassifier::default();
        assert_eq!(c.classify(&Term::blank("b0")), Placement::Direct);
    }
}
