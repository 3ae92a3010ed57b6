//! Parsed statements: triples and quads with a provenance tag

use crate::Term;
use serde::{Deserialize, Serialize};

/// How a statement entered the store.
///
/// Bulk loading only ever produces `Explicit` statements; the other variants
/// exist so downstream consumers can distinguish materialized entailments and
/// inference axioms when they merge loads with reasoner output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    /// Asserted by a source document
    Explicit,
    /// Derived by inference
    Inferred,
    /// Part of an axiomatic vocabulary
    Axiom,
}

impl Provenance {
    /// Single-byte encoding used in statement index values
    pub fn code(self) -> u8 {
        match self {
            Provenance::Explicit => 0,
            Provenance::Inferred => 1,
            Provenance::Axiom => 2,
        }
    }
}

/// A parsed statement: subject / predicate / object, plus an optional named
/// graph and a provenance tag.
///
/// `graph: None` means the default graph. Parsers producing triples leave it
/// `None`; quad formats may fill it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub graph: Option<Term>,
    pub provenance: Provenance,
}

impl Statement {
    /// An explicitly asserted statement
    pub fn explicit(subject: Term, predicate: Term, object: Term, graph: Option<Term>) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph,
            provenance: Provenance::Explicit,
        }
    }

    pub fn is_quad(&self) -> bool {
        self.graph.is_some()
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(g) = &self.graph {
            write!(f, " {}", g)?;
        }
        write!(f, " .")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_triple() {
        let stmt = Statement::explicit(
            Term::iri("http://e.org/s"),
            Term::iri("http://e.org/p"),
            Term::string("o"),
            None,
        );
        assert!(!stmt.is_quad());
        assert_eq!(stmt.provenance, Provenance::Explicit);
        assert_eq!(
            format!("{}", stmt),
            "<http://e.org/s> <http://e.org/p> \"o\" ."
        );
    }

    #[test]
    fn test_quad_display() {
        let stmt = Statement::explicit(
            Term::iri("http://e.org/s"),
            Term::iri("http://e.org/p"),
            Term::iri("http://e.org/o"),
            Some(Term::iri("http://e.org/g")),
        );
        assert!(stmt.is_quad());
        assert!(format!("{}", stmt).ends_with("<http://e.org/g> ."));
    }

    #[test]
    fn test_provenance_codes_are_distinct() {
        assert_ne!(Provenance::Explicit.code(), Provenance::Inferred.code());
        assert_ne!(Provenance::Inferred.code(), Provenance::Axiom.code());
    }
}
