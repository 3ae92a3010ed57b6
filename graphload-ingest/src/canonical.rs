//! Per-document term canonicalization
//!
//! Each document interns every distinct term once, so identifier assignment
//! happens once per distinct term and every buffered statement referencing it
//! observes the assignment through the shared [`CanonicalTerm`].
//!
//! Blank nodes canonicalize through a separate [`BlankNodeScope`] because
//! their labels are only meaningful within a scope; callers loading one
//! logical dataset split across files inject one scope into every document's
//! interner so `_:b0` means the same node everywhere.

use graphload_ir::{BlankId, Provenance, Term};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::{IngestError, Result};

/// Identifier assigned to a term by the identifier sinks.
///
/// The top bit marks values inlined by the classifier; sink-assigned
/// identifiers never carry it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u64);

impl TermId {
    const INLINE_BIT: u64 = 1 << 63;

    /// A sink-assigned identifier. Panics on the reserved inline bit.
    pub fn assigned(raw: u64) -> Self {
        assert_eq!(raw & Self::INLINE_BIT, 0, "identifier collides with inline space");
        Self(raw)
    }

    /// Reserved well-known identifiers (e.g. the default-graph sentinel).
    pub(crate) const fn reserved(raw: u64) -> Self {
        Self(raw)
    }

    /// An identifier encoding an inline value directly.
    pub fn inline(payload: u64) -> Self {
        Self(payload | Self::INLINE_BIT)
    }

    pub fn is_inline(self) -> bool {
        self.0 & Self::INLINE_BIT != 0
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Big-endian key encoding
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

/// A term plus its identifier slot, shared by every statement and write batch
/// that references the term within one document.
#[derive(Debug)]
pub struct CanonicalTerm {
    term: Term,
    id: OnceLock<TermId>,
}

impl CanonicalTerm {
    pub fn new(term: Term) -> Self {
        Self {
            term,
            id: OnceLock::new(),
        }
    }

    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn id(&self) -> Option<TermId> {
        self.id.get().copied()
    }

    /// Record the identifier the sink assigned.
    ///
    /// Duplicate-eliminated writes may assign more than once; every
    /// assignment must agree, and a disagreement panics because two sinks
    /// handing out different identifiers for one term means the identifier
    /// space itself is corrupt.
    pub fn assign_id(&self, id: TermId) {
        if self.id.set(id).is_err() {
            let existing = self.id.get().copied();
            if existing != Some(id) {
                panic!(
                    "conflicting identifiers for term {}: {:?} then {:?}",
                    self.term, existing, id
                );
            }
        }
    }

    /// The assigned identifier, or an error naming the term.
    pub fn require_id(&self) -> Result<TermId> {
        self.id().ok_or_else(|| IngestError::IdentifierMissing {
            term: self.term.to_string(),
        })
    }
}

/// Blank-node canonicalization scope, shareable across documents.
#[derive(Clone, Debug, Default)]
pub struct BlankNodeScope {
    map: Arc<Mutex<FxHashMap<BlankId, Arc<CanonicalTerm>>>>,
}

impl BlankNodeScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical term for a blank node; a single winner inserts.
    pub fn canonical(&self, id: &BlankId) -> Arc<CanonicalTerm> {
        let mut map = self.map.lock().unwrap();
        if let Some(existing) = map.get(id) {
            return Arc::clone(existing);
        }
        let term = Arc::new(CanonicalTerm::new(Term::BlankNode(id.clone())));
        map.insert(id.clone(), Arc::clone(&term));
        term
    }

    pub fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-document interner: one [`CanonicalTerm`] per distinct term, iteration
/// in first-seen order so write batches are deterministic.
#[derive(Debug, Default)]
pub struct TermInterner {
    map: FxHashMap<Term, usize>,
    terms: Vec<Arc<CanonicalTerm>>,
    blanks: Option<BlankNodeScope>,
}

impl TermInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a shared blank-node scope. Must happen before the first blank
    /// node is interned; panics once a scope exists (lazily allocated or
    /// previously injected), because silently swapping scopes would split a
    /// node's identity.
    pub fn set_blank_scope(&mut self, scope: BlankNodeScope) {
        if self.blanks.is_some() {
            panic!("blank-node scope already established for this document");
        }
        self.blanks = Some(scope);
    }

    /// Canonical form of `term`, interning on first sight.
    pub fn canonical(&mut self, term: &Term) -> Arc<CanonicalTerm> {
        if let Term::BlankNode(id) = term {
            let scope = self.blanks.get_or_insert_with(BlankNodeScope::new);
            let canonical = scope.canonical(id);
            // List it locally too so this document's write tasks cover it.
            if let std::collections::hash_map::Entry::Vacant(e) = self.map.entry(term.clone()) {
                e.insert(self.terms.len());
                self.terms.push(Arc::clone(&canonical));
            }
            return canonical;
        }
        if let Some(&idx) = self.map.get(term) {
            return Arc::clone(&self.terms[idx]);
        }
        let canonical = Arc::new(CanonicalTerm::new(term.clone()));
        self.map.insert(term.clone(), self.terms.len());
        self.terms.push(Arc::clone(&canonical));
        canonical
    }

    /// Distinct terms in first-seen order
    pub fn terms(&self) -> &[Arc<CanonicalTerm>] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// A statement over canonical terms, ready for buffering.
#[derive(Clone, Debug)]
pub struct CanonicalStatement {
    pub subject: Arc<CanonicalTerm>,
    pub predicate: Arc<CanonicalTerm>,
    pub object: Arc<CanonicalTerm>,
    pub graph: Option<Arc<CanonicalTerm>>,
    pub provenance: Provenance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interner_dedupes() {
        let mut interner = TermInterner::new();
        let a1 = interner.canonical(&Term::iri("http://e.org/a"));
        let a2 = interner.canonical(&Term::iri("http://e.org/a"));
        let b = interner.canonical(&Term::string("b"));
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut interner = TermInterner::new();
        interner.canonical(&Term::iri("http://e.org/z"));
        interner.canonical(&Term::iri("http://e.org/a"));
        interner.canonical(&Term::iri("http://e.org/z"));
        let order: Vec<_> = interner
            .terms()
            .iter()
            .map(|t| t.term().as_iri().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["http://e.org/z", "http://e.org/a"]);
    }

    #[test]
    fn test_blank_scope_shared_across_documents() {
        let scope = BlankNodeScope::new();
        let mut doc1 = TermInterner::new();
        let mut doc2 = TermInterner::new();
        doc1.set_blank_scope(scope.clone());
        doc2.set_blank_scope(scope.clone());

        let b1 = doc1.canonical(&Term::blank("b0"));
        let b2 = doc2.canonical(&Term::blank("b0"));
        assert!(Arc::ptr_eq(&b1, &b2));
        assert_eq!(scope.len(), 1);
        // Both documents still list the node for their own write tasks.
        assert_eq!(doc1.len(), 1);
        assert_eq!(doc2.len(), 1);
    }

    #[test]
    fn test_blank_scope_lazily_allocated() {
        let mut interner = TermInterner::new();
        interner.canonical(&Term::iri("http://e.org/a"));
        assert!(interner.blanks.is_none());
        interner.canonical(&Term::blank("b0"));
        assert!(interner.blanks.is_some());
    }

    #[test]
    #[should_panic(expected = "already established")]
    fn test_injecting_scope_twice_panics() {
        let mut interner = TermInterner::new();
        interner.set_blank_scope(BlankNodeScope::new());
        interner.set_blank_scope(BlankNodeScope::new());
    }

    #[test]
    fn test_assign_id_once() {
        let term = CanonicalTerm::new(Term::iri("http://e.org/a"));
        assert!(term.id().is_none());
        assert!(term.require_id().is_err());
        term.assign_id(TermId::assigned(7));
        assert_eq!(term.id(), Some(TermId::assigned(7)));
        // Repeat assignment of the same identifier is a no-op.
        term.assign_id(TermId::assigned(7));
        assert_eq!(term.require_id().unwrap(), TermId::assigned(7));
    }

    #[test]
    #[should_panic(expected = "conflicting identifiers")]
    fn test_conflicting_assignment_panics() {
        let term = CanonicalTerm::new(Term::iri("http://e.org/a"));
        term.assign_id(TermId::assigned(7));
        term.assign_id(TermId::assigned(8));
    }

    #[test]
    fn test_inline_ids_are_tagged() {
        let inline = TermId::inline(42);
        assert!(inline.is_inline());
        assert!(!TermId::assigned(42).is_inline());
        assert_ne!(inline, TermId::assigned(42));
    }
}
