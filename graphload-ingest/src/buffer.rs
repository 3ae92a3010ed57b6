//! Per-document buffer: the statement sink the parser writes into
//!
//! Canonicalizes every term through the document's interner and accumulates
//! canonical statements. After the parse this buffer is what flows through
//! the write stages; its interner's term list drives identifier assignment
//! and its accumulator drives the statement indices.

use graphload_ir::{Statement, StatementSink};
use std::sync::Arc;

use crate::accumulator::StatementAccumulator;
use crate::canonical::{BlankNodeScope, CanonicalStatement, CanonicalTerm, TermInterner};
use crate::resource::Resource;

pub struct DocumentBuffer {
    resource: Resource,
    interner: TermInterner,
    statements: StatementAccumulator,
}

impl DocumentBuffer {
    pub fn new(resource: Resource, chunk_size: usize) -> Self {
        Self {
            resource,
            interner: TermInterner::new(),
            statements: StatementAccumulator::new(chunk_size),
        }
    }

    /// Share a blank-node scope with other documents of the same logical
    /// load. Must be called before parsing begins.
    pub fn with_blank_scope(mut self, scope: BlankNodeScope) -> Self {
        self.interner.set_blank_scope(scope);
        self
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Statements parsed (duplicates included)
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// Distinct terms in first-seen order
    pub fn terms(&self) -> &[Arc<CanonicalTerm>] {
        self.interner.terms()
    }

    /// Drain the buffered statements (single pass).
    pub fn drain_statements(&mut self) -> Vec<Vec<CanonicalStatement>> {
        self.statements.drain_chunks()
    }

    /// Discard everything buffered; the terminal cleanup step.
    pub fn reset(&mut self) {
        self.statements.reset();
    }
}

impl StatementSink for DocumentBuffer {
    fn handle_statement(&mut self, statement: Statement) -> graphload_ir::Result<()> {
        let canonical = CanonicalStatement {
            subject: self.interner.canonical(&statement.subject),
            predicate: self.interner.canonical(&statement.predicate),
            object: self.interner.canonical(&statement.object),
            graph: statement
                .graph
                .as_ref()
                .map(|g| self.interner.canonical(g)),
            provenance: statement.provenance,
        };
        self.statements.add(canonical);
        Ok(())
    }
}
