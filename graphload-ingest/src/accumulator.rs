//! Chunked statement accumulator
//!
//! One per document. The parse phase appends; the downstream-writes phase
//! drains once and shares the chunks across the per-index tasks. Not
//! restartable: after `drain_chunks` the accumulator is empty and only
//! `reset` (document cleanup) touches it again.

use crate::canonical::CanonicalStatement;

#[derive(Debug)]
pub struct StatementAccumulator {
    chunk_size: usize,
    chunks: Vec<Vec<CanonicalStatement>>,
    len: usize,
}

impl StatementAccumulator {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunks: Vec::new(),
            len: 0,
        }
    }

    pub fn add(&mut self, statement: CanonicalStatement) {
        let needs_chunk = match self.chunks.last() {
            Some(chunk) => chunk.len() >= self.chunk_size,
            None => true,
        };
        if needs_chunk {
            self.chunks.push(Vec::with_capacity(self.chunk_size));
        }
        self.chunks
            .last_mut()
            .expect("chunk allocated above")
            .push(statement);
        self.len += 1;
    }

    /// Total statements added (duplicates included)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Take every chunk, in insertion order. Single-pass: a second call
    /// yields nothing.
    pub fn drain_chunks(&mut self) -> Vec<Vec<CanonicalStatement>> {
        std::mem::take(&mut self.chunks)
    }

    /// Discard all buffered statements.
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }
}
