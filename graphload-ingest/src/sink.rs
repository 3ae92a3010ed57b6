//! Asynchronous index write sinks
//!
//! A sink owns durability for one index. The pipeline hands it key-sorted
//! batches of [`SinkEntry`] values; each entry carries a latch tag
//! (a [`LatchHold`]) that is released exactly once when the entry is dropped,
//! whether the sink made it durable, rejected the batch, or the batch was
//! cancelled mid-flight. That drop-based release is what keeps document
//! latches from hanging on any failure path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::canonical::{CanonicalTerm, TermId};
use crate::error::{IngestError, Result};
use crate::latch::{Latch, LatchHold};

/// One buffered index write.
pub struct SinkEntry {
    key: Vec<u8>,
    value: Vec<u8>,
    term: Option<Arc<CanonicalTerm>>,
    _hold: LatchHold,
}

impl SinkEntry {
    /// A plain key/value entry tagged with `latch`.
    pub fn new(key: Vec<u8>, value: Vec<u8>, latch: &Arc<Latch>) -> Self {
        Self {
            key,
            value,
            term: None,
            _hold: LatchHold::new(latch),
        }
    }

    /// An entry that wants an identifier assigned to `term` on durability.
    pub fn assigning(
        key: Vec<u8>,
        value: Vec<u8>,
        term: Arc<CanonicalTerm>,
        latch: &Arc<Latch>,
    ) -> Self {
        Self {
            key,
            value,
            term: Some(term),
            _hold: LatchHold::new(latch),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Propagate a sink-assigned identifier to the entry's term, if any.
    pub fn assign_id(&self, id: TermId) {
        if let Some(term) = &self.term {
            term.assign_id(id);
        }
    }
}

/// Asynchronous write sink for one index.
///
/// `submit` consumes the batch; the sink drops each entry once it is durable
/// (or abandoned), which releases the entry's latch tag. `close` flushes and
/// refuses further batches. `abort` discards without flushing.
#[async_trait]
pub trait IndexSink: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, batch: Vec<SinkEntry>) -> Result<()>;

    async fn close(&self) -> Result<()>;

    fn abort(&self);
}

#[derive(Default)]
struct MemorySinkState {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    ids: FxHashMap<Vec<u8>, TermId>,
}

/// In-memory sink for tests and reference use.
///
/// Acknowledges synchronously. When constructed with [`MemorySink::assigning`]
/// it plays an identifier sink: content-keyed duplicate elimination hands the
/// same identifier to every entry bearing the same key, across batches and
/// documents. Failure injection makes `submit` reject whole batches.
pub struct MemorySink {
    name: String,
    assigns_ids: bool,
    next_id: AtomicU64,
    state: Mutex<MemorySinkState>,
    closed: AtomicBool,
    aborted: AtomicBool,
    failing: AtomicBool,
    batches_accepted: AtomicU64,
}

impl MemorySink {
    fn build(name: String, assigns_ids: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            assigns_ids,
            next_id: AtomicU64::new(1),
            state: Mutex::default(),
            closed: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            batches_accepted: AtomicU64::new(0),
        })
    }

    /// A plain key/value sink.
    pub fn keyed(name: impl Into<String>) -> Arc<Self> {
        Self::build(name.into(), false)
    }

    /// An identifier-assigning sink. Identifiers start at 1; 0 is reserved.
    pub fn assigning(name: impl Into<String>) -> Arc<Self> {
        Self::build(name.into(), true)
    }

    /// Make every subsequent `submit` fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.state.lock().unwrap().entries.contains_key(key)
    }

    /// Key-ordered copy of the stored entries
    pub fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Distinct identifiers handed out (assigning sinks only)
    pub fn assigned_count(&self) -> usize {
        self.state.lock().unwrap().ids.len()
    }

    pub fn batches_accepted(&self) -> u64 {
        self.batches_accepted.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, batch: Vec<SinkEntry>) -> Result<()> {
        if self.aborted.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
            return Err(IngestError::sink_write(&self.name, "sink is closed"));
        }
        if self.failing.load(Ordering::SeqCst) {
            // Dropping the batch releases every entry's latch tag.
            return Err(IngestError::sink_write(&self.name, "injected failure"));
        }
        let mut state = self.state.lock().unwrap();
        for entry in &batch {
            if self.assigns_ids {
                let id = match state.ids.get(entry.key()) {
                    Some(id) => *id,
                    None => {
                        let id = TermId::assigned(self.next_id.fetch_add(1, Ordering::SeqCst));
                        state.ids.insert(entry.key().to_vec(), id);
                        id
                    }
                };
                entry.assign_id(id);
            }
            state
                .entries
                .insert(entry.key().to_vec(), entry.value().to_vec());
        }
        drop(state);
        self.batches_accepted.fetch_add(1, Ordering::SeqCst);
        debug!(sink = %self.name, entries = batch.len(), "batch accepted");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        debug!(sink = %self.name, entries = self.len(), "sink closed");
        Ok(())
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphload_ir::Term;

    fn latch() -> Arc<Latch> {
        Arc::new(Latch::new("test"))
    }

    #[tokio::test]
    async fn test_keyed_sink_stores_entries() {
        let sink = MemorySink::keyed("reverse");
        let l = latch();
        let batch = vec![
            SinkEntry::new(b"a".to_vec(), b"1".to_vec(), &l),
            SinkEntry::new(b"b".to_vec(), b"2".to_vec(), &l),
        ];
        assert_eq!(l.value(), 2);
        sink.submit(batch).await.unwrap();
        assert_eq!(l.value(), 0);
        assert_eq!(sink.len(), 2);
        assert!(sink.contains_key(b"a"));
    }

    #[tokio::test]
    async fn test_duplicates_share_one_identifier() {
        let sink = MemorySink::assigning("direct");
        let l = latch();
        let t1 = Arc::new(CanonicalTerm::new(Term::string("dup")));
        let t2 = Arc::new(CanonicalTerm::new(Term::string("dup")));

        sink.submit(vec![SinkEntry::assigning(
            b"k".to_vec(),
            Vec::new(),
            Arc::clone(&t1),
            &l,
        )])
        .await
        .unwrap();
        sink.submit(vec![SinkEntry::assigning(
            b"k".to_vec(),
            Vec::new(),
            Arc::clone(&t2),
            &l,
        )])
        .await
        .unwrap();

        let id1 = t1.id().expect("assigned");
        let id2 = t2.id().expect("assigned");
        assert_eq!(id1, id2);
        assert_eq!(sink.assigned_count(), 1);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_releases_latch_without_assignment() {
        let sink = MemorySink::assigning("direct");
        sink.set_failing(true);
        let l = latch();
        let term = Arc::new(CanonicalTerm::new(Term::string("x")));
        let batch = vec![SinkEntry::assigning(
            b"k".to_vec(),
            Vec::new(),
            Arc::clone(&term),
            &l,
        )];
        assert_eq!(l.value(), 1);
        let err = sink.submit(batch).await.unwrap_err();
        assert!(matches!(err, IngestError::SinkWrite { .. }));
        assert_eq!(l.value(), 0);
        assert!(term.id().is_none());
    }

    #[tokio::test]
    async fn test_closed_sink_rejects() {
        let sink = MemorySink::keyed("spo");
        sink.close().await.unwrap();
        let l = latch();
        let batch = vec![SinkEntry::new(b"k".to_vec(), Vec::new(), &l)];
        assert!(sink.submit(batch).await.is_err());
        assert_eq!(l.value(), 0);
    }
}
