//! Bulk loader orchestration
//!
//! [`BulkLoader`] owns the pools, the workflow accounting, and the sinks,
//! and drives each document through the pipeline:
//!
//! ```text
//! submit -> parse -> identifier writes -> (identifier latch zero)
//!        -> downstream writes -> (restart-safe latch zero) -> notice
//! ```
//!
//! Stage handoffs always go through a pool; latch zero actions only update
//! counters and enqueue, never write. Failure at any stage retires the
//! document exactly once and releases its statement-gauge contributions,
//! while the stage latch is still allowed to drain so nothing hangs.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::try_join_all;
use tracing::{debug, error, info, warn};

use graphload_ir::DocumentParser;

use crate::buffer::DocumentBuffer;
use crate::canonical::{BlankNodeScope, CanonicalStatement, CanonicalTerm};
use crate::classify::{ByteThresholdClassifier, TermClassifier};
use crate::codec::KeyOrder;
use crate::config::LoaderConfig;
use crate::counters::{FlowControl, LoaderCounters, Stats};
use crate::error::{IngestError, Result};
use crate::latch::{Latch, LatchHold};
use crate::pool::{ParserPool, WorkerPool};
use crate::resource::Resource;
use crate::sink::{IndexSink, MemorySink};
use crate::tasks;
use crate::workflow::{Workflow, WorkflowState};

/// The sinks one loader writes to: identifier assignment (direct and
/// overflow), the reverse index, optional full text, and one statement index
/// per key ordering.
pub struct SinkSet {
    pub direct: Arc<dyn IndexSink>,
    pub overflow: Arc<dyn IndexSink>,
    pub reverse: Arc<dyn IndexSink>,
    pub fulltext: Option<Arc<dyn IndexSink>>,
    pub statements: Vec<(KeyOrder, Arc<dyn IndexSink>)>,
}

impl SinkSet {
    /// All-in-memory sink set with the three triple orderings.
    pub fn in_memory_triples() -> Self {
        Self {
            direct: MemorySink::assigning("direct"),
            overflow: MemorySink::assigning("overflow"),
            reverse: MemorySink::keyed("reverse"),
            fulltext: Some(MemorySink::keyed("fulltext")),
            statements: KeyOrder::TRIPLE_ORDERS
                .iter()
                .map(|o| (*o, MemorySink::keyed(o.name()) as Arc<dyn IndexSink>))
                .collect(),
        }
    }

    /// All-in-memory sink set with the four quad orderings.
    pub fn in_memory_quads() -> Self {
        Self {
            statements: KeyOrder::QUAD_ORDERS
                .iter()
                .map(|o| (*o, MemorySink::keyed(o.name()) as Arc<dyn IndexSink>))
                .collect(),
            ..Self::in_memory_triples()
        }
    }

    fn abort_all(&self) {
        self.direct.abort();
        self.overflow.abort();
        self.reverse.abort();
        if let Some(sink) = &self.fulltext {
            sink.abort();
        }
        for (_, sink) in &self.statements {
            sink.abort();
        }
    }
}

/// Follow-up work produced by a completion notice
pub type NoticeFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Observes terminal document states. Callbacks run on the task that retired
/// the document and must be quick; anything slow goes into the returned
/// future, which runs on the notify pool.
pub trait CompletionListener: Send + Sync {
    fn on_success(&self, resource: &Resource) -> Option<NoticeFuture> {
        let _ = resource;
        None
    }

    fn on_failure(&self, resource: &Resource, error: &IngestError) -> Option<NoticeFuture> {
        let _ = (resource, error);
        None
    }
}

/// Default listener: terminal states are already logged by the loader, so
/// this adds nothing.
pub struct NoopListener;

impl CompletionListener for NoopListener {}

/// Builder for [`BulkLoader`]; `start` spawns the pool dispatchers and must
/// run inside a tokio runtime.
pub struct LoaderBuilder {
    config: LoaderConfig,
    parser: Arc<dyn DocumentParser>,
    sinks: SinkSet,
    classifier: Arc<dyn TermClassifier>,
    listener: Arc<dyn CompletionListener>,
    blank_scope: Option<BlankNodeScope>,
}

impl LoaderBuilder {
    pub fn classifier(mut self, classifier: impl TermClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn listener(mut self, listener: impl CompletionListener + 'static) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    /// Share one blank-node scope across every document of this load.
    pub fn shared_blank_scope(mut self, scope: BlankNodeScope) -> Self {
        self.blank_scope = Some(scope);
        self
    }

    pub fn start(self) -> BulkLoader {
        let flow = Arc::new(FlowControl::new(self.config.pause_threshold));
        let parser_pool = ParserPool::start(
            "parser",
            self.config.parser_workers,
            self.config.parser_queue_depth,
            Arc::clone(&flow),
        );
        let ids_pool = WorkerPool::start("ids-writer", self.config.ids_writers);
        let other_pool = WorkerPool::start("other-writer", self.config.other_writers);
        let notify_pool = WorkerPool::start("notify", self.config.notify_workers);
        BulkLoader {
            inner: Arc::new(LoaderInner {
                config: self.config,
                parser: self.parser,
                sinks: self.sinks,
                classifier: self.classifier,
                listener: self.listener,
                blank_scope: self.blank_scope,
                workflow: Workflow::new(),
                flow,
                stats: Stats::new(),
                parser_pool,
                ids_pool,
                other_pool,
                notify_pool,
                started: Instant::now(),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

struct LoaderInner {
    config: LoaderConfig,
    parser: Arc<dyn DocumentParser>,
    sinks: SinkSet,
    classifier: Arc<dyn TermClassifier>,
    listener: Arc<dyn CompletionListener>,
    blank_scope: Option<BlankNodeScope>,
    workflow: Workflow,
    flow: Arc<FlowControl>,
    stats: Stats,
    parser_pool: ParserPool,
    ids_pool: WorkerPool,
    other_pool: WorkerPool,
    notify_pool: WorkerPool,
    started: Instant,
    closed: AtomicBool,
}

pub struct BulkLoader {
    inner: Arc<LoaderInner>,
}

impl BulkLoader {
    pub fn builder(
        config: LoaderConfig,
        parser: Arc<dyn DocumentParser>,
        sinks: SinkSet,
    ) -> LoaderBuilder {
        LoaderBuilder {
            config,
            parser,
            sinks,
            classifier: Arc::new(ByteThresholdClassifier::default()),
            listener: Arc::new(NoopListener),
            blank_scope: None,
        }
    }

    /// Accept a document. Non-blocking: a full parse queue returns the
    /// retryable `QueueFull` with the acceptance backed out.
    pub fn submit(&self, resource: Resource) -> Result<()> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return Err(IngestError::Closed);
        }
        let job = parse_document(Arc::clone(inner), resource);
        let mut wf = inner.workflow.lock();
        wf.accept_document();
        match inner.parser_pool.try_submit(job) {
            Ok(()) => Ok(()),
            Err(e) => {
                wf.reject_document();
                Err(e)
            }
        }
    }

    /// `submit`, retrying `QueueFull` every `retry_interval`.
    pub async fn submit_with_retry(&self, resource: Resource) -> Result<()> {
        loop {
            match self.submit(resource.clone()) {
                Err(e) if e.is_retryable() => {
                    tokio::time::sleep(self.inner.config.retry_interval).await;
                }
                other => return other,
            }
        }
    }

    pub fn counters(&self) -> LoaderCounters {
        let inner = &self.inner;
        LoaderCounters {
            documents_parsed: inner.stats.documents_parsed.load(Ordering::SeqCst),
            documents_ids_waiting: inner.stats.documents_ids_waiting.load(Ordering::SeqCst),
            documents_ids_ready: inner.stats.documents_ids_ready.load(Ordering::SeqCst),
            documents_restart_safe: inner.stats.documents_restart_safe.load(Ordering::SeqCst),
            documents_failed: inner.stats.documents_failed.load(Ordering::SeqCst),
            statements_restart_safe: inner.stats.statements_restart_safe.load(Ordering::SeqCst),
            outstanding_statements: inner.flow.outstanding(),
            unbuffered_statements: inner.flow.unbuffered(),
            paused_workers: inner.flow.paused_workers(),
            pause_events: inner.flow.pause_events(),
            workflow: inner.workflow.snapshot(),
            elapsed: inner.started.elapsed(),
        }
    }

    /// Drain everything submitted so far and shut the pipeline down.
    ///
    /// Stages drain strictly in pipeline order, and each group of sinks is
    /// closed only after the guard counter covering it reaches zero, so no
    /// task ever writes to a closed sink. Blocks until every accepted
    /// document reached a terminal state and every notice ran.
    pub async fn close(&self) {
        let inner = &self.inner;
        inner.closed.store(true, Ordering::SeqCst);
        let grace = inner.config.shutdown_grace;
        info!("draining bulk loader");

        inner.workflow.wait_until(|s| s.parsing == 0).await;
        inner.parser_pool.close(grace).await;

        inner.workflow.wait_until(|s| s.guard_ids == 0).await;
        close_sink(&*inner.sinks.direct).await;
        close_sink(&*inner.sinks.overflow).await;

        inner.workflow.wait_until(|s| s.buffering_ids == 0).await;
        inner.ids_pool.close(grace).await;

        inner.workflow.wait_until(|s| s.guard_other == 0).await;
        close_sink(&*inner.sinks.reverse).await;
        if let Some(sink) = &inner.sinks.fulltext {
            close_sink(&**sink).await;
        }
        for (_, sink) in &inner.sinks.statements {
            close_sink(&**sink).await;
        }

        inner.workflow.wait_until(|s| s.buffering_other == 0).await;
        inner.other_pool.close(grace).await;

        inner.workflow.wait_until(|s| s.document == 0).await;
        inner.workflow.wait_until(|s| s.guard_notify == 0).await;
        inner.notify_pool.close(grace).await;

        let counters = self.counters();
        info!(
            restart_safe = counters.documents_restart_safe,
            failed = counters.documents_failed,
            statements = counters.statements_restart_safe,
            "bulk loader drained"
        );
    }

    /// Abandon everything in flight. No drain, no further accounting; sinks
    /// are aborted so in-flight writes fail fast.
    pub fn cancel_all(&self) {
        let inner = &self.inner;
        inner.closed.store(true, Ordering::SeqCst);
        inner.parser_pool.abort();
        inner.ids_pool.abort();
        inner.other_pool.abort();
        inner.notify_pool.abort();
        inner.sinks.abort_all();
        warn!("bulk loader cancelled");
    }
}

async fn close_sink(sink: &dyn IndexSink) {
    if let Err(e) = sink.close().await {
        warn!(sink = sink.name(), error = %e, "sink close failed");
    }
}

// ============================================================================
// Stage 1: parse
// ============================================================================

async fn parse_document(inner: Arc<LoaderInner>, resource: Resource) {
    let mut buffer = DocumentBuffer::new(resource.clone(), inner.config.chunk_size);
    if let Some(scope) = &inner.blank_scope {
        buffer = buffer.with_blank_scope(scope.clone());
    }

    match parse_into(&inner, &resource, &mut buffer).await {
        Ok(()) => {
            let n = buffer.statement_count();
            inner.stats.documents_parsed.fetch_add(1, Ordering::SeqCst);
            inner
                .stats
                .documents_ids_waiting
                .fetch_add(1, Ordering::SeqCst);
            inner.flow.statements_parsed(n);
            {
                inner.workflow.lock().parse_succeeded();
            }
            debug!(resource = %resource, statements = n, "document parsed");

            let job = buffer_identifier_writes(Arc::clone(&inner), buffer);
            if inner.ids_pool.submit(job).is_err() {
                // Pool closed underneath us; the document dies here.
                inner
                    .stats
                    .documents_ids_waiting
                    .fetch_sub(1, Ordering::SeqCst);
                inner.flow.statements_buffered(n);
                inner.flow.statements_settled(n);
                fail_document(&inner, &resource, &IngestError::Closed, |wf| {
                    wf.ids_write_failed()
                });
            }
        }
        Err(e) => {
            fail_document(&inner, &resource, &e, |wf| wf.parse_failed());
        }
    }
}

async fn parse_into(
    inner: &LoaderInner,
    resource: &Resource,
    buffer: &mut DocumentBuffer,
) -> Result<()> {
    let data = resource.read().await?;
    let mut reader = std::io::Cursor::new(data);
    inner
        .parser
        .parse(&mut reader, inner.config.default_graph.as_deref(), buffer)?;
    Ok(())
}

// ============================================================================
// Stage 2: identifier writes
// ============================================================================

async fn buffer_identifier_writes(inner: Arc<LoaderInner>, buffer: DocumentBuffer) {
    let resource = buffer.resource().clone();
    let n = buffer.statement_count();
    let terms: Vec<Arc<CanonicalTerm>> = buffer.terms().to_vec();

    // The buffer parks here until the identifier latch drains; the failure
    // path empties the slot so a draining latch cannot revive a document
    // that already died.
    let slot: Arc<Mutex<Option<DocumentBuffer>>> = Arc::new(Mutex::new(Some(buffer)));

    let ids_latch = {
        let inner = Arc::clone(&inner);
        let slot = Arc::clone(&slot);
        let resource = resource.clone();
        Arc::new(Latch::with_action("identifier", move || {
            // Runs on whoever acknowledged the last identifier write. Only
            // counters and a pool handoff happen here.
            let Some(buffer) = slot.lock().unwrap().take() else {
                return;
            };
            inner
                .stats
                .documents_ids_waiting
                .fetch_sub(1, Ordering::SeqCst);
            inner.stats.documents_ids_ready.fetch_add(1, Ordering::SeqCst);
            let job = buffer_other_writes(Arc::clone(&inner), buffer);
            if inner.other_pool.submit(job).is_err() {
                inner.flow.statements_buffered(n);
                inner.flow.statements_settled(n);
                fail_document(&inner, &resource, &IngestError::Closed, |wf| {
                    wf.ids_dispatch_failed()
                });
            }
        }))
    };

    // Held across the scan and the outcome bookkeeping: entries acknowledged
    // mid-scan could otherwise zero the latch the instant the scan's own hold
    // drops, letting the zero action hand the document on while the error
    // branch below retires it a second time.
    let submit_hold = LatchHold::new(&ids_latch);
    let result = tasks::write_term_assignments(
        &terms,
        &*inner.classifier,
        &*inner.sinks.direct,
        &*inner.sinks.overflow,
        &ids_latch,
        inner.config.chunk_size,
    )
    .await;

    match result {
        Ok(()) => {
            inner.workflow.lock().ids_write_succeeded();
            drop(submit_hold);
        }
        Err(e) => {
            // Empty the slot before retiring the document; the latch still
            // drains (rejected entries released their tags) but its action
            // finds nothing to hand on.
            match slot.lock().unwrap().take() {
                Some(buffer) => {
                    drop(buffer);
                    inner
                        .stats
                        .documents_ids_waiting
                        .fetch_sub(1, Ordering::SeqCst);
                    inner.flow.statements_buffered(n);
                    inner.flow.statements_settled(n);
                    fail_document(&inner, &resource, &e, |wf| wf.ids_write_failed());
                }
                // The zero action already took the buffer and handed the
                // document downstream; only the sink guard remains.
                None => {
                    inner.workflow.lock().ids_write_succeeded();
                }
            }
            drop(submit_hold);
        }
    }
}

// ============================================================================
// Stage 3: downstream writes
// ============================================================================

async fn buffer_other_writes(inner: Arc<LoaderInner>, mut buffer: DocumentBuffer) {
    {
        inner.workflow.lock().begin_other_writes();
    }
    let resource = buffer.resource().clone();
    let n = buffer.statement_count();
    let terms: Vec<Arc<CanonicalTerm>> = buffer.terms().to_vec();
    let chunks = buffer.drain_statements();

    // One terminal state per document: whichever of {latch action, error
    // path} flips this first wins, the other becomes a no-op.
    let settled = Arc::new(AtomicBool::new(false));

    let restart_latch = {
        let inner = Arc::clone(&inner);
        let resource = resource.clone();
        let settled = Arc::clone(&settled);
        Arc::new(Latch::with_action("restart-safe", move || {
            if settled.swap(true, Ordering::SeqCst) {
                return;
            }
            inner
                .stats
                .documents_restart_safe
                .fetch_add(1, Ordering::SeqCst);
            inner
                .stats
                .statements_restart_safe
                .fetch_add(n as u64, Ordering::SeqCst);
            inner.flow.statements_settled(n);
            document_done(&inner, &resource, |wf| wf.document_restart_safe());
        }))
    };

    // Held across submission so the latch cannot hit zero with scans still
    // launching; dropped only after the outcome is recorded.
    let submit_hold = LatchHold::new(&restart_latch);
    let result = run_downstream_scans(&inner, &terms, &chunks, &restart_latch).await;

    // Cleanup on every path: the accumulator is spent and the parser gate
    // gets these statements back.
    buffer.reset();
    inner.flow.statements_buffered(n);

    match result {
        Ok(()) => {
            {
                inner.workflow.lock().other_writes_succeeded();
            }
            drop(submit_hold);
        }
        Err(e) => {
            settled.store(true, Ordering::SeqCst);
            inner.flow.statements_settled(n);
            fail_document(&inner, &resource, &e, |wf| wf.other_writes_failed());
            drop(submit_hold);
        }
    }
}

async fn run_downstream_scans(
    inner: &Arc<LoaderInner>,
    terms: &[Arc<CanonicalTerm>],
    chunks: &[Vec<CanonicalStatement>],
    latch: &Arc<Latch>,
) -> Result<()> {
    let chunk_size = inner.config.chunk_size;
    let mut scans: Vec<Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>> = Vec::new();
    scans.push(Box::pin(tasks::write_reverse_index(
        terms,
        &*inner.classifier,
        &*inner.sinks.reverse,
        latch,
        chunk_size,
    )));
    if let Some(sink) = &inner.sinks.fulltext {
        scans.push(Box::pin(tasks::write_fulltext_index(
            terms,
            &**sink,
            latch,
            chunk_size,
            inner.config.fulltext_typed_literals,
        )));
    }
    for (order, sink) in &inner.sinks.statements {
        scans.push(Box::pin(tasks::write_statement_order(
            chunks,
            *order,
            &**sink,
            latch,
            chunk_size,
        )));
    }
    try_join_all(scans).await.map(|_| ())
}

// ============================================================================
// Terminal states
// ============================================================================

fn fail_document(
    inner: &Arc<LoaderInner>,
    resource: &Resource,
    err: &IngestError,
    transition: impl FnOnce(&mut WorkflowState),
) {
    inner.stats.documents_failed.fetch_add(1, Ordering::SeqCst);
    error!(resource = %resource, error = %err, "document failed");
    let notice = inner.listener.on_failure(resource, err);
    retire(inner, notice, transition);
}

fn document_done(
    inner: &Arc<LoaderInner>,
    resource: &Resource,
    transition: impl FnOnce(&mut WorkflowState),
) {
    debug!(resource = %resource, "document restart safe");
    let mut notice = inner.listener.on_success(resource);
    if inner.config.delete_after_load {
        if let Some(path) = resource.as_path() {
            let path = path.to_path_buf();
            let previous = notice.take();
            notice = Some(Box::pin(async move {
                if let Some(prev) = previous {
                    prev.await;
                }
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => debug!(path = %path.display(), "removed loaded file"),
                    Err(e) => warn!(path = %path.display(), error = %e, "could not remove loaded file"),
                }
            }));
        }
    }
    retire(inner, notice, transition);
}

/// Apply the document's terminal transition and, under the same lock, take
/// the notify guard for its notice. `close()` therefore never observes the
/// document gone while its notice is unaccounted, so the notify pool cannot
/// shut down underneath a pending notice.
fn retire(
    inner: &Arc<LoaderInner>,
    notice: Option<NoticeFuture>,
    transition: impl FnOnce(&mut WorkflowState),
) {
    {
        let mut wf = inner.workflow.lock();
        transition(&mut *wf);
        if notice.is_some() {
            wf.begin_notify();
        }
    }
    let Some(notice) = notice else { return };
    let inner2 = Arc::clone(inner);
    let submitted = inner.notify_pool.submit(async move {
        notice.await;
        inner2.workflow.lock().end_notify();
    });
    if submitted.is_err() {
        // Only reachable after cancel_all; an ordered close() keeps the
        // notify pool open until the guard drains.
        inner.workflow.lock().end_notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphload_ir::NQuadsParser;
    use std::time::Duration;

    fn loader_with_memory_sinks() -> (BulkLoader, Arc<MemorySink>, Arc<MemorySink>) {
        let direct = MemorySink::assigning("direct");
        let spo = MemorySink::keyed("spo");
        let sinks = SinkSet {
            direct: direct.clone(),
            overflow: MemorySink::assigning("overflow"),
            reverse: MemorySink::keyed("reverse"),
            fulltext: None,
            statements: vec![(KeyOrder::Spo, spo.clone() as Arc<dyn IndexSink>)],
        };
        let loader =
            BulkLoader::builder(LoaderConfig::small(), Arc::new(NQuadsParser::new()), sinks)
                .start();
        (loader, direct, spo)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_document_load() {
        let (loader, direct, spo) = loader_with_memory_sinks();
        loader
            .submit(Resource::bytes(
                "doc",
                b"<http://e.org/a> <http://e.org/p> <http://e.org/b> .\n".to_vec(),
            ))
            .unwrap();
        loader.close().await;

        let counters = loader.counters();
        assert_eq!(counters.documents_parsed, 1);
        assert_eq!(counters.documents_restart_safe, 1);
        assert_eq!(counters.documents_failed, 0);
        assert_eq!(counters.statements_restart_safe, 1);
        assert_eq!(counters.outstanding_statements, 0);
        assert_eq!(counters.unbuffered_statements, 0);
        assert_eq!(counters.workflow.document, 0);
        assert_eq!(direct.len(), 3);
        assert_eq!(spo.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parse_failure_counts_failed() {
        let (loader, _direct, spo) = loader_with_memory_sinks();
        loader
            .submit(Resource::bytes("bad", b"not nquads at all\n".to_vec()))
            .unwrap();
        loader.close().await;

        let counters = loader.counters();
        assert_eq!(counters.documents_parsed, 0);
        assert_eq!(counters.documents_failed, 1);
        assert_eq!(counters.workflow.document, 0);
        assert!(spo.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_after_close_rejected() {
        let (loader, _, _) = loader_with_memory_sinks();
        loader.close().await;
        let res = loader.submit(Resource::bytes("doc", Vec::new()));
        assert!(matches!(res, Err(IngestError::Closed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_with_retry_eventually_accepts() {
        let (loader, _, _) = loader_with_memory_sinks();
        // Small queue; hammer it. Retries must absorb transient QueueFull.
        for i in 0..50 {
            let doc = format!(
                "<http://e.org/s{i}> <http://e.org/p> \"v{i}\" .\n"
            );
            loader
                .submit_with_retry(Resource::bytes(format!("doc-{i}"), doc.into_bytes()))
                .await
                .unwrap();
        }
        loader.close().await;
        assert_eq!(loader.counters().documents_restart_safe, 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_all_stops_quickly() {
        let (loader, _, _) = loader_with_memory_sinks();
        for i in 0..10 {
            let _ = loader.submit(Resource::bytes(
                format!("doc-{i}"),
                b"<http://e.org/a> <http://e.org/p> \"x\" .\n".to_vec(),
            ));
        }
        loader.cancel_all();
        // No drain guarantee after cancel; just ensure nothing deadlocks.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(loader.submit(Resource::bytes("late", Vec::new())).is_err());
    }
}
