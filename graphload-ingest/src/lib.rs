//! Asynchronous bulk-ingestion pipeline for graph statements
//!
//! Documents flow through four asynchronous stages, each handing off to the
//! next through a worker pool:
//!
//! 1. **Parse** — a bounded parser pool streams each document through a
//!    [`graphload_ir::DocumentParser`] into a per-document buffer that
//!    canonicalizes terms and accumulates statements.
//! 2. **Identifier writes** — each distinct term is classified (inline /
//!    direct / overflow) and batched to the identifier sinks; duplicate
//!    elimination in the sink hands one identifier to all instances.
//! 3. **Downstream writes** — once every identifier is durable, the reverse
//!    index, full-text index, and one statement index per key ordering are
//!    written in parallel.
//! 4. **Completion** — when every downstream write is durable the document
//!    is restart safe and its completion notice runs.
//!
//! Progress is tracked by per-document [`latch::Latch`]es and a global
//! [`workflow::Workflow`] whose stage counters always satisfy
//! `parsing + buffering_ids + buffering_other == document`. Backpressure is
//! a bounded intake queue plus a pause gate keyed on the count of parsed but
//! not yet buffered statements.

pub mod accumulator;
pub mod buffer;
pub mod canonical;
pub mod classify;
pub mod codec;
pub mod config;
mod counters;
mod error;
pub mod latch;
mod loader;
mod pool;
mod resource;
pub mod sink;
mod tasks;
pub mod workflow;

pub use canonical::{BlankNodeScope, CanonicalStatement, CanonicalTerm, TermId, TermInterner};
pub use classify::{ByteThresholdClassifier, Placement, TermClassifier};
pub use codec::KeyOrder;
pub use config::LoaderConfig;
pub use counters::{FlowControl, LoaderCounters};
pub use error::{IngestError, Result};
pub use loader::{
    BulkLoader, CompletionListener, LoaderBuilder, NoopListener, NoticeFuture, SinkSet,
};
pub use resource::Resource;
pub use sink::{IndexSink, MemorySink, SinkEntry};
