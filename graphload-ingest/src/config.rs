//! Loader configuration

use std::time::Duration;

/// Configuration for [`BulkLoader`](crate::BulkLoader).
///
/// Defaults target a multi-core bulk load; [`LoaderConfig::small`] shrinks
/// everything for tests and single-document tools.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of documents parsed concurrently
    pub parser_workers: usize,

    /// Bounded intake queue depth; a full queue makes `submit` return
    /// `QueueFull` rather than block
    pub parser_queue_depth: usize,

    /// Concurrent identifier-assignment write tasks
    pub ids_writers: usize,

    /// Concurrent downstream (reverse / text / statement) write tasks
    pub other_writers: usize,

    /// Concurrent completion-notice tasks
    pub notify_workers: usize,

    /// Pause parsing while more than this many parsed statements have not yet
    /// been handed to write sinks. `0` means never pause.
    pub pause_threshold: u64,

    /// Max entries per sorted sink batch
    pub chunk_size: usize,

    /// Delay between attempts in `submit_with_retry`
    pub retry_interval: Duration,

    /// How long `close()` waits for each pool before logging a warning
    pub shutdown_grace: Duration,

    /// Graph IRI assigned to statements the document leaves in the default
    /// graph. `None` keeps them in the default graph.
    pub default_graph: Option<String>,

    /// Index typed literals (non-string datatypes) in the full-text sink
    pub fulltext_typed_literals: bool,

    /// Remove successfully loaded file resources from disk
    pub delete_after_load: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            parser_workers: cores,
            parser_queue_depth: cores * 4,
            ids_writers: cores,
            other_writers: cores,
            notify_workers: 2,
            pause_threshold: 500_000,
            chunk_size: 1_000,
            retry_interval: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(10),
            default_graph: None,
            fulltext_typed_literals: false,
            delete_after_load: false,
        }
    }
}

impl LoaderConfig {
    /// Small preset for tests and single-shot tools.
    pub fn small() -> Self {
        Self {
            parser_workers: 2,
            parser_queue_depth: 4,
            ids_writers: 2,
            other_writers: 2,
            notify_workers: 1,
            pause_threshold: 0,
            chunk_size: 16,
            retry_interval: Duration::from_millis(10),
            shutdown_grace: Duration::from_secs(2),
            ..Self::default()
        }
    }

    pub fn with_parser_workers(mut self, n: usize) -> Self {
        self.parser_workers = n.max(1);
        self
    }

    pub fn with_parser_queue_depth(mut self, n: usize) -> Self {
        self.parser_queue_depth = n.max(1);
        self
    }

    pub fn with_pause_threshold(mut self, statements: u64) -> Self {
        self.pause_threshold = statements;
        self
    }

    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }

    pub fn with_default_graph(mut self, iri: impl Into<String>) -> Self {
        self.default_graph = Some(iri.into());
        self
    }

    pub fn with_delete_after_load(mut self, delete: bool) -> Self {
        self.delete_after_load = delete;
        self
    }
}
