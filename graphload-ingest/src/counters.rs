//! Flow control and diagnostic counters
//!
//! [`FlowControl`] tracks the two statement-level gauges that outlive any one
//! document: `outstanding` (parsed, not yet restart safe) and `unbuffered`
//! (parsed, not yet handed to a sink). The parser pool pauses on the
//! unbuffered gauge, so a flood of parsed-but-unwritten statements stops
//! admitting new parse work instead of exhausting memory.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use crate::workflow::WorkflowSnapshot;

#[derive(Debug)]
pub struct FlowControl {
    pause_threshold: u64,
    outstanding: AtomicI64,
    unbuffered: AtomicI64,
    resumed: Notify,
    paused_workers: AtomicU64,
    pause_events: AtomicU64,
}

impl FlowControl {
    /// `pause_threshold` of 0 disables pausing.
    pub fn new(pause_threshold: u64) -> Self {
        Self {
            pause_threshold,
            outstanding: AtomicI64::new(0),
            unbuffered: AtomicI64::new(0),
            resumed: Notify::new(),
            paused_workers: AtomicU64::new(0),
            pause_events: AtomicU64::new(0),
        }
    }

    /// A document finished parsing with `n` statements.
    pub fn statements_parsed(&self, n: usize) {
        self.outstanding.fetch_add(n as i64, Ordering::SeqCst);
        self.unbuffered.fetch_add(n as i64, Ordering::SeqCst);
    }

    /// `n` statements were handed to sinks (or abandoned by a failed
    /// document). Wakes paused parse workers when the gauge falls back to
    /// the threshold.
    pub fn statements_buffered(&self, n: usize) {
        let after = self.unbuffered.fetch_sub(n as i64, Ordering::SeqCst) - n as i64;
        debug_assert!(after >= 0, "unbuffered gauge went negative: {after}");
        if self.pause_threshold == 0 || after <= self.pause_threshold as i64 {
            self.resumed.notify_waiters();
        }
    }

    /// `n` statements reached a terminal state (restart safe or failed).
    pub fn statements_settled(&self, n: usize) {
        self.outstanding.fetch_sub(n as i64, Ordering::SeqCst);
    }

    pub fn outstanding(&self) -> i64 {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn unbuffered(&self) -> i64 {
        self.unbuffered.load(Ordering::SeqCst)
    }

    fn over_threshold(&self) -> bool {
        self.pause_threshold != 0
            && self.unbuffered.load(Ordering::SeqCst) > self.pause_threshold as i64
    }

    /// Block the calling parse worker while the unbuffered gauge is over the
    /// threshold. Re-checks after every wake.
    pub async fn admit(&self) {
        if !self.over_threshold() {
            return;
        }
        self.pause_events.fetch_add(1, Ordering::Relaxed);
        self.paused_workers.fetch_add(1, Ordering::SeqCst);
        loop {
            let notified = self.resumed.notified();
            if !self.over_threshold() {
                break;
            }
            notified.await;
        }
        self.paused_workers.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn paused_workers(&self) -> u64 {
        self.paused_workers.load(Ordering::SeqCst)
    }

    /// Cumulative count of pause episodes
    pub fn pause_events(&self) -> u64 {
        self.pause_events.load(Ordering::Relaxed)
    }
}

/// Document/statement counters, safe to read from any thread at any time.
/// All cumulative and monotonic except `documents_ids_waiting`, a gauge of
/// documents parsed but not yet identifier-durable.
#[derive(Debug, Default)]
pub struct Stats {
    pub documents_parsed: AtomicU64,
    pub documents_ids_waiting: AtomicI64,
    pub documents_ids_ready: AtomicU64,
    pub documents_restart_safe: AtomicU64,
    pub documents_failed: AtomicU64,
    pub statements_restart_safe: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Point-in-time view of everything the loader counts.
#[derive(Debug, Clone)]
pub struct LoaderCounters {
    pub documents_parsed: u64,
    /// Documents whose identifier writes are buffered but not yet durable
    pub documents_ids_waiting: i64,
    pub documents_ids_ready: u64,
    pub documents_restart_safe: u64,
    pub documents_failed: u64,
    pub statements_restart_safe: u64,
    pub outstanding_statements: i64,
    pub unbuffered_statements: i64,
    pub paused_workers: u64,
    pub pause_events: u64,
    pub workflow: WorkflowSnapshot,
    pub elapsed: Duration,
}

impl LoaderCounters {
    /// Restart-safe statements per second since the loader started.
    pub fn statements_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.statements_restart_safe as f64 / secs
    }
}
