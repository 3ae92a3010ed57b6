//! Workflow stage accounting
//!
//! Every accepted document occupies exactly one of three stages — parsing,
//! buffering identifier writes, buffering other index writes — until it
//! reaches a terminal state and leaves the `document` count. Three guard
//! counters additionally track tasks that are *about to* write to a sink, so
//! `close()` never closes a sink out from under a task that already holds a
//! reference to it.
//!
//! All seven counters live behind one mutex and every transition happens as a
//! single method call on the locked state, so multi-counter updates are
//! atomic and holding the guard is proof of consistency. After every
//! transition the stage identity
//!
//! ```text
//! parsing + buffering_ids + buffering_other == document
//! ```
//!
//! is re-checked; a violation panics, because it means the accounting itself
//! is broken and any further progress reporting would lie.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

/// The seven workflow counters. All transitions go through the named methods;
/// fields are read-only to the rest of the crate via [`WorkflowSnapshot`].
#[derive(Debug, Default)]
pub struct WorkflowState {
    /// Documents accepted and not yet terminal
    document: i64,
    /// Documents queued for or undergoing parse
    parsing: i64,
    /// Documents whose identifier writes are buffered but not yet durable
    buffering_ids: i64,
    /// Documents whose downstream index writes are buffered but not durable
    buffering_other: i64,
    /// Tasks holding a reference to the identifier sinks
    guard_ids: i64,
    /// Tasks holding a reference to the downstream sinks
    guard_other: i64,
    /// In-flight completion notices
    guard_notify: i64,
}

/// Point-in-time copy of the workflow counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub document: i64,
    pub parsing: i64,
    pub buffering_ids: i64,
    pub buffering_other: i64,
    pub guard_ids: i64,
    pub guard_other: i64,
    pub guard_notify: i64,
}

impl WorkflowState {
    fn check(&self) {
        let sum = self.parsing + self.buffering_ids + self.buffering_other;
        if sum != self.document
            || self.parsing < 0
            || self.buffering_ids < 0
            || self.buffering_other < 0
            || self.document < 0
            || self.guard_ids < 0
            || self.guard_other < 0
            || self.guard_notify < 0
        {
            panic!("workflow accounting violated: {:?}", self);
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            document: self.document,
            parsing: self.parsing,
            buffering_ids: self.buffering_ids,
            buffering_other: self.buffering_other,
            guard_ids: self.guard_ids,
            guard_other: self.guard_other,
            guard_notify: self.guard_notify,
        }
    }

    /// A document was accepted for parse.
    pub fn accept_document(&mut self) {
        self.document += 1;
        self.parsing += 1;
        self.check();
    }

    /// Back out an acceptance whose queue submission failed.
    pub fn reject_document(&mut self) {
        self.parsing -= 1;
        self.document -= 1;
        self.check();
    }

    /// Parse finished; the identifier-write task now owns the document.
    pub fn parse_succeeded(&mut self) {
        self.parsing -= 1;
        self.buffering_ids += 1;
        self.guard_ids += 1;
        self.check();
    }

    /// Parse failed; the document is terminal.
    pub fn parse_failed(&mut self) {
        self.parsing -= 1;
        self.document -= 1;
        self.check();
    }

    /// Identifier writes are all buffered; the sink reference is released.
    pub fn ids_write_succeeded(&mut self) {
        self.guard_ids -= 1;
        self.check();
    }

    /// Identifier writes failed; the document is terminal.
    pub fn ids_write_failed(&mut self) {
        self.guard_ids -= 1;
        self.buffering_ids -= 1;
        self.document -= 1;
        self.check();
    }

    /// Identifiers became durable but the downstream task could not be
    /// scheduled (pool closed); the document is terminal.
    pub fn ids_dispatch_failed(&mut self) {
        self.buffering_ids -= 1;
        self.document -= 1;
        self.check();
    }

    /// The downstream-writes task started running.
    pub fn begin_other_writes(&mut self) {
        self.guard_other += 1;
        self.buffering_ids -= 1;
        self.buffering_other += 1;
        self.check();
    }

    /// Downstream writes are all buffered; the sink references are released.
    pub fn other_writes_succeeded(&mut self) {
        self.guard_other -= 1;
        self.check();
    }

    /// Downstream writes failed; the document is terminal.
    pub fn other_writes_failed(&mut self) {
        self.guard_other -= 1;
        self.buffering_other -= 1;
        self.document -= 1;
        self.check();
    }

    /// Every downstream write acknowledged durable; the document is terminal
    /// and restart safe.
    pub fn document_restart_safe(&mut self) {
        self.buffering_other -= 1;
        self.document -= 1;
        self.check();
    }

    /// A completion notice was scheduled.
    pub fn begin_notify(&mut self) {
        self.guard_notify += 1;
        self.check();
    }

    /// A completion notice finished (or failed to schedule).
    pub fn end_notify(&mut self) {
        self.guard_notify -= 1;
        self.check();
    }
}

/// Shared workflow state plus a change signal for `close()`-style waits.
#[derive(Debug, Default)]
pub struct Workflow {
    state: Mutex<WorkflowState>,
    changed: Notify,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the counters for one or more transitions. Waiters are woken when
    /// the guard drops.
    pub fn lock(&self) -> WorkflowGuard<'_> {
        WorkflowGuard {
            guard: self.state.lock().unwrap(),
            changed: &self.changed,
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.state.lock().unwrap().snapshot()
    }

    /// Resolve once `pred` holds. Re-evaluated after every transition.
    pub async fn wait_until(&self, pred: impl Fn(&WorkflowSnapshot) -> bool) {
        loop {
            let notified = self.changed.notified();
            if pred(&self.snapshot()) {
                return;
            }
            notified.await;
        }
    }
}

pub struct WorkflowGuard<'a> {
    guard: MutexGuard<'a, WorkflowState>,
    changed: &'a Notify,
}

impl Deref for WorkflowGuard<'_> {
    type Target = WorkflowState;
    fn deref(&self) -> &WorkflowState {
        &self.guard
    }
}

impl DerefMut for WorkflowGuard<'_> {
    fn deref_mut(&mut self) -> &mut WorkflowState {
        &mut self.guard
    }
}

impl Drop for WorkflowGuard<'_> {
    fn drop(&mut self) {
        self.changed.notify_waiters();
    }
}
