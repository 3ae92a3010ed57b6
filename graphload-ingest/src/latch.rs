//! Completion latch
//!
//! A [`Latch`] counts outstanding pieces of work for one stage of one
//! document. Producers follow a pre-increment discipline: increment before
//! starting any operation that could itself decrement, so the counter can
//! never graze zero while work remains in flight.
//!
//! When the count crosses from positive to zero the latch fires its on-zero
//! action (at most once per cycle; a cycle ends at zero and a re-increment
//! starts the next one) and wakes every waiter. The action runs on whichever
//! task performed the final decrement, after the internal lock is released.
//! Actions must not block: anything heavier than counter updates gets handed
//! to a worker pool.

use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type ZeroAction = Arc<dyn Fn() + Send + Sync>;

pub struct Latch {
    name: &'static str,
    count: Mutex<i64>,
    zero: Notify,
    action: Option<ZeroAction>,
}

impl Latch {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            count: Mutex::new(0),
            zero: Notify::new(),
            action: None,
        }
    }

    /// A latch whose `action` runs on every positive-to-zero transition.
    pub fn with_action(name: &'static str, action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            name,
            count: Mutex::new(0),
            zero: Notify::new(),
            action: Some(Arc::new(action)),
        }
    }

    /// Current count. Diagnostic only; the value may change immediately.
    pub fn value(&self) -> i64 {
        *self.count.lock().unwrap()
    }

    /// Add one outstanding piece of work.
    ///
    /// Panics if the counter was corrupted (non-positive after increment).
    pub fn increment(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        if *count <= 0 {
            panic!("latch '{}' corrupted: count {} after increment", self.name, *count);
        }
    }

    /// Retire one outstanding piece of work.
    ///
    /// Panics on decrement below zero (a double release).
    pub fn decrement(&self) {
        let hit_zero = {
            let mut count = self.count.lock().unwrap();
            if *count <= 0 {
                panic!("latch '{}' underflow: decrement at count {}", self.name, *count);
            }
            *count -= 1;
            *count == 0
        };
        if hit_zero {
            if let Some(action) = &self.action {
                action();
            }
            self.zero.notify_waiters();
        }
    }

    /// Resolve once the count is zero. A latch that never went positive
    /// resolves immediately.
    pub async fn wait(&self) {
        loop {
            let notified = self.zero.notified();
            if self.value() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for Latch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Latch")
            .field("name", &self.name)
            .field("count", &self.value())
            .finish()
    }
}

/// RAII increment: increments on construction, decrements exactly once on
/// drop. Scopes the pre-increment discipline so every exit path (including
/// cancellation and panic unwind in tests) releases its contribution.
pub struct LatchHold {
    latch: Arc<Latch>,
}

impl LatchHold {
    pub fn new(latch: &Arc<Latch>) -> Self {
        latch.increment();
        Self {
            latch: Arc::clone(latch),
        }
    }
}

impl Drop for LatchHold {
    fn drop(&mut self) {
        self.latch.decrement();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn test_counting() {
        let latch = Latch::new("t");
        assert_eq!(latch.value(), 0);
        latch.increment();
        latch.increment();
        assert_eq!(latch.value(), 2);
        latch.decrement();
        latch.decrement();
        assert_eq!(latch.value(), 0);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_decrement_below_zero_panics() {
        Latch::new("t").decrement();
    }

    #[test]
    fn test_action_fires_once_per_cycle() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = Arc::clone(&fired);
        let latch = Latch::with_action("t", move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });

        latch.increment();
        latch.increment();
        latch.decrement();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        latch.decrement();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Re-increment starts a new cycle; the action fires again.
        latch.increment();
        latch.decrement();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_action_may_reincrement() {
        // Chained stages: the first cycle's action opens the next cycle.
        let latch = Arc::new(Mutex::new(None::<Arc<Latch>>));
        let latch2 = Arc::clone(&latch);
        let chained = Arc::new(Latch::with_action("t", move || {
            if let Some(l) = latch2.lock().unwrap().as_ref() {
                l.increment();
            }
        }));
        *latch.lock().unwrap() = Some(Arc::clone(&chained));

        chained.increment();
        chained.decrement(); // fires action, which re-increments
        assert_eq!(chained.value(), 1);
        *latch.lock().unwrap() = None;
        chained.decrement();
        assert_eq!(chained.value(), 0);
    }

    #[tokio::test]
    async fn test_wait_resolves_on_zero() {
        let latch = Arc::new(Latch::new("t"));
        latch.increment();

        let waiter = {
            let latch = Arc::clone(&latch);
            tokio::spawn(async move {
                latch.wait().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        latch.decrement();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_on_idle_latch_is_immediate() {
        let latch = Latch::new("t");
        tokio::time::timeout(Duration::from_millis(100), latch.wait())
            .await
            .expect("idle latch resolves immediately");
    }

    #[test]
    fn test_hold_releases_on_drop() {
        let latch = Arc::new(Latch::new("t"));
        {
            let _hold = LatchHold::new(&latch);
            assert_eq!(latch.value(), 1);
        }
        assert_eq!(latch.value(), 0);
    }
}
