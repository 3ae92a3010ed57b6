//! Task pools
//!
//! Both pools share one shape: a channel feeds a dispatcher task that
//! acquires a semaphore permit per job and spawns the job holding the
//! permit, bounding concurrency at `workers`. Closing the channel lets the
//! dispatcher drain what is queued, then wait for in-flight jobs by
//! re-acquiring every permit.
//!
//! [`ParserPool`] adds the two intake behaviors the parse stage needs: a
//! *bounded* queue whose overflow surfaces as the retryable `QueueFull`, and
//! an admission gate that holds back the next parse job while too many
//! parsed statements sit unbuffered.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::counters::FlowControl;
use crate::error::{IngestError, Result};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Unbounded-intake pool for write and notify tasks.
pub struct WorkerPool {
    name: &'static str,
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn start(name: &'static str, workers: usize) -> Self {
        let workers = workers.max(1);
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let dispatcher = tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(workers));
            while let Some(job) = rx.recv().await {
                let permit = Arc::clone(&semaphore)
                    .acquire_owned()
                    .await
                    .expect("pool semaphore is never closed");
                tokio::spawn(async move {
                    let _permit = permit;
                    job.await;
                });
            }
            // Intake closed and queue drained; wait out in-flight jobs.
            let _all = semaphore
                .acquire_many(workers as u32)
                .await
                .expect("pool semaphore is never closed");
        });
        Self {
            name,
            tx: Mutex::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Queue a job. Never blocks; fails only once the pool is closed.
    pub fn submit(&self, job: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        match self.tx.lock().unwrap().as_ref() {
            Some(tx) => tx.send(Box::pin(job)).map_err(|_| IngestError::Closed),
            None => Err(IngestError::Closed),
        }
    }

    /// Stop intake and drain queued plus in-flight jobs, waiting at most
    /// `grace`. Expiry is logged, not fatal: jobs already spawned keep
    /// running to completion on the runtime.
    pub async fn close(&self, grace: Duration) {
        drop(self.tx.lock().unwrap().take());
        let handle = self.dispatcher.lock().unwrap().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(grace, handle).await.is_err() {
                warn!(pool = self.name, grace_ms = grace.as_millis() as u64,
                    "pool did not drain within the grace period");
            }
        }
    }

    /// Drop queued jobs without running them. In-flight jobs are not
    /// interrupted; callers abort the sinks they talk to instead.
    pub fn abort(&self) {
        drop(self.tx.lock().unwrap().take());
        if let Some(handle) = self.dispatcher.lock().unwrap().take() {
            handle.abort();
        }
    }
}

/// Bounded-intake pool for parse jobs.
pub struct ParserPool {
    name: &'static str,
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ParserPool {
    pub fn start(
        name: &'static str,
        workers: usize,
        queue_depth: usize,
        flow: Arc<FlowControl>,
    ) -> Self {
        let workers = workers.max(1);
        let (tx, mut rx) = mpsc::channel::<Job>(queue_depth.max(1));
        let dispatcher = tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(workers));
            while let Some(job) = rx.recv().await {
                let permit = Arc::clone(&semaphore)
                    .acquire_owned()
                    .await
                    .expect("pool semaphore is never closed");
                let flow = Arc::clone(&flow);
                tokio::spawn(async move {
                    let _permit = permit;
                    // Admission gate, checked by the worker right before the
                    // job runs: no parse starts while the unbuffered gauge
                    // is over the pause threshold.
                    flow.admit().await;
                    job.await;
                });
            }
            let _all = semaphore
                .acquire_many(workers as u32)
                .await
                .expect("pool semaphore is never closed");
        });
        Self {
            name,
            tx: Mutex::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Queue a parse job without blocking. A full queue is the retryable
    /// `QueueFull`; a closed pool is `Closed`.
    pub fn try_submit(&self, job: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        match self.tx.lock().unwrap().as_ref() {
            Some(tx) => tx.try_send(Box::pin(job)).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => IngestError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => IngestError::Closed,
            }),
            None => Err(IngestError::Closed),
        }
    }

    pub async fn close(&self, grace: Duration) {
        drop(self.tx.lock().unwrap().take());
        let handle = self.dispatcher.lock().unwrap().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(grace, handle).await.is_err() {
                warn!(pool = self.name, grace_ms = grace.as_millis() as u64,
                    "pool did not drain within the grace period");
            }
        }
    }

    pub fn abort(&self) {
        drop(self.tx.lock().unwrap().take());
        if let Some(handle) = self.dispatcher.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::oneshot;

    fn unbounded_flow() -> Arc<FlowControl> {
        Arc::new(FlowControl::new(0))
    }

    #[tokio::test]
    async fn test_worker_pool_runs_jobs() {
        let pool = WorkerPool::start("w", 2);
        let ran = Arc::new(AtomicU32::new(0));
        for _ in 0..5 {
            let ran = Arc::clone(&ran);
            pool.submit(async move {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.close(Duration::from_secs(5)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_submit_after_close_fails() {
        let pool = WorkerPool::start("w", 1);
        pool.close(Duration::from_secs(1)).await;
        assert!(matches!(pool.submit(async {}), Err(IngestError::Closed)));
    }

    #[tokio::test]
    async fn test_parser_pool_queue_full() {
        let flow = unbounded_flow();
        let pool = ParserPool::start("p", 1, 1, flow);
        let (hold_tx, hold_rx) = oneshot::channel::<()>();

        // First job occupies the single worker...
        pool.try_submit(async move {
            let _ = hold_rx.await;
        })
        .unwrap();
        // ...and enough follow-ups fill the dispatcher hop plus the queue.
        let mut saw_full = false;
        for _ in 0..3 {
            if let Err(e) = pool.try_submit(async {}) {
                assert!(matches!(e, IngestError::QueueFull));
                saw_full = true;
                break;
            }
        }
        assert!(saw_full, "bounded queue should report QueueFull");

        let _ = hold_tx.send(());
        pool.close(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_close_drains_queued_jobs() {
        let flow = unbounded_flow();
        let pool = ParserPool::start("p", 1, 4, flow);
        let ran = Arc::new(AtomicU32::new(0));
        for _ in 0..4 {
            let ran = Arc::clone(&ran);
            pool.try_submit(async move {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.close(Duration::from_secs(5)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_pause_gate_defers_parse_jobs() {
        let flow = Arc::new(FlowControl::new(5));
        flow.statements_parsed(10); // over threshold
        let pool = ParserPool::start("p", 1, 4, Arc::clone(&flow));

        let ran = Arc::new(AtomicU32::new(0));
        {
            let ran = Arc::clone(&ran);
            pool.try_submit(async move {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0, "gate should hold the job");

        flow.statements_buffered(10);
        pool.close(Duration::from_secs(5)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abort_discards_queue() {
        let flow = unbounded_flow();
        let pool = ParserPool::start("p", 1, 8, flow);
        let (hold_tx, hold_rx) = oneshot::channel::<()>();
        let ran = Arc::new(AtomicU32::new(0));

        pool.try_submit(async move {
            let _ = hold_rx.await;
        })
        .unwrap();
        for _ in 0..4 {
            let ran = Arc::clone(&ran);
            let _ = pool.try_submit(async move {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.abort();
        let _ = hold_tx.send(());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
