//! Per-target request sequencer
//!
//! Serializes outbound writes per target key so that rapid edits to the same
//! configuration reach the server in submission order. Each key gets its own
//! worker task draining a FIFO channel; keys never wait on each other.
//!
//! A failed operation does not abort queued successors. The result of every
//! executed operation is handed to the completion callback supplied with it,
//! which is where the caller confirms or rolls back its optimistic state.
//!
//! Debounced enqueueing coalesces keystroke-rate edits: a superseded
//! operation is dropped before it is ever sent (its callback never runs),
//! and the drop has no effect on other keys.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use cachegov_api::ConfigKey;

use crate::error::Result;

type OpFactory = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;
type SettleCallback = Box<dyn FnOnce(Result<()>) + Send>;

struct Job {
    run: OpFactory,
    settle: SettleCallback,
}

#[derive(Default)]
struct DebounceSlot {
    seq: u64,
    job: Option<Job>,
}

struct Inner {
    workers: DashMap<ConfigKey, mpsc::UnboundedSender<Job>>,
    debounce: Mutex<HashMap<ConfigKey, DebounceSlot>>,
}

/// FIFO write queue with one owning worker task per target key.
#[derive(Clone)]
pub struct RequestSequencer {
    inner: Arc<Inner>,
}

impl Default for RequestSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestSequencer {
    /// Create a sequencer. Must be used inside a tokio runtime.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                workers: DashMap::new(),
                debounce: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Append an operation to the key's queue. If the key is idle the
    /// operation starts immediately; otherwise it runs only after every
    /// earlier operation for the same key has settled.
    pub fn enqueue<F, Fut, C>(&self, key: ConfigKey, op: F, on_settle: C)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
        C: FnOnce(Result<()>) + Send + 'static,
    {
        self.enqueue_job(
            key,
            Job {
                run: Box::new(move || Box::pin(op())),
                settle: Box::new(on_settle),
            },
        );
    }

    /// Like [`RequestSequencer::enqueue`], but waits `window` before
    /// queueing and drops the operation if a newer debounced operation for
    /// the same key arrives within the window. A dropped operation's
    /// callback is never invoked. A zero window enqueues immediately.
    pub fn enqueue_debounced<F, Fut, C>(
        &self,
        key: ConfigKey,
        window: Duration,
        op: F,
        on_settle: C,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
        C: FnOnce(Result<()>) + Send + 'static,
    {
        let job = Job {
            run: Box::new(move || Box::pin(op())),
            settle: Box::new(on_settle),
        };

        if window.is_zero() {
            self.enqueue_job(key, job);
            return;
        }

        let my_seq = {
            let mut slots = self.inner.debounce.lock();
            let slot = slots.entry(key).or_default();
            slot.seq += 1;
            if slot.job.replace(job).is_some() {
                trace!("Dropped superseded debounced write for {}", key);
            }
            slot.seq
        };

        let sequencer = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let job = {
                let mut slots = sequencer.inner.debounce.lock();
                match slots.get_mut(&key) {
                    Some(slot) if slot.seq == my_seq => slot.job.take(),
                    _ => None,
                }
            };
            if let Some(job) = job {
                sequencer.enqueue_job(key, job);
            }
        });
    }

    fn enqueue_job(&self, key: ConfigKey, job: Job) {
        let sender = self
            .inner
            .workers
            .entry(key)
            .or_insert_with(|| {
                debug!("Starting write worker for {}", key);
                let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
                tokio::spawn(async move {
                    while let Some(job) = rx.recv().await {
                        let result = (job.run)().await;
                        (job.settle)(result);
                    }
                });
                tx
            })
            .clone();

        if sender.send(job).is_err() {
            error!("Write worker for {} is gone, dropping operation", key);
        }
    }
}
