use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::PoolError;

/// Bounded pool of execution slots fed by a FIFO queue.
///
/// Cloning yields another handle to the same pool.
pub struct WorkerPool<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkerPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<T> {
    size: usize,
    state: Mutex<PoolState<T>>,
}

impl<T> Shared<T> {
    /// The pool's single dispatch point. Never held across an `.await`.
    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct PoolState<T> {
    slots: Vec<Slot>,
    pending: VecDeque<Job<T>>,
    stopped: bool,
    next_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Idle,
    Busy(u64),
}

struct Job<T> {
    id: u64,
    work: BoxFuture<'static, T>,
    done: oneshot::Sender<Result<T, PoolError>>,
}

/// Completion handle of one submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    id: u64,
    rx: oneshot::Receiver<Result<T, PoolError>>,
}

impl<T> JobHandle<T> {
    /// Submission sequence number, unique within the pool.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the job to settle.
    ///
    /// Resolves with the job's output, or with the reason it produced none.
    pub async fn join(self) -> Result<T, PoolError> {
        // A dropped sender means the slot task died with the runtime before
        // reporting; the job never completed.
        self.rx.await.unwrap_or(Err(PoolError::Discarded))
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Creates a pool with `size` slots.
    pub fn new(size: NonZeroUsize) -> Self {
        let size = size.get();
        Self {
            shared: Arc::new(Shared {
                size,
                state: Mutex::new(PoolState {
                    slots: vec![Slot::Idle; size],
                    pending: VecDeque::new(),
                    stopped: false,
                    next_id: 0,
                }),
            }),
        }
    }

    /// Submits a job.
    ///
    /// Starts it at once on an idle slot, or queues it behind earlier
    /// submissions. Must be called from within a tokio runtime.
    pub fn submit<F>(&self, work: F) -> JobHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        let mut state = self.shared.lock();
        let id = state.next_id;
        state.next_id += 1;
        let handle = JobHandle { id, rx };

        if state.stopped {
            drop(state);
            debug!(job = id, "rejected job: pool stopped");
            let _ = done.send(Err(PoolError::Stopped));
            return handle;
        }

        let job = Job {
            id,
            work: work.boxed(),
            done,
        };

        match state.slots.iter().position(|s| *s == Slot::Idle) {
            Some(slot) => {
                state.slots[slot] = Slot::Busy(id);
                drop(state);
                trace!(slot, job = id, "dispatching job");
                tokio::spawn(run_slot(Arc::clone(&self.shared), slot, job));
            }
            None => {
                state.pending.push_back(job);
                trace!(job = id, pending = state.pending.len(), "queued job");
            }
        }

        handle
    }

    /// Soft stop: discards every queued job and refuses new ones.
    ///
    /// Running jobs are not interrupted; they finish and report normally.
    /// Returns the number of discarded jobs.
    pub fn stop(&self) -> usize {
        let discarded: Vec<Job<T>> = {
            let mut state = self.shared.lock();
            state.stopped = true;
            state.pending.drain(..).collect()
        };

        let count = discarded.len();
        for job in discarded {
            let _ = job.done.send(Err(PoolError::Discarded));
        }
        debug!(discarded = count, "pool stopped");
        count
    }
}

impl<T> WorkerPool<T> {
    /// Number of slots.
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Slots currently running a job.
    pub fn running(&self) -> usize {
        self.shared
            .lock()
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Busy(_)))
            .count()
    }

    /// Jobs waiting for a slot.
    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopped
    }
}

/// Drives one slot: runs `first`, then keeps pulling queued jobs until the
/// queue is empty or the pool stops.
async fn run_slot<T: Send + 'static>(shared: Arc<Shared<T>>, slot: usize, first: Job<T>) {
    let mut next = Some(first);

    while let Some(Job { id, work, done }) = next.take() {
        trace!(slot, job = id, "job started");

        let outcome = AssertUnwindSafe(work).catch_unwind().await.map_err(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(slot, job = id, error = %message, "job panicked");
            PoolError::Panicked(message)
        });

        // Hand the slot over before reporting, so a submitter that sees this
        // result also sees the slot freed or reassigned.
        {
            let mut state = shared.lock();
            next = if state.stopped {
                None
            } else {
                state.pending.pop_front()
            };
            state.slots[slot] = match &next {
                Some(job) => Slot::Busy(job.id),
                None => Slot::Idle,
            };
        }

        // The submitter may have dropped its handle; the output goes with it.
        let _ = done.send(outcome);
    }

    trace!(slot, "slot idle");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".into()
    }
}
