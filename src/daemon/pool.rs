//! A worker-thread pool that grows and shrinks between two bounds.
//!
//! Jobs go through a bounded channel. A job submitted while no worker is idle
//! starts a new worker, up to `max_threads`. A worker that waits
//! `thread_timeout` without a job exits, unless only `min_threads` remain.
//! Submitting blocks while the channel is full.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::error::{FerretError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolShared {
    receiver: Receiver<Job>,
    min_threads: usize,
    max_threads: usize,
    thread_timeout: Duration,
    threads: AtomicUsize,
    idle: AtomicUsize,
    next_id: AtomicUsize,
}

impl PoolShared {
    /// Reserve a slot for a new worker if the pool is below its maximum.
    fn reserve_thread(&self) -> bool {
        self.threads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_threads).then_some(n + 1)
            })
            .is_ok()
    }

    /// Give up a worker's slot if the pool is above its minimum.
    fn retire_thread(&self) -> bool {
        self.threads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n > self.min_threads).then(|| n - 1)
            })
            .is_ok()
    }
}

/// Pool of worker threads running submitted jobs.
pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ThreadPool {
    /// Create a pool and start `min_threads` workers.
    pub fn new(
        min_threads: usize,
        max_threads: usize,
        thread_timeout: Duration,
        queue_size: usize,
    ) -> Result<Self> {
        if min_threads == 0 || min_threads > max_threads {
            return Err(FerretError::invalid_argument(format!(
                "thread bounds {min_threads}..{max_threads} are invalid"
            )));
        }
        let (sender, receiver) = bounded(queue_size.max(1));
        let pool = ThreadPool {
            sender: Some(sender),
            shared: Arc::new(PoolShared {
                receiver,
                min_threads,
                max_threads,
                thread_timeout,
                threads: AtomicUsize::new(0),
                idle: AtomicUsize::new(0),
                next_id: AtomicUsize::new(0),
            }),
            handles: Mutex::new(Vec::new()),
        };
        for _ in 0..min_threads {
            if pool.shared.reserve_thread() {
                pool.spawn_worker()?;
            }
        }
        Ok(pool)
    }

    /// Number of live workers.
    pub fn thread_count(&self) -> usize {
        self.shared.threads.load(Ordering::Acquire)
    }

    /// Number of workers waiting for a job.
    pub fn idle_count(&self) -> usize {
        self.shared.idle.load(Ordering::Acquire)
    }

    /// Run `job` on a worker, starting a new one if none is idle.
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.idle_count() == 0 && self.shared.reserve_thread() {
            if let Err(e) = self.spawn_worker() {
                warn!("could not start worker: {e}");
            }
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| FerretError::exhausted("thread pool is shut down"))?;
        sender
            .send(Box::new(job))
            .map_err(|_| FerretError::exhausted("thread pool is shut down"))
    }

    /// Start a worker into a slot already reserved with `reserve_thread`.
    fn spawn_worker(&self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let worker_id = shared.next_id.fetch_add(1, Ordering::Relaxed);

        let spawned = thread::Builder::new()
            .name(format!("search-worker-{worker_id}"))
            .spawn(move || worker_loop(worker_id, &shared));
        match spawned {
            Ok(handle) => {
                let mut handles = self.handles.lock();
                handles.retain(|h| !h.is_finished());
                handles.push(handle);
                debug!("started worker {worker_id}");
                Ok(())
            }
            Err(e) => {
                self.shared.threads.fetch_sub(1, Ordering::AcqRel);
                Err(e.into())
            }
        }
    }

    /// Stop accepting jobs, let queued jobs finish, and wait for every worker.
    pub fn shutdown(&mut self) {
        self.sender.take();
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(worker_id: usize, shared: &PoolShared) {
    loop {
        shared.idle.fetch_add(1, Ordering::AcqRel);
        let received = shared.receiver.recv_timeout(shared.thread_timeout);
        shared.idle.fetch_sub(1, Ordering::AcqRel);

        match received {
            Ok(job) => {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!("worker {worker_id}: job panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if shared.retire_thread() {
                    debug!("worker {worker_id} idle, exiting");
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                shared.threads.fetch_sub(1, Ordering::AcqRel);
                return;
            }
        }
    }
}
