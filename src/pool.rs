//! A fixed-size worker pool draining a single FIFO task queue, used by
//! [`crate::tree::LsmTree`] to run parallel `get`/`range` searches.
//!
//! The queue is realized as an unbounded `crossbeam` MPMC channel rather
//! than a hand-rolled mutex + condvar, which gives workers a blocking
//! receive for free and keeps `launch` lock-free on the hot path. A worker
//! never holds the channel while running a task, so a task is free to
//! enqueue further work without risking deadlock (the source's
//! self-resubmitting task pattern); in practice every call site in this
//! crate uses the plain loop form §9 recommends instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("enqueue on a stopped worker pool")]
    Stopped,
}

type Job = Box<dyn FnOnce() + Send + 'static>;
/// A task, re-enqueued `worker_count` times per `launch`; must tolerate
/// concurrent execution of its own clones.
pub type Task = Arc<dyn Fn() + Send + Sync + 'static>;

struct Pending {
    count: Mutex<usize>,
    cv: Condvar,
}

/// A fixed-size worker pool.
pub struct Pool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
    stopped: Arc<AtomicBool>,
}

impl Pool {
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = channel::unbounded::<Job>();
        let pending = Arc::new(Pending {
            count: Mutex::new(0),
            cv: Condvar::new(),
        });
        let stopped = Arc::new(AtomicBool::new(false));

        let workers = (0..worker_count)
            .map(|_| {
                let receiver = receiver.clone();
                std::thread::spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                })
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
            pending,
            stopped,
        }
    }

    /// Enqueues `worker_count` clones of `task`, one per worker. Returns
    /// once all clones are queued; does not wait for them to run — call
    /// [`wait_all`](Self::wait_all) for that.
    pub fn launch(&self, task: Task) -> Result<(), PoolError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(PoolError::Stopped);
        }
        let sender = self.sender.as_ref().ok_or(PoolError::Stopped)?;

        {
            let mut count = self.pending.count.lock().unwrap();
            *count += self.workers.len();
        }

        for _ in 0..self.workers.len() {
            let task = Arc::clone(&task);
            let pending = Arc::clone(&self.pending);
            let job: Job = Box::new(move || {
                task();
                let mut count = pending.count.lock().unwrap();
                *count -= 1;
                if *count == 0 {
                    pending.cv.notify_all();
                }
            });
            sender.send(job).map_err(|_| PoolError::Stopped)?;
        }
        Ok(())
    }

    /// Blocks until every outstanding job from every prior `launch` call
    /// has completed.
    pub fn wait_all(&self) {
        let mut count = self.pending.count.lock().unwrap();
        while *count > 0 {
            count = self.pending.cv.wait(count).unwrap();
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
