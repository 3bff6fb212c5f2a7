use crate::error::Error;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

/// The shared work callback a [`WorkerPool`] hands to its threads. It must
/// tolerate concurrent invocation from every thread in the pool.
pub trait Runnable: Send + Sync {
    fn run(&self);
}

impl<F> Runnable for F
where
    F: Fn() + Send + Sync,
{
    fn run(&self) {
        self()
    }
}

/// A fixed set of OS threads, each invoking one shared callback exactly
/// once. Parallelism comes from the `count` concurrent invocations, not from
/// any queueing or work distribution.
///
/// Dropping the pool blocks until every thread has returned; no thread is
/// ever detached or left running past pool destruction.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` threads over `runnable`. Failure to spawn any thread
    /// is fatal to construction; threads spawned before the failure are
    /// joined before the error is returned.
    pub fn new<R>(runnable: Arc<R>, count: usize) -> Result<WorkerPool, Error>
    where
        R: Runnable + 'static,
    {
        let mut pool = WorkerPool {
            workers: Vec::with_capacity(count),
        };

        for index in 0..count {
            let runnable = runnable.clone();
            let worker = thread::Builder::new()
                .name(format!("worker-{}", index))
                .spawn(move || runnable.run())
                .map_err(Error::Spawn)?;
            pool.workers.push(worker);
        }

        debug!(count, "worker pool spawned");
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for worker in self.workers.drain(..) {
            // A worker that panicked has still exited; teardown only has to
            // guarantee no thread outlives the pool.
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{Condvar, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn invokes_the_callback_once_per_thread() {
        let hits = Arc::new(AtomicUsize::new(0));

        {
            let hits = hits.clone();
            let pool = WorkerPool::new(
                Arc::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
                4,
            )
            .unwrap();
            assert_eq!(pool.len(), 4);
        }

        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn empty_pool_is_legal() {
        let pool = WorkerPool::new(Arc::new(|| {}), 0).unwrap();
        assert!(pool.is_empty());
    }

    struct Gate {
        released: Mutex<bool>,
        release: Condvar,
        finished: AtomicUsize,
    }

    #[test]
    fn teardown_blocks_until_workers_finish() {
        let gate = Arc::new(Gate {
            released: Mutex::new(false),
            release: Condvar::new(),
            finished: AtomicUsize::new(0),
        });

        let work = {
            let gate = gate.clone();
            move || {
                let mut released = gate.released.lock();
                while !*released {
                    gate.release.wait(&mut released);
                }
                drop(released);
                gate.finished.fetch_add(1, Ordering::SeqCst);
            }
        };
        let pool = WorkerPool::new(Arc::new(work), 3).unwrap();

        // Release the workers only after teardown has started blocking.
        let releaser = {
            let gate = gate.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                *gate.released.lock() = true;
                gate.release.notify_all();
            })
        };

        drop(pool);
        assert_eq!(gate.finished.load(Ordering::SeqCst), 3);

        releaser.join().unwrap();
    }
}
