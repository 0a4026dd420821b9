//! Fixed-size worker pool for running stream tasks.
//!
//! Stream tasks do blocking work (they wait on stream input), so they run on
//! dedicated threads rather than on the session's I/O thread. The pool is
//! shared across sessions: one pool per process, sized once at startup.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    available: Condvar,
    shutdown: AtomicBool,
}

/// A fixed pool of worker threads consuming a shared job queue.
///
/// Jobs submitted past the pool's capacity queue up and run as workers free
/// up. Dropping the executor drains the queue: already-submitted jobs still
/// run, then the workers exit and are joined.
pub struct Executor {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Executor {
    /// Spawn a pool of `threads` workers. `threads` must be nonzero.
    pub fn new(threads: usize) -> Self {
        assert!(threads > 0, "executor needs at least one worker");
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let workers = (0..threads)
            .map(|n| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("spindle-worker-{n}"))
                    .spawn(move || worker_loop(&shared))
                    .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"))
            })
            .collect();
        Self { shared, workers }
    }

    /// Submit a job. Runs as soon as a worker is free.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = lock(&self.shared.queue);
        queue.push_back(Box::new(job));
        drop(queue);
        self.shared.available.notify_one();
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        lock(&self.shared.queue).len()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.available.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let mut queue = lock(&shared.queue);
        let job = loop {
            if let Some(job) = queue.pop_front() {
                break job;
            }
            if shared.shutdown.load(Ordering::Acquire) {
                return;
            }
            queue = shared
                .available
                .wait(queue)
                .unwrap_or_else(|e| e.into_inner());
        };
        drop(queue);
        job();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
