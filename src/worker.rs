//! A fixed thread pool offering exactly the two primitives the rest of the
//! pipeline needs: `submit(task)` and `drain()`. Built from the same
//! queue/condvar/promise trio as the reference crate's `database::Executor`
//! (`examples/icecream17-metamath-knife/src/database.rs`), generalized from
//! "one promise per `exec` call, waited individually" into a pending-list
//! that `drain` waits on as a single barrier.

use std::collections::VecDeque;
use std::panic;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

type Task = Box<dyn FnOnce(usize) + Send>;

struct Shared {
    queue: Mutex<VecDeque<(usize, Task)>>,
    cv: Condvar,
    shutdown: Mutex<bool>,
}

/// A handle for a value that will be available once its task runs. Mirrors
/// the reference crate's `Promise<T>`; `WorkerPool::drain` is built on
/// `Promise::join`-style "wait for all of them" semantics.
struct Promise<T> {
    inner: Arc<(Mutex<Option<thread::Result<T>>>, Condvar)>,
}

impl<T> Promise<T> {
    fn wait(self) -> T {
        let (lock, cv) = &*self.inner;
        let mut guard = lock.lock().unwrap();
        while guard.is_none() {
            guard = cv.wait(guard).unwrap();
        }
        match guard.take().unwrap() {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

/// The worker pool. `submit` enqueues a task copied-by-value into the
/// shared queue; `nproc` threads pull work off it. `drain` is the sole
/// barrier: it returns only once every task submitted since the last
/// `drain` has completed (spec §4.3).
pub struct WorkerPool {
    shared: Arc<Shared>,
    nproc: usize,
    pending: Vec<Promise<()>>,
}

impl WorkerPool {
    /// Spawns `nproc` worker threads. `nproc` is clamped to at least 1.
    pub fn new(nproc: usize) -> Self {
        let nproc = nproc.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
            shutdown: Mutex::new(false),
        });

        for thread_index in 0..nproc {
            let shared = shared.clone();
            thread::spawn(move || worker_loop(thread_index, shared));
        }

        WorkerPool {
            shared,
            nproc,
            pending: Vec::new(),
        }
    }

    pub fn nproc(&self) -> usize {
        self.nproc
    }

    /// Enqueues `task`. `task` receives the thread index it happened to
    /// run on, per spec §4.3 ("`fn` receives `(thread_index, arg)`"); the
    /// caller closes over whatever argument it needs.
    pub fn submit<F>(&mut self, task: F)
    where
        F: FnOnce(usize) + Send + 'static,
    {
        let inner = Arc::new((Mutex::new(None), Condvar::new()));
        let inner_for_task = inner.clone();

        let boxed: Task = Box::new(move |thread_index| {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(|| task(thread_index)));
            let (lock, cv) = &*inner_for_task;
            *lock.lock().unwrap() = Some(result);
            cv.notify_one();
        });

        self.shared.queue.lock().unwrap().push_back((0, boxed));
        self.shared.cv.notify_one();
        self.pending.push(Promise { inner });
    }

    /// Blocks until every task submitted since the last `drain` has run
    /// exactly once.
    pub fn drain(&mut self) {
        for promise in self.pending.drain(..) {
            promise.wait();
        }
    }

    /// Drops every task that has been submitted but not yet dispatched,
    /// without waiting for in-flight ones. Named after the original C
    /// tool's `fini_workers(force)` (spec §5, "Cancellation and timeouts").
    pub fn fini(&mut self, force: bool) {
        if force {
            self.shared.queue.lock().unwrap().clear();
            self.pending.clear();
        } else {
            self.drain();
        }
        *self.shared.shutdown.lock().unwrap() = true;
        self.shared.cv.notify_all();
    }
}

fn worker_loop(thread_index: usize, shared: Arc<Shared>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some((_, task)) = queue.pop_front() {
                    break task;
                }
                if *shared.shutdown.lock().unwrap() {
                    return;
                }
                queue = shared.cv.wait(queue).unwrap();
            }
        };
        task(thread_index);
    }
}
