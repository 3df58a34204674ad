use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use log::{debug, warn};

// GraphExecutionQueue — Worker pool draining a shared FIFO
//
// A fixed set of worker threads consumes a single mutex-guarded queue,
// signaled by one condition variable. Execution of a dequeued graph is
// synchronous within its worker; the only cancellation signal is a
// null-graph sentinel, of which shutdown submits exactly one per worker.
//
// Idle tracking: each worker owns one status atomic, and queue-empty plus
// nobody-running is evaluated as a single predicate under the queue lock.
// Status writes happen under that same lock, so a wait_idle waiter that
// rechecks after every wake can never observe a stale combination.

/// A compiled graph the queue can run. `run` returns 0 on success; any
/// other value is the hardware runtime's failure status.
pub trait ExecutableGraph: Send + Sync {
    fn run(&self) -> i32;
}

/// Invoked on the worker thread after the graph finishes, with its status.
pub type CompletionCallback = Box<dyn FnOnce(i32) + Send>;

struct QueueItem {
    sequence_id: u64,
    /// None is the shutdown sentinel.
    graph: Option<Arc<dyn ExecutableGraph>>,
    on_complete: Option<CompletionCallback>,
}

const STATUS_IDLE: u8 = 0;
const STATUS_RUNNING: u8 = 1;
const STATUS_CANCEL: u8 = 2;

struct Coordinator {
    queue: Mutex<VecDeque<QueueItem>>,
    work_cv: Condvar,
    idle_cv: Condvar,
    statuses: Vec<AtomicU8>,
}

impl Coordinator {
    /// A worker that consumed its sentinel (CANCEL) counts as idle; only
    /// RUNNING blocks idleness.
    fn any_running(&self) -> bool {
        self.statuses
            .iter()
            .any(|s| s.load(Ordering::SeqCst) == STATUS_RUNNING)
    }
}

/// The execution queue: a fixed-size worker pool over one FIFO.
pub struct GraphExecutionQueue {
    coord: Arc<Coordinator>,
    workers: Vec<JoinHandle<()>>,
    next_seq: AtomicU64,
}

impl GraphExecutionQueue {
    /// Spawn `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let coord = Arc::new(Coordinator {
            queue: Mutex::new(VecDeque::new()),
            work_cv: Condvar::new(),
            idle_cv: Condvar::new(),
            statuses: (0..workers).map(|_| AtomicU8::new(STATUS_IDLE)).collect(),
        });
        let handles = (0..workers)
            .map(|idx| {
                let coord = Arc::clone(&coord);
                std::thread::Builder::new()
                    .name(format!("stoat-exec-{}", idx))
                    .spawn(move || worker_loop(coord, idx))
                    .expect("failed to spawn queue worker")
            })
            .collect();
        GraphExecutionQueue {
            coord,
            workers: handles,
            next_seq: AtomicU64::new(1),
        }
    }

    fn push(&self, item: QueueItem) {
        let mut q = self.coord.queue.lock().unwrap();
        q.push_back(item);
        drop(q);
        self.coord.work_cv.notify_one();
    }

    /// Append a graph to the queue. Returns the sequence id usable with
    /// `remove`. The graph stays owned by the submitter; the queue only
    /// observes it for the duration of execution.
    pub fn submit(
        &self,
        graph: Arc<dyn ExecutableGraph>,
        on_complete: Option<CompletionCallback>,
    ) -> u64 {
        let sequence_id = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.push(QueueItem {
            sequence_id,
            graph: Some(graph),
            on_complete,
        });
        sequence_id
    }

    /// Erase a still-queued graph. Returns false when the item was
    /// already dequeued (or never existed): losing that race is not an
    /// error, and an in-flight graph runs to completion regardless.
    pub fn remove(&self, sequence_id: u64) -> bool {
        let mut q = self.coord.queue.lock().unwrap();
        if let Some(pos) = q.iter().position(|i| i.sequence_id == sequence_id) {
            q.remove(pos);
            true
        } else {
            false
        }
    }

    /// Block until the queue is empty and every worker is idle. Both
    /// conditions are one predicate evaluated under the queue lock and
    /// rechecked after every wake; spurious wakeups and freshly submitted
    /// work both loop back into the wait.
    pub fn wait_idle(&self) {
        let mut q = self.coord.queue.lock().unwrap();
        while !(q.is_empty() && !self.coord.any_running()) {
            q = self.coord.idle_cv.wait(q).unwrap();
        }
    }

    /// Submit one sentinel per worker and join all threads. Queued work
    /// ahead of the sentinels still executes.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        for _ in 0..self.workers.len() {
            self.push(QueueItem {
                sequence_id: 0,
                graph: None,
                on_complete: None,
            });
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for GraphExecutionQueue {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

fn worker_loop(coord: Arc<Coordinator>, idx: usize) {
    loop {
        let item = {
            let mut q = coord.queue.lock().unwrap();
            loop {
                if let Some(item) = q.pop_front() {
                    // Status flips under the queue lock so wait_idle can
                    // never see an empty queue with this pop in flight.
                    coord.statuses[idx].store(STATUS_RUNNING, Ordering::SeqCst);
                    break item;
                }
                coord.statuses[idx].store(STATUS_IDLE, Ordering::SeqCst);
                if !coord.any_running() {
                    coord.idle_cv.notify_all();
                }
                q = coord.work_cv.wait(q).unwrap();
            }
        };

        let Some(graph) = item.graph else {
            // Sentinel: this worker is done. CANCEL counts as idle for
            // wait_idle, and the notify below covers a waiter that saw
            // this worker RUNNING a moment ago.
            let q = coord.queue.lock().unwrap();
            coord.statuses[idx].store(STATUS_CANCEL, Ordering::SeqCst);
            if q.is_empty() && !coord.any_running() {
                coord.idle_cv.notify_all();
            }
            drop(q);
            debug!("worker {} exiting on sentinel", idx);
            return;
        };

        let status = graph.run();
        if status != 0 {
            // Kernel-level failures are reported and the worker moves on;
            // nothing is retried and the pool never dies with the graph.
            warn!(
                "graph {} failed with status {} on worker {}",
                item.sequence_id, status, idx
            );
        }
        if let Some(cb) = item.on_complete {
            cb(status);
        }
    }
}
