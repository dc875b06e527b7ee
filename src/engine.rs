//! Batch execution: runs the assembler over many work items on a worker pool.
//!
//! Each item runs as an independent job that owns its buffers and writes its own
//! output path. Jobs report back over a channel; the coordinating thread records
//! outcomes and drives the progress callback. A panic inside one job becomes a
//! failed item. If the pool itself fails, every item that has no outcome yet is
//! run sequentially on the calling thread.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;

use log::{error, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::assembler::Assembler;
use crate::error::{Error, Result};
use crate::types::{BatchReport, ItemOutcome, ItemProgress, ItemReport, ProgressCallback, WorkItem};

/// Unit of work handed to a pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run jobs concurrently.
///
/// An `Err` from [`WorkerPool::submit`] is a pool-level fault: the job was not
/// accepted and the engine stops dispatching to this pool.
pub trait WorkerPool {
    fn submit(&self, job: Job) -> Result<()>;
}

/// Default worker count: half the logical CPUs, at least one.
pub fn default_worker_count() -> usize {
    (num_cpus::get() / 2).max(1)
}

/// Production pool backed by a dedicated rayon thread pool.
pub struct RayonPool {
    pool: ThreadPool,
}

impl RayonPool {
    pub fn new(workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|index| format!("tojiru-worker-{}", index))
            .panic_handler(|_| error!("A worker thread panicked outside of a job"))
            .build()
            .map_err(|e| Error::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl WorkerPool for RayonPool {
    fn submit(&self, job: Job) -> Result<()> {
        self.pool.spawn(job);
        Ok(())
    }
}

/// Per-item task run by the engine. The assembler in production, stubs in tests.
pub type ItemTask = Arc<dyn Fn(&WorkItem) -> Result<usize> + Send + Sync + 'static>;

/// Coordinates one batch run.
pub struct Engine {
    task: ItemTask,
    workers: usize,
    progress: Option<ProgressCallback>,
}

impl Engine {
    /// Creates an engine that assembles every item with `assembler`.
    pub fn new(assembler: Assembler) -> Self {
        Self::with_task(Arc::new(move |item: &WorkItem| assembler.assemble(item)))
    }

    /// Creates an engine around an arbitrary per-item task.
    pub fn with_task(task: ItemTask) -> Self {
        Self {
            task,
            workers: default_worker_count(),
            progress: None,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn progress(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Runs every item on a fresh [`RayonPool`].
    ///
    /// If the pool cannot be built, the whole batch runs sequentially.
    pub fn run(&self, items: Vec<WorkItem>) -> BatchReport {
        if items.is_empty() {
            info!("Nothing to do");
            return BatchReport::default();
        }
        match RayonPool::new(self.workers.min(items.len())) {
            Ok(pool) => {
                info!(
                    "Converting {} collection(s) on {} worker(s)",
                    items.len(),
                    pool.workers()
                );
                self.run_on(&pool, items)
            }
            Err(e) => {
                warn!("{}; converting sequentially", e);
                let mut run = BatchRun::new(items, self.progress.clone());
                run.finish_sequentially(&self.task);
                run.report
            }
        }
    }

    /// Runs every item on `pool`, falling back to sequential execution on a pool fault.
    ///
    /// Every item is attempted exactly once.
    pub fn run_on(&self, pool: &dyn WorkerPool, items: Vec<WorkItem>) -> BatchReport {
        if items.is_empty() {
            info!("Nothing to do");
            return BatchReport::default();
        }

        let mut run = BatchRun::new(items, self.progress.clone());
        let (tx, rx) = mpsc::channel::<(usize, ItemOutcome)>();

        for (index, item) in run.items.iter().enumerate() {
            let tx = tx.clone();
            let task = Arc::clone(&self.task);
            let item = item.clone();
            let job: Job = Box::new(move || {
                let outcome = run_contained(&task, &item);
                // The coordinator may have given up on the pool already.
                let _ = tx.send((index, outcome));
            });
            if let Err(e) = pool.submit(job) {
                warn!(
                    "Worker pool failed after {} of {} submissions: {}",
                    index,
                    run.items.len(),
                    e
                );
                break;
            }
        }
        // Jobs hold the remaining senders; the channel closes once all of them
        // have reported or were dropped by the pool.
        drop(tx);

        for (index, outcome) in rx {
            run.record(index, outcome);
        }

        run.finish_sequentially(&self.task);
        run.report
    }
}

/// Runs the task for one item, turning a panic into a failed outcome.
fn run_contained(task: &ItemTask, item: &WorkItem) -> ItemOutcome {
    match catch_unwind(AssertUnwindSafe(|| task(item))) {
        Ok(result) => ItemOutcome::from(result),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            ItemOutcome::Failed(format!("worker panicked: {}", reason))
        }
    }
}

/// Bookkeeping for one batch.
struct BatchRun {
    items: Vec<WorkItem>,
    outcomes: Vec<Option<ItemOutcome>>,
    completed: usize,
    progress: Option<ProgressCallback>,
    report: BatchReport,
}

impl BatchRun {
    fn new(items: Vec<WorkItem>, progress: Option<ProgressCallback>) -> Self {
        let total = items.len();
        Self {
            outcomes: vec![None; total],
            items,
            completed: 0,
            progress,
            report: BatchReport {
                total,
                ..BatchReport::default()
            },
        }
    }

    fn record(&mut self, index: usize, outcome: ItemOutcome) {
        let Some(slot) = self.outcomes.get_mut(index) else {
            return;
        };
        if slot.is_some() {
            return;
        }

        let item = &self.items[index];
        match &outcome {
            ItemOutcome::Failed(reason) => error!("'{}' failed: {}", item.display_name, reason),
            other => info!("'{}': {}", item.display_name, other),
        }

        self.completed += 1;
        if outcome.is_success() {
            self.report.succeeded += 1;
        }
        if let Some(callback) = &self.progress {
            callback(&ItemProgress {
                display_name: item.display_name.clone(),
                success: outcome.is_success(),
                completed: self.completed,
                total: self.items.len(),
            });
        }
        *slot = Some(outcome);

        if self.completed == self.items.len() {
            self.finalize();
        }
    }

    /// Runs every item without an outcome on the calling thread.
    fn finish_sequentially(&mut self, task: &ItemTask) {
        let pending: Vec<usize> = (0..self.items.len())
            .filter(|&index| self.outcomes[index].is_none())
            .collect();
        if !pending.is_empty() {
            warn!(
                "Converting {} remaining collection(s) sequentially",
                pending.len()
            );
            self.report.fell_back = true;
            for index in pending {
                let outcome = run_contained(task, &self.items[index]);
                self.record(index, outcome);
            }
        }
        self.finalize();
    }

    fn finalize(&mut self) {
        if self.report.items.len() == self.items.len() {
            return;
        }
        self.report.items = self
            .items
            .iter()
            .zip(&self.outcomes)
            .map(|(item, outcome)| ItemReport {
                display_name: item.display_name.clone(),
                output_path: item.output_path.clone(),
                outcome: outcome
                    .clone()
                    .unwrap_or_else(|| ItemOutcome::Failed("never attempted".to_string())),
            })
            .collect();
    }
}
