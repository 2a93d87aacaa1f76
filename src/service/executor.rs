//! Execution of deposit tasks

use super::error::{ProcessingError, ProcessingResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use tracing::{error, warn};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs deposit tasks, possibly concurrently
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, job: Job) -> ProcessingResult<()>;

    /// Block until every job handed to this executor has finished
    fn wait_idle(&self);
}

/// Run one job, containing a panic to that job
fn run_isolated(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        error!("Deposit task panicked: {}", panic_message(payload.as_ref()));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Runs each job on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn execute(&self, job: Job) -> ProcessingResult<()> {
        run_isolated(job);
        Ok(())
    }

    fn wait_idle(&self) {}
}

/// A bounded pool of deposit workers
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    pending: Arc<Pending>,
}

struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn adjust(&self, increment: bool) {
        let mut count = match self.count.lock() {
            Ok(count) => count,
            Err(poisoned) => poisoned.into_inner(),
        };
        if increment {
            *count += 1;
        } else {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.idle.notify_all();
            }
        }
    }
}

/// Decrements the pending count when a job ends
struct Completion(Arc<Pending>);

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.adjust(false);
    }
}

impl WorkerPool {
    /// `size` of 0 uses the available parallelism
    pub fn new(size: usize) -> ProcessingResult<Self> {
        let size = if size == 0 { available_parallelism() } else { size };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("deposit-worker-{i}"))
            .panic_handler(|payload| {
                error!("Deposit worker panicked: {}", panic_message(payload.as_ref()));
            })
            .build()
            .map_err(|e| ProcessingError::Executor(e.to_string()))?;

        Ok(Self {
            pool,
            pending: Arc::new(Pending {
                count: Mutex::new(0),
                idle: Condvar::new(),
            }),
        })
    }

    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl TaskExecutor for WorkerPool {
    fn execute(&self, job: Job) -> ProcessingResult<()> {
        self.pending.adjust(true);
        let completion = Completion(Arc::clone(&self.pending));
        self.pool.spawn(move || {
            let _completion = completion;
            run_isolated(job);
        });
        Ok(())
    }

    fn wait_idle(&self) {
        let mut count = match self.pending.count.lock() {
            Ok(count) => count,
            Err(poisoned) => poisoned.into_inner(),
        };
        while *count > 0 {
            count = match self.pending.idle.wait(count) {
                Ok(count) => count,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or_else(|e| {
            warn!(
                "Unable to detect available parallelism ({}); using a single deposit worker",
                e
            );
            1
        })
}
