//! Worker pool for native calls
//!
//! Native calls are long-running and CPU-bound. They run here, never on the
//! host thread. Submission does not block; once the executor shuts down,
//! queued jobs that have not started are dropped instead of run.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::engine::panic_message;
use crate::error::AttachError;

/// Sizing policy of the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "camelCase")]
pub enum WorkerPolicy {
    /// Fixed pool; `None` uses the available hardware parallelism
    Bounded {
        /// Number of worker threads
        #[serde(default)]
        threads: Option<usize>,
    },
    /// A dedicated thread per request
    Elastic,
}

impl Default for WorkerPolicy {
    fn default() -> Self {
        Self::Bounded { threads: None }
    }
}

enum Backend {
    Pool(ThreadPool),
    Elastic { spawned: AtomicUsize },
}

/// Process-wide executor owned by an attached bridge
pub struct Executor {
    backend: Backend,
    closed: Arc<AtomicBool>,
    submitted: AtomicU64,
}

impl Executor {
    /// Create the pool for `policy`
    pub fn new(policy: WorkerPolicy) -> Result<Self, AttachError> {
        let backend = match policy {
            WorkerPolicy::Bounded { threads } => {
                let threads = threads.filter(|n| *n > 0).unwrap_or_else(|| {
                    thread::available_parallelism().map_or(1, NonZeroUsize::get)
                });
                let pool = ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("groth16-worker-{i}"))
                    .panic_handler(|payload| {
                        error!("Worker job panicked: {}", panic_message(payload.as_ref()));
                    })
                    .build()?;
                info!("Worker pool started with {} threads", threads);
                Backend::Pool(pool)
            }
            WorkerPolicy::Elastic => {
                info!("Worker pool started in elastic mode");
                Backend::Elastic {
                    spawned: AtomicUsize::new(0),
                }
            }
        };

        Ok(Self {
            backend,
            closed: Arc::new(AtomicBool::new(false)),
            submitted: AtomicU64::new(0),
        })
    }

    /// Queue `job` without blocking the caller.
    ///
    /// A job that never runs (executor shut down first, or its thread could
    /// not be spawned) is dropped, so owned state inside it must report its
    /// own abandonment on drop.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            warn!("Job submitted after shutdown, dropping it");
            return;
        }
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let closed = Arc::clone(&self.closed);
        let job = move || {
            if closed.load(Ordering::Acquire) {
                debug!("Executor closed before job started, abandoning it");
                return;
            }
            job();
        };

        match &self.backend {
            Backend::Pool(pool) => pool.spawn(job),
            Backend::Elastic { spawned } => {
                let id = spawned.fetch_add(1, Ordering::Relaxed);
                let spawn = thread::Builder::new()
                    .name(format!("groth16-elastic-{id}"))
                    .spawn(job);
                if let Err(e) = spawn {
                    error!("Failed to spawn worker thread: {}", e);
                }
            }
        }
    }

    /// Number of jobs accepted since the executor started
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Whether shutdown has begun
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting and starting jobs. Running jobs finish normally.
    ///
    /// Returns `false` if the executor was already shut down.
    pub fn shutdown(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            info!("Worker pool shut down after {} submissions", self.submitted());
        }
        first
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
