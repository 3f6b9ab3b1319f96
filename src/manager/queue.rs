//! Single-worker FIFO queue for session creation jobs

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{FleetError, Result};
use crate::types::JobId;

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

struct QueuedJob {
    id: JobId,
    label: String,
    run: JobFuture,
}

struct QueueInner {
    jobs: Mutex<VecDeque<QueuedJob>>,
    is_processing: AtomicBool,
    delay: Duration,
}

/// FIFO queue drained by exactly one worker at a time
///
/// Jobs run one after another in submission order. A failing or panicking
/// job is logged and the queue moves on. Between two jobs the worker waits
/// the configured delay, unless nothing else is queued.
#[derive(Clone)]
pub struct SessionCreationQueue {
    inner: Arc<QueueInner>,
}

impl SessionCreationQueue {
    /// Create a queue that pauses `delay` between consecutive jobs
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                jobs: Mutex::new(VecDeque::new()),
                is_processing: AtomicBool::new(false),
                delay,
            }),
        }
    }

    /// Append a job and make sure a worker is draining the queue
    pub fn enqueue<T, Fut>(&self, label: impl Into<String>, job: Fut) -> QueuedJobHandle<T>
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let id = JobId::new();
        let label = label.into();
        let (tx, rx) = oneshot::channel();

        let job_label = label.clone();
        let run: JobFuture = Box::pin(async move {
            let result = job.await;
            match &result {
                Ok(_) => log::info!("Creation job {job_label} ({id}) completed"),
                Err(e) => log::error!("Creation job {job_label} ({id}) failed: {e}"),
            }
            let _ = tx.send(result);
        });

        {
            let mut jobs = self.inner.jobs.lock();
            jobs.push_back(QueuedJob { id, label, run });
            log::debug!("Queued creation job {id}, {} pending", jobs.len());
        }

        self.ensure_worker();
        QueuedJobHandle { id, rx }
    }

    /// Jobs waiting to run
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.jobs.lock().len()
    }

    /// Whether a worker is currently draining
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.inner.is_processing.load(Ordering::SeqCst)
    }

    fn ensure_worker(&self) {
        if self.inner.is_processing.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(drain(inner));
    }
}

async fn drain(inner: Arc<QueueInner>) {
    loop {
        let next = inner.jobs.lock().pop_front();

        let Some(job) = next else {
            inner.is_processing.store(false, Ordering::SeqCst);
            // A job pushed between the pop and the store must not be stranded.
            if inner.jobs.lock().is_empty() || inner.is_processing.swap(true, Ordering::SeqCst) {
                return;
            }
            continue;
        };

        let QueuedJob { id, label, run } = job;
        if AssertUnwindSafe(run).catch_unwind().await.is_err() {
            log::error!("Creation job {label} ({id}) panicked");
        }

        if !inner.jobs.lock().is_empty() && !inner.delay.is_zero() {
            tokio::time::sleep(inner.delay).await;
        }
    }
}

/// Completion handle of a queued job
#[derive(Debug)]
pub struct QueuedJobHandle<T> {
    id: JobId,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> QueuedJobHandle<T> {
    /// Identifier of the job
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Wait for the job to finish and return its own result
    ///
    /// # Errors
    /// Returns the job's error, or `QueueClosed` if the job was dropped or
    /// panicked before reporting
    pub async fn wait(self) -> Result<T> {
        let id = self.id;
        self.rx
            .await
            .map_err(|_| FleetError::queue_closed(format!("job {id} dropped")))?
    }
}
