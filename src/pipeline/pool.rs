// src/pipeline/pool.rs

//! Shared fetch worker pool.
//!
//! A fixed number of Tokio tasks pull jobs from one flume queue. Each
//! worker owns its own fetch [`Session`], so connection pools are never
//! shared between workers.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::transport::{Session, SessionFactory};

type Job = Box<dyn FnOnce(Arc<dyn Session>) -> BoxFuture<'static, ()> + Send>;

/// Result slot for one submitted job.
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Wait for the job. `None` means it was cancelled before it ran
    /// or its worker went away.
    pub async fn join(self) -> Option<T> {
        self.receiver.await.ok()
    }
}

/// Bounded set of workers shared by every search and detail fetch.
pub struct WorkerPool {
    sender: Mutex<Option<flume::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers on the current Tokio runtime.
    pub fn new(size: usize, sessions: &dyn SessionFactory) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::config(format!("worker pool needs a Tokio runtime: {e}")))?;

        let size = size.max(1);
        let (sender, receiver) = flume::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            let session = sessions.fetch_session()?;
            let receiver = receiver.clone();
            workers.push(runtime.spawn(async move {
                while let Ok(job) = receiver.recv_async().await {
                    job(Arc::clone(&session)).await;
                }
                log::debug!("Fetch worker {} stopped", id);
            }));
        }

        log::debug!("Started {} fetch workers", size);
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Queue a job.
    ///
    /// The job is skipped if `token` is cancelled before a worker picks it
    /// up; once running, the job receives the token to observe itself.
    pub fn submit<T, F, Fut>(&self, token: CancellationToken, task: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn Session>, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let sender = self.sender.lock().clone().ok_or(AppError::PoolClosed)?;
        let (tx, rx) = oneshot::channel();

        let job: Job = Box::new(move |session| {
            Box::pin(async move {
                if token.is_cancelled() {
                    return;
                }
                let output = task(session, token).await;
                let _ = tx.send(output);
            })
        });

        sender.send(job).map_err(|_| AppError::PoolClosed)?;
        Ok(TaskHandle { receiver: rx })
    }

    /// Stop accepting jobs, run everything already queued, then release
    /// every worker's session.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());

        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }
        log::info!("Draining {} fetch workers", workers.len());
        for worker in workers {
            if let Err(e) = worker.await {
                log::error!("Fetch worker failed: {}", e);
            }
        }
    }
}
