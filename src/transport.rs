use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::ShuttleDbError;
use crate::protocol::{DbRequest, QueryValue, StartOptions};
use crate::worker::{ErrorHandler, ExtensionRegistry, WorkerHandle};

/// The pool collaborator the parent-side facade routes requests through.
///
/// Real deployments back this with a multi-process transport; this crate
/// only defines the seam and ships [`LocalPool`] as an in-process stand-in.
#[async_trait]
pub trait PoolTransport: Send + Sync {
    /// Whether this side of the transport is the parent. The parent proxies;
    /// a non-parent executes directly against its own worker runtime.
    fn is_parent(&self) -> bool;

    /// Bring `count` additional workers online.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` if a worker cannot be started.
    async fn spawn(&self, count: usize) -> Result<(), ShuttleDbError>;

    /// Route one request to some worker and await its result. No ordering is
    /// guaranteed between requests routed to different workers.
    ///
    /// # Errors
    /// Returns `ShuttleDbError` for transport failures or whatever the
    /// worker reports.
    async fn query(&self, request: DbRequest) -> Result<QueryValue, ShuttleDbError>;
}

/// In-process pool of worker threads with round-robin routing.
///
/// Each worker owns its own connection to the same database, so this matches
/// the multi-process model closely enough for tests and single-process
/// deployments.
pub struct LocalPool {
    workers: RwLock<Vec<WorkerHandle>>,
    next: AtomicUsize,
    options: StartOptions,
    extensions: ExtensionRegistry,
    error_handler: Option<ErrorHandler>,
}

impl LocalPool {
    #[must_use]
    pub fn new(options: StartOptions, extensions: ExtensionRegistry) -> Self {
        Self {
            workers: RwLock::new(Vec::new()),
            next: AtomicUsize::new(0),
            options,
            extensions,
            error_handler: None,
        }
    }

    /// Install an error handler passed to every worker spawned afterwards.
    #[must_use]
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Number of workers currently online.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn pick_worker(&self) -> Result<WorkerHandle, ShuttleDbError> {
        let workers = self
            .workers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if workers.is_empty() {
            return Err(ShuttleDbError::TransportError(
                "no workers spawned".into(),
            ));
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % workers.len();
        Ok(workers[idx].clone())
    }
}

#[async_trait]
impl PoolTransport for LocalPool {
    fn is_parent(&self) -> bool {
        true
    }

    async fn spawn(&self, count: usize) -> Result<(), ShuttleDbError> {
        let mut spawned = Vec::with_capacity(count);
        for _ in 0..count {
            spawned.push(WorkerHandle::spawn(
                self.options.clone(),
                self.extensions.clone(),
                self.error_handler.clone(),
            )?);
        }
        self.workers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend(spawned);
        Ok(())
    }

    async fn query(&self, request: DbRequest) -> Result<QueryValue, ShuttleDbError> {
        let worker = self.pick_worker()?;
        worker.query(request).await
    }
}

impl std::fmt::Debug for LocalPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPool")
            .field("workers", &self.worker_count())
            .finish()
    }
}
