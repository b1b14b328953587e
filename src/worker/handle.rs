use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tokio::sync::oneshot;
use tracing::warn;

use crate::error::ShuttleDbError;
use crate::protocol::{DbRequest, QueryValue, StartOptions};

use super::channel::Command;
use super::extension::ExtensionRegistry;
use super::runtime::{ErrorHandler, WorkerRuntime};

static WORKER_SEQ: AtomicUsize = AtomicUsize::new(0);

struct Worker {
    sender: Sender<Command>,
    id: usize,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

/// Handle to a dedicated thread that owns one [`WorkerRuntime`].
///
/// The thread opens its connection eagerly at spawn time and then executes
/// one request at a time, in arrival order, to completion. Cloning the
/// handle shares the same worker; dropping the last clone shuts it down.
#[derive(Clone)]
pub struct WorkerHandle {
    inner: Arc<Worker>,
}

impl WorkerHandle {
    /// Spawn a worker thread and run its setup before it takes requests.
    ///
    /// # Errors
    /// Returns `ShuttleDbError::ConnectionError` if the thread cannot be
    /// spawned. Connection-open problems do not fail the spawn; the runtime
    /// degrades instead.
    pub fn spawn(
        options: StartOptions,
        extensions: ExtensionRegistry,
        error_handler: Option<ErrorHandler>,
    ) -> Result<Self, ShuttleDbError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let id = WORKER_SEQ.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("shuttle-worker-{id}"))
            .spawn(move || {
                let mut runtime = WorkerRuntime::new(extensions, error_handler);
                if let Err(err) = runtime.execute(DbRequest::Start { options }) {
                    warn!(worker = id, %err, "worker setup failed");
                }
                run_worker(&mut runtime, &receiver);
            })
            .map_err(|err| {
                ShuttleDbError::ConnectionError(format!("failed to spawn worker thread: {err}"))
            })?;

        Ok(Self {
            inner: Arc::new(Worker { sender, id }),
        })
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Submit one request and await its result.
    ///
    /// # Errors
    /// Returns `ShuttleDbError::ConnectionError` if the worker has shut down,
    /// or whatever error the runtime reports for the request.
    pub async fn query(&self, request: DbRequest) -> Result<QueryValue, ShuttleDbError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .sender
            .send(Command::Query {
                request,
                respond_to: tx,
            })
            .map_err(|_| ShuttleDbError::ConnectionError("worker closed".into()))?;
        rx.await
            .map_err(|_| ShuttleDbError::ConnectionError("worker dropped request".into()))?
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.inner.id)
            .finish()
    }
}

fn run_worker(runtime: &mut WorkerRuntime, receiver: &Receiver<Command>) {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Shutdown => break,
            Command::Query {
                request,
                respond_to,
            } => {
                let _ = respond_to.send(runtime.execute(request));
            }
        }
    }
}
