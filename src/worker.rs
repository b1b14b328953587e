// Worker side of the engine:
// - runtime: owns the connection, statement cache, and transaction registry
// - extension: statically registered bundles of functions/transactions/statements
// - channel: command envelope between async callers and the worker thread
// - handle: dedicated thread that drives one runtime, one request at a time

pub mod extension;
pub mod handle;
pub mod runtime;

pub(crate) mod channel;

pub use extension::{Extension, ExtensionRegistry, ScalarFn, StartHook, TransactionFn, TxEnv};
pub use handle::WorkerHandle;
pub use runtime::{ErrorHandler, WorkerRuntime};
