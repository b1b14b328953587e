//! Convenient imports for common functionality.

pub use crate::error::ShuttleDbError;
pub use crate::manager::DbManager;
pub use crate::protocol::{DbRequest, QueryValue, StartOptions};
pub use crate::results::{ResultSet, Row, RunResult};
pub use crate::statement::Statement;
pub use crate::table::{Filter, Table, TableModel, TableRegistry, TableSpec};
pub use crate::transport::{LocalPool, PoolTransport};
pub use crate::types::RowValues;
pub use crate::worker::{
    Extension, ExtensionRegistry, TxEnv, WorkerHandle, WorkerRuntime,
};
