//! Async query engine over worker-owned synchronous `SQLite` connections.
//!
//! The driver is synchronous and not safely shareable across threads, so
//! true concurrency comes from independent workers, each owning one
//! connection and executing one request at a time. Callers see only an
//! async facade ([`DbManager`]): every operation is expressed as a plain-data
//! [`protocol::DbRequest`], routed either through an external pool transport
//! (parent side) or straight to the process-local worker runtime.
//!
//! Prepared statements never cross that boundary as native handles; they are
//! addressed by their trimmed SQL text, which each worker maps to its own
//! compiled statement. Multi-statement atomic operations go through named
//! transactions registered on the workers at setup time.

mod convert;

pub mod error;
pub mod manager;
pub mod protocol;
pub mod results;
pub mod statement;
pub mod table;
pub mod transport;
pub mod types;
pub mod worker;

pub mod prelude;

pub use error::ShuttleDbError;
pub use manager::DbManager;
pub use protocol::{DbRequest, QueryValue, StartOptions};
pub use results::{ResultSet, Row, RunResult};
pub use statement::Statement;
pub use types::RowValues;
