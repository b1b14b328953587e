use tokio::sync::oneshot;

use crate::error::ShuttleDbError;
use crate::protocol::{DbRequest, QueryValue};

pub(crate) enum Command {
    Query {
        request: DbRequest,
        respond_to: oneshot::Sender<Result<QueryValue, ShuttleDbError>>,
    },
    Shutdown,
}
