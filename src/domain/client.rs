use super::record::{Params, Row};
use crate::error::Result;

/// Handle on the backing store: run a named server-side query.
///
/// Calls are synchronous and may block on network I/O, so async callers go
/// through [`crate::infrastructure::worker_pool::WorkerPool`]. Implementations
/// must be safe to share between threads; the gateway treats them as a
/// stateless RPC stub and never retries.
#[mockall::automock]
pub trait QueryClient: Send + Sync {
    /// Executes `query_name` with `params`.
    ///
    /// Fails with [`crate::GatewayError::Connection`] when the endpoint is
    /// unreachable and [`crate::GatewayError::Query`] when the server rejects
    /// the query or its params.
    fn execute(&self, query_name: &str, params: &Params) -> Result<Vec<Row>>;
}
