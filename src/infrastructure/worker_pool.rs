use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::domain::client::QueryClient;
use crate::domain::record::{Params, Row};
use crate::error::{GatewayError, Result};

/// Runs blocking [`QueryClient`] calls off the async executor, with at most
/// `workers` calls in flight at once.
///
/// Cloning is cheap and clones share the same slots.
#[derive(Clone)]
pub struct WorkerPool {
    client: Arc<dyn QueryClient>,
    slots: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(client: Arc<dyn QueryClient>, workers: usize) -> Self {
        Self {
            client,
            slots: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Executes the query on a blocking worker once a slot is free.
    ///
    /// The slot is held by the worker itself, so a caller that stops waiting
    /// does not free it before the call actually returns.
    pub async fn execute(&self, query_name: String, params: Params) -> Result<Vec<Row>> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| GatewayError::Worker(format!("Worker pool closed: {}", e)))?;

        let client = self.client.clone();
        let name = query_name.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            client.execute(&name, &params)
        })
        .await
        .map_err(|e| {
            log::error!("Blocking call for '{}' did not complete: {}", query_name, e);
            GatewayError::Worker(format!("Blocking call for '{}' did not complete: {}", query_name, e))
        })?
    }
}
