use async_trait::async_trait;
use serde_json::Value;

use crate::domain::record::{EntityKind, Params};
use crate::domain::search::{QueryRequest, QueryResult, SearchStrategy};
use crate::error::Result;
use crate::infrastructure::worker_pool::WorkerPool;

/// Similarity search over HelixDB's `search<Kind>` queries.
///
/// Fail-open: a failed search is logged and comes back as an empty result.
pub struct SimilaritySearchGateway {
    pool: WorkerPool,
}

impl SimilaritySearchGateway {
    pub fn new(pool: WorkerPool) -> Self {
        Self { pool }
    }

    /// Builds the request and searches. An invalid request (zero limit) is
    /// logged and treated like any other failed search.
    pub async fn vector_search(&self, query: &str, match_count: usize, kind: EntityKind) -> QueryResult {
        match QueryRequest::new(query, match_count, kind) {
            Ok(request) => self.search(&request).await,
            Err(e) => {
                log::error!("HelixDB vector search failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_search(&self, request: &QueryRequest) -> Result<QueryResult> {
        let mut params = Params::new();
        params.insert("query".to_string(), Value::from(request.query_text()));
        params.insert("k".to_string(), Value::from(request.result_limit()));

        self.pool.execute(request.entity_kind().search_query(), params).await
    }
}

#[async_trait]
impl SearchStrategy for SimilaritySearchGateway {
    async fn search(&self, request: &QueryRequest) -> QueryResult {
        log::debug!(
            "helixdb_vector_search table={} match_count={}",
            request.entity_kind(),
            request.result_limit()
        );
        match self.try_search(request).await {
            Ok(rows) => {
                log::info!(
                    "HelixDB {} search returned {} results",
                    request.entity_kind(),
                    rows.len()
                );
                rows
            }
            Err(e) => {
                log::error!("HelixDB vector search failed: {}", e);
                Vec::new()
            }
        }
    }
}
