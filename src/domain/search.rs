use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::record::{EntityKind, Row};
use crate::error::{GatewayError, Result};

// Represents a similarity query against one node type.
// Only constructible through `new` (or deserialization, which goes through it),
// so `result_limit` is always positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQueryRequest")]
pub struct QueryRequest {
    query_text: String,
    result_limit: usize,
    entity_kind: EntityKind,
}

#[derive(Deserialize)]
struct RawQueryRequest {
    query_text: String,
    result_limit: usize,
    entity_kind: EntityKind,
}

impl TryFrom<RawQueryRequest> for QueryRequest {
    type Error = GatewayError;

    fn try_from(raw: RawQueryRequest) -> Result<Self> {
        QueryRequest::new(raw.query_text, raw.result_limit, raw.entity_kind)
    }
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>, result_limit: usize, entity_kind: EntityKind) -> Result<Self> {
        if result_limit == 0 {
            return Err(GatewayError::Validation(
                "Result limit must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            query_text: query_text.into(),
            result_limit,
            entity_kind,
        })
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn result_limit(&self) -> usize {
        self.result_limit
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.entity_kind
    }
}

/// Rows in server ranking order. Never re-sorted locally.
pub type QueryResult = Vec<Row>;

#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Runs a similarity search. Failures are logged and reported as an
    /// empty result, so callers cannot tell "no match" from "search failed".
    async fn search(&self, request: &QueryRequest) -> QueryResult;
}
