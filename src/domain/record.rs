use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{GatewayError, Result};

/// Opaque key-value metadata attached to a record.
pub type Metadata = serde_json::Map<String, Value>;
/// Parameters passed to a named server query.
pub type Params = serde_json::Map<String, Value>;
/// One row returned by a named server query.
pub type Row = serde_json::Map<String, Value>;

/// Metadata key that is lifted into a top-level `source_id` param.
pub const SOURCE_ID_KEY: &str = "source_id";

/// Classification of a record, selecting which named server query applies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Document,
    CodeExample,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Document, EntityKind::CodeExample];

    /// Node type name as used by the server-side queries.
    pub fn node_name(&self) -> &'static str {
        match self {
            EntityKind::Document => "Document",
            EntityKind::CodeExample => "CodeExample",
        }
    }

    /// `searchDocument` / `searchCodeExample`
    pub fn search_query(&self) -> String {
        format!("search{}", self.node_name())
    }

    /// `addDocument` / `addCodeExample`
    pub fn add_query(&self) -> String {
        format!("add{}", self.node_name())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_name())
    }
}

impl FromStr for EntityKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Document" | "document" | "documents" => Ok(EntityKind::Document),
            "CodeExample" | "code_example" | "code_examples" | "code" => Ok(EntityKind::CodeExample),
            other => Err(GatewayError::Validation(format!(
                "Unknown entity kind '{}' (expected 'document' or 'code_example')",
                other
            ))),
        }
    }
}

/// A crawled document chunk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub url: String,
    pub chunk_number: i64,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A code example extracted from a crawled page, with its summary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CodeExample {
    pub url: String,
    pub chunk_number: i64,
    pub content: String,
    pub summary: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A single unit of ingestion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Document(Document),
    CodeExample(CodeExample),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Document(_) => EntityKind::Document,
            Record::CodeExample(_) => EntityKind::CodeExample,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Record::Document(d) => &d.url,
            Record::CodeExample(c) => &c.url,
        }
    }

    pub fn chunk_number(&self) -> i64 {
        match self {
            Record::Document(d) => d.chunk_number,
            Record::CodeExample(c) => c.chunk_number,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Record::Document(d) => &d.content,
            Record::CodeExample(c) => &c.content,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Record::Document(d) => &d.metadata,
            Record::CodeExample(c) => &c.metadata,
        }
    }

    /// `metadata["source_id"]` when it is a string, otherwise empty.
    pub fn source_id(&self) -> &str {
        self.metadata()
            .get(SOURCE_ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Checks the record invariants: non-negative chunk number, non-empty url and content.
    pub fn validate(&self) -> Result<()> {
        if self.url().trim().is_empty() {
            return Err(GatewayError::Validation(format!(
                "{} record has an empty url",
                self.kind()
            )));
        }
        if self.chunk_number() < 0 {
            return Err(GatewayError::Validation(format!(
                "{} record for '{}' has negative chunk number {}",
                self.kind(),
                self.url(),
                self.chunk_number()
            )));
        }
        if self.content().trim().is_empty() {
            return Err(GatewayError::Validation(format!(
                "{} record for '{}' (chunk {}) has empty content",
                self.kind(),
                self.url(),
                self.chunk_number()
            )));
        }
        Ok(())
    }

    /// Builds the params for the `add<Kind>` query. Metadata is sent as a
    /// compact JSON string and `source_id` is repeated as a top-level field.
    pub fn to_params(&self) -> Result<Params> {
        let metadata = serde_json::to_string(self.metadata()).map_err(|e| {
            GatewayError::Validation(format!(
                "Failed to encode metadata for '{}': {}",
                self.url(),
                e
            ))
        })?;

        let mut params = Params::new();
        params.insert("url".into(), Value::from(self.url()));
        params.insert("chunk_number".into(), Value::from(self.chunk_number()));
        params.insert("content".into(), Value::from(self.content()));
        if let Record::CodeExample(c) = self {
            params.insert("summary".into(), Value::from(c.summary.as_str()));
        }
        params.insert("metadata".into(), Value::String(metadata));
        params.insert("source_id".into(), Value::from(self.source_id()));
        Ok(params)
    }
}
