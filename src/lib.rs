pub mod application;
pub mod config;
/// Declare modules and make them public
pub mod domain;
pub mod error;
pub mod infrastructure;

/// Re-export necessary items for main.rs and tests
pub use application::batch_writer::{BatchReport, BatchWriter, KindReport, RecordFailure};
pub use application::ingestion::{
    CodeExampleColumns, DocumentColumns, IngestionOrchestrator, IngestionSummary,
};
pub use application::search_gateway::SimilaritySearchGateway;
pub use config::{load_config, GatewayConfig};
pub use domain::client::QueryClient;
pub use domain::record::{EntityKind, Metadata, Params, Record, Row};
pub use domain::search::{QueryRequest, QueryResult, SearchStrategy};
pub use error::{GatewayError, Result};
pub use infrastructure::{HelixClient, WorkerPool};
pub use tokio_util::sync::CancellationToken;
