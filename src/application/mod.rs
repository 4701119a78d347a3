pub mod batch_writer;
pub mod ingestion;
pub mod search_gateway;
