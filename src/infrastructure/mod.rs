pub mod file_system;
pub mod helix_client;
pub mod worker_pool;

// Re-export key types for easier access from application layer
pub use helix_client::HelixClient;
pub use worker_pool::WorkerPool;
