//! Upload processing: rate-limit aware embedding and storage

pub mod ingest;
pub mod retry;

pub use ingest::Ingestor;
pub use retry::RetryPolicy;
