//! Business logic behind the handlers.

pub mod ingest;
pub mod quota;
pub mod results;

pub use ingest::UploadIngestor;
pub use quota::DailyQuota;
pub use results::{ArtifactHandle, ResultRetriever};
