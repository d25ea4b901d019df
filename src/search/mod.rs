//! Semantic product search: embedding, the shared vector index, and the
//! search orchestration layer.

pub mod domain;
pub mod embedding;
pub mod index;
pub mod router;
pub mod service;

pub use embedding::{Embedder, HashedTextEmbedder};
pub use index::{CatalogSource, JsonCatalog, VectorIndex};
pub use router::search_router;
pub use service::{SearchService, TracingAnalytics};
