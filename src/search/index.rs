//! The vector index over the product catalog.
//!
//! A build embeds every catalog item and swaps the finished snapshot in
//! atomically, so concurrent queries keep serving the previous snapshot
//! until the new one is complete. Snapshots are bincode-serialized to disk
//! and can be restored without re-embedding.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{Product, SearchFilters};
use super::embedding::{dot, Embedder};

/// Error raised by catalog sources.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("catalog read failed: {0}")]
    Fatal(String),
}

/// The live catalog: full scan for index builds, single lookup for detail
/// pages.
pub trait CatalogSource: Send + Sync {
    fn scan(&self) -> Result<Vec<Product>, CatalogError>;
    fn fetch(&self, product_id: &str) -> Result<Option<Product>, CatalogError>;
}

/// Error raised by index build, load, and persist operations. Queries never
/// raise; an unbuilt index answers with empty results.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("snapshot io failed: {0}")]
    Snapshot(#[from] std::io::Error),
    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("snapshot dimension {found} does not match embedder dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    dimension: usize,
    built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    product_id: String,
    embedding: Vec<f32>,
    product: Product,
}

/// Read-mostly shared index. The active snapshot sits behind an `RwLock`
/// holding an `Arc`, so a rebuild replaces the pointer in one write-lock
/// window and in-flight readers finish on the snapshot they cloned.
pub struct VectorIndex<E> {
    embedder: E,
    snapshot_path: Option<PathBuf>,
    active: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl<E: Embedder> VectorIndex<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            snapshot_path: None,
            active: RwLock::new(None),
        }
    }

    /// Persist snapshots to `path` on build and allow [`load`](Self::load)
    /// to restore from it.
    pub fn with_snapshot_path(embedder: E, path: impl Into<PathBuf>) -> Self {
        Self {
            embedder,
            snapshot_path: Some(path.into()),
            active: RwLock::new(None),
        }
    }

    /// Full build from the catalog: embed every item, persist the snapshot
    /// when a path is configured, then swap it in. Returns the number of
    /// indexed items.
    pub fn build(&self, catalog: &dyn CatalogSource) -> Result<usize, IndexError> {
        let products = catalog.scan()?;
        let entries: Vec<IndexEntry> = products
            .into_iter()
            .map(|product| IndexEntry {
                product_id: product.product_id.clone(),
                embedding: self.embedder.embed(&searchable_text(&product)),
                product,
            })
            .collect();

        let snapshot = IndexSnapshot {
            dimension: self.embedder.dimension(),
            built_at: Utc::now(),
            entries,
        };
        let indexed = snapshot.entries.len();

        if let Some(path) = &self.snapshot_path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, bincode::serialize(&snapshot)?)?;
        }

        *self.active.write() = Some(Arc::new(snapshot));
        info!(indexed, "product index built");
        Ok(indexed)
    }

    /// Restore the last persisted snapshot without re-embedding.
    pub fn load(&self) -> Result<usize, IndexError> {
        let Some(path) = &self.snapshot_path else {
            return Err(IndexError::Snapshot(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no snapshot path configured",
            )));
        };
        let bytes = fs::read(path)?;
        let snapshot: IndexSnapshot = bincode::deserialize(&bytes)?;
        if snapshot.dimension != self.embedder.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.embedder.dimension(),
                found: snapshot.dimension,
            });
        }
        let restored = snapshot.entries.len();
        *self.active.write() = Some(Arc::new(snapshot));
        info!(restored, "product index restored from snapshot");
        Ok(restored)
    }

    /// Full rebuild; not incremental.
    pub fn refresh(&self, catalog: &dyn CatalogSource) -> Result<usize, IndexError> {
        self.build(catalog)
    }

    pub fn is_ready(&self) -> bool {
        self.active.read().is_some()
    }

    pub fn len(&self) -> usize {
        self.active
            .read()
            .as_ref()
            .map(|snapshot| snapshot.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nearest-neighbor query with post-filtering. The scan keeps the top
    /// `2k` candidates by inner product, then applies the filters without
    /// score penalty and stops once `k` survivors are collected. An unbuilt
    /// index answers with an empty set, never an error.
    pub fn query(&self, text: &str, k: usize, filters: &SearchFilters) -> Vec<(Product, f32)> {
        let Some(snapshot) = self.active.read().clone() else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let query = self.embedder.embed(text);
        let mut candidates: Vec<(usize, f32)> = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, dot(&query, &entry.embedding)))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.truncate(k.saturating_mul(2));

        let mut results = Vec::with_capacity(k.min(candidates.len()));
        for (position, score) in candidates {
            let entry = &snapshot.entries[position];
            if filters.matches(&entry.product) {
                results.push((entry.product.clone(), score));
                if results.len() >= k {
                    break;
                }
            }
        }
        results
    }

    /// Single lookup: the live catalog first, then the last-built snapshot
    /// when the catalog is unreachable or misses the item. The fallback
    /// never raises.
    pub fn get_by_id(&self, catalog: &dyn CatalogSource, product_id: &str) -> Option<Product> {
        match catalog.fetch(product_id) {
            Ok(Some(product)) => return Some(product),
            Ok(None) => {}
            Err(error) => {
                warn!(%error, "catalog lookup failed, falling back to snapshot");
            }
        }
        let snapshot = self.active.read().clone()?;
        snapshot
            .entries
            .iter()
            .find(|entry| entry.product_id == product_id)
            .map(|entry| entry.product.clone())
    }
}

fn searchable_text(product: &Product) -> String {
    format!(
        "{} {} {}",
        product.name,
        product.description,
        product.tags.join(" ")
    )
}

/// File-backed catalog used by the demo binary: a JSON array of products.
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for JsonCatalog {
    fn scan(&self) -> Result<Vec<Product>, CatalogError> {
        let bytes = fs::read(&self.path)
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| CatalogError::Fatal(err.to_string()))
    }

    fn fetch(&self, product_id: &str) -> Result<Option<Product>, CatalogError> {
        Ok(self
            .scan()?
            .into_iter()
            .find(|product| product.product_id == product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedding::HashedTextEmbedder;

    fn product(id: &str, name: &str, category: &str, price: f64, in_stock: bool) -> Product {
        Product {
            product_id: id.to_string(),
            name: name.to_string(),
            description: format!("{name} for everyday use"),
            category: category.to_string(),
            subcategory: String::new(),
            price,
            currency: "USD".to_string(),
            seller: "acme store".to_string(),
            brand: "acme".to_string(),
            rating: 4.2,
            reviews_count: 12,
            in_stock,
            stock_quantity: if in_stock { 3 } else { 0 },
            tags: name.split_whitespace().map(str::to_string).collect(),
            specifications: serde_json::Value::Null,
            free_shipping: false,
            views: 0,
            sales_count: 0,
            featured: false,
            warranty_months: 12,
            returnable: true,
            created_at: None,
            updated_at: None,
        }
    }

    struct StaticCatalog(Vec<Product>);

    impl CatalogSource for StaticCatalog {
        fn scan(&self) -> Result<Vec<Product>, CatalogError> {
            Ok(self.0.clone())
        }

        fn fetch(&self, product_id: &str) -> Result<Option<Product>, CatalogError> {
            Ok(self.0.iter().find(|p| p.product_id == product_id).cloned())
        }
    }

    struct OfflineCatalog;

    impl CatalogSource for OfflineCatalog {
        fn scan(&self) -> Result<Vec<Product>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_string()))
        }

        fn fetch(&self, _product_id: &str) -> Result<Option<Product>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_string()))
        }
    }

    fn catalog() -> StaticCatalog {
        StaticCatalog(vec![
            product("p1", "wireless bluetooth headphones", "electronics", 79.0, true),
            product("p2", "bluetooth speaker portable", "electronics", 39.0, true),
            product("p3", "espresso coffee maker", "kitchen", 129.0, true),
            product("p4", "noise cancelling headphones", "electronics", 199.0, false),
        ])
    }

    #[test]
    fn unbuilt_index_answers_empty_not_error() {
        let index = VectorIndex::new(HashedTextEmbedder::default());
        assert!(!index.is_ready());
        assert!(index.query("headphones", 5, &SearchFilters::default()).is_empty());
    }

    #[test]
    fn build_and_query_rank_by_similarity() {
        let index = VectorIndex::new(HashedTextEmbedder::default());
        assert_eq!(index.build(&catalog()).unwrap(), 4);
        assert!(index.is_ready());

        let results = index.query("bluetooth headphones", 2, &SearchFilters::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.product_id, "p1");
        assert!(results[0].1 >= results[1].1);
    }

    #[test]
    fn out_of_stock_items_are_filtered_by_default() {
        let index = VectorIndex::new(HashedTextEmbedder::default());
        index.build(&catalog()).unwrap();

        let results = index.query("noise cancelling headphones", 4, &SearchFilters::default());
        assert!(results.iter().all(|(p, _)| p.product_id != "p4"));

        let relaxed = SearchFilters {
            in_stock_only: false,
            ..SearchFilters::default()
        };
        let results = index.query("noise cancelling headphones", 4, &relaxed);
        assert!(results.iter().any(|(p, _)| p.product_id == "p4"));
    }

    #[test]
    fn huge_k_does_not_overflow_the_candidate_window() {
        let index = VectorIndex::new(HashedTextEmbedder::default());
        index.build(&catalog()).unwrap();

        // k arrives unbounded from clients; the scan must cap, not panic.
        let results = index.query("headphones", usize::MAX, &SearchFilters::default());
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn filters_do_not_change_scores() {
        let index = VectorIndex::new(HashedTextEmbedder::default());
        index.build(&catalog()).unwrap();

        let unfiltered = index.query("bluetooth headphones", 4, &SearchFilters::default());
        let filtered = index.query(
            "bluetooth headphones",
            4,
            &SearchFilters {
                category: Some("ELECTRONICS".to_string()),
                ..SearchFilters::default()
            },
        );
        for (product, score) in &filtered {
            let original = unfiltered
                .iter()
                .find(|(p, _)| p.product_id == product.product_id)
                .expect("filtered hit present in unfiltered set");
            assert_eq!(*score, original.1);
        }
    }

    #[test]
    fn get_by_id_prefers_live_catalog_and_falls_back_to_snapshot() {
        let index = VectorIndex::new(HashedTextEmbedder::default());
        index.build(&catalog()).unwrap();

        let live = index.get_by_id(&catalog(), "p3").expect("live hit");
        assert_eq!(live.product_id, "p3");

        let fallback = index.get_by_id(&OfflineCatalog, "p3").expect("snapshot hit");
        assert_eq!(fallback.product_id, "p3");

        assert!(index.get_by_id(&OfflineCatalog, "missing").is_none());
    }

    #[test]
    fn snapshot_round_trip_restores_without_rebuilding() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("products.idx");

        let index = VectorIndex::with_snapshot_path(HashedTextEmbedder::default(), &path);
        index.build(&catalog()).unwrap();

        let restored = VectorIndex::with_snapshot_path(HashedTextEmbedder::default(), &path);
        assert_eq!(restored.load().unwrap(), 4);
        let results = restored.query("espresso coffee", 1, &SearchFilters::default());
        assert_eq!(results[0].0.product_id, "p3");
    }

    #[test]
    fn load_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("products.idx");

        let index = VectorIndex::with_snapshot_path(HashedTextEmbedder::new(64), &path);
        index.build(&catalog()).unwrap();

        let other = VectorIndex::with_snapshot_path(HashedTextEmbedder::new(128), &path);
        assert!(matches!(
            other.load(),
            Err(IndexError::DimensionMismatch { expected: 128, found: 64 })
        ));
    }
}
