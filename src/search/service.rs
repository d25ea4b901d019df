//! Search orchestration over the vector index: response shaping, suggested
//! filters, related/trending queries, analytics, and the wishlist.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use super::domain::{
    Product, ProductDetail, ProductHit, SearchFilters, SearchResponse, SuggestedFilters,
    WishlistEntry,
};
use super::embedding::Embedder;
use super::index::{CatalogSource, VectorIndex};

const MAX_SUGGESTED_CATEGORIES: usize = 2;
const MAX_SUGGESTED_BRANDS: usize = 2;
const TRENDING_LIMIT: usize = 2;

/// Static trending list; a production deployment would derive this from the
/// recorded query analytics.
const TRENDING_SEARCHES: [&str; 6] = [
    "smartphone",
    "laptop",
    "headphones",
    "sneakers",
    "coffee maker",
    "fitness tracker",
];

/// Inbound search parameters.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub limit: usize,
    pub filters: SearchFilters,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

/// One recorded search, handed to the analytics collaborator.
#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub query: String,
    pub result_count: usize,
    pub latency_ms: f64,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

/// One recorded product view.
#[derive(Debug, Clone)]
pub struct ViewEvent {
    pub product_id: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("analytics sink unavailable: {0}")]
    Unavailable(String),
}

/// Analytics sink. Recording is best-effort everywhere: a failure is logged
/// and swallowed, never surfaced to the caller.
pub trait SearchAnalytics: Send + Sync {
    fn record_query(&self, event: &QueryEvent) -> Result<(), AnalyticsError>;
    fn record_view(&self, event: &ViewEvent) -> Result<(), AnalyticsError>;
}

/// Analytics sink that emits structured log events; stands in for the real
/// warehouse writer.
#[derive(Debug, Default, Clone)]
pub struct TracingAnalytics;

impl SearchAnalytics for TracingAnalytics {
    fn record_query(&self, event: &QueryEvent) -> Result<(), AnalyticsError> {
        info!(
            query = %event.query,
            results = event.result_count,
            latency_ms = event.latency_ms,
            "search query recorded"
        );
        Ok(())
    }

    fn record_view(&self, event: &ViewEvent) -> Result<(), AnalyticsError> {
        info!(product_id = %event.product_id, "product view recorded");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WishlistError {
    #[error("wishlist store unavailable: {0}")]
    Unavailable(String),
}

/// Per-user wishlist persistence.
pub trait WishlistStore: Send + Sync {
    /// Save an item; returns `false` when it was already present.
    fn add(
        &self,
        user_id: &str,
        product_id: &str,
        notes: Option<&str>,
    ) -> Result<bool, WishlistError>;

    fn entries(&self, user_id: &str) -> Result<Vec<WishlistEntry>, WishlistError>;
}

/// In-memory wishlist for the demo binary and the test suite.
#[derive(Debug, Default)]
pub struct MemoryWishlist {
    entries: Mutex<HashMap<String, Vec<WishlistEntry>>>,
}

impl WishlistStore for MemoryWishlist {
    fn add(
        &self,
        user_id: &str,
        product_id: &str,
        notes: Option<&str>,
    ) -> Result<bool, WishlistError> {
        let mut entries = self.entries.lock();
        let list = entries.entry(user_id.to_string()).or_default();
        if list.iter().any(|entry| entry.product_id == product_id) {
            return Ok(false);
        }
        list.push(WishlistEntry {
            product_id: product_id.to_string(),
            notes: notes.map(str::to_string),
            added_at: chrono::Utc::now(),
        });
        Ok(true)
    }

    fn entries(&self, user_id: &str) -> Result<Vec<WishlistEntry>, WishlistError> {
        Ok(self
            .entries
            .lock()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Error raised by wishlist operations; plain search never fails.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("product not found")]
    ProductNotFound,
    #[error(transparent)]
    Wishlist(#[from] WishlistError),
}

/// Service composing the index, the live catalog, the analytics sink, and
/// the wishlist store.
pub struct SearchService<E, C, A, W> {
    index: Arc<VectorIndex<E>>,
    catalog: Arc<C>,
    analytics: Arc<A>,
    wishlist: Arc<W>,
}

impl<E, C, A, W> SearchService<E, C, A, W>
where
    E: Embedder + 'static,
    C: CatalogSource + 'static,
    A: SearchAnalytics + 'static,
    W: WishlistStore + 'static,
{
    pub fn new(
        index: Arc<VectorIndex<E>>,
        catalog: Arc<C>,
        analytics: Arc<A>,
        wishlist: Arc<W>,
    ) -> Self {
        Self {
            index,
            catalog,
            analytics,
            wishlist,
        }
    }

    /// Run a search. Never fails: an unavailable index produces the same
    /// response shape with zero results, and an analytics failure is logged
    /// and swallowed.
    pub fn search(&self, request: SearchQuery) -> SearchResponse {
        let started = Instant::now();
        let hits = self
            .index
            .query(&request.query, request.limit, &request.filters);
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let suggested_filters = suggested_filters(&hits);
        let related_searches = related_searches(&request.query);
        let products: Vec<ProductHit> = hits
            .into_iter()
            .map(|(product, relevance_score)| ProductHit {
                product,
                relevance_score,
            })
            .collect();

        let event = QueryEvent {
            query: request.query.clone(),
            result_count: products.len(),
            latency_ms,
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
        };
        if let Err(error) = self.analytics.record_query(&event) {
            warn!(%error, "search analytics write failed");
        }

        SearchResponse {
            query: request.query,
            search_id: Uuid::new_v4().to_string(),
            total_results: products.len(),
            search_time_ms: latency_ms,
            products,
            applied_filters: request.filters,
            suggested_filters,
            related_searches,
            trending_searches: trending_searches(),
        }
    }

    /// Fetch one product with a best-effort view log and a "similar items"
    /// list from a secondary index query over the item's own category,
    /// subcategory, and tags.
    pub fn get_detail(
        &self,
        product_id: &str,
        similar_limit: usize,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Option<ProductDetail> {
        let product = self.index.get_by_id(self.catalog.as_ref(), product_id)?;

        let event = ViewEvent {
            product_id: product.product_id.clone(),
            user_id: user_id.map(str::to_string),
            session_id: session_id.map(str::to_string),
        };
        if let Err(error) = self.analytics.record_view(&event) {
            warn!(%error, "view analytics write failed");
        }

        let similar_products = self.similar_products(&product, similar_limit);
        Some(ProductDetail {
            product,
            similar_products,
        })
    }

    /// Save a product to the wishlist. Returns `false` for a duplicate add;
    /// unknown products are rejected.
    pub fn add_to_wishlist(
        &self,
        user_id: &str,
        product_id: &str,
        notes: Option<&str>,
    ) -> Result<bool, SearchError> {
        if self
            .index
            .get_by_id(self.catalog.as_ref(), product_id)
            .is_none()
        {
            return Err(SearchError::ProductNotFound);
        }
        Ok(self.wishlist.add(user_id, product_id, notes)?)
    }

    /// Resolve the saved items against the catalog; entries whose product
    /// has since disappeared are skipped.
    pub fn get_wishlist(&self, user_id: &str) -> Result<Vec<Product>, SearchError> {
        let entries = self.wishlist.entries(user_id)?;
        Ok(entries
            .iter()
            .filter_map(|entry| self.index.get_by_id(self.catalog.as_ref(), &entry.product_id))
            .collect())
    }

    fn similar_products(&self, product: &Product, limit: usize) -> Vec<ProductHit> {
        if limit == 0 {
            return Vec::new();
        }
        let query = format!(
            "{} {} {}",
            product.category,
            product.subcategory,
            product.tags.join(" ")
        );
        // One extra candidate so the item itself can be excluded.
        self.index
            .query(&query, limit.saturating_add(1), &SearchFilters::default())
            .into_iter()
            .filter(|(candidate, _)| candidate.product_id != product.product_id)
            .take(limit)
            .map(|(product, relevance_score)| ProductHit {
                product,
                relevance_score,
            })
            .collect()
    }
}

fn suggested_filters(hits: &[(Product, f32)]) -> SuggestedFilters {
    let mut categories: Vec<String> = Vec::new();
    let mut brands: Vec<String> = Vec::new();
    let mut prices: Vec<f64> = Vec::new();

    for (product, _) in hits {
        if !product.category.is_empty()
            && !categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&product.category))
        {
            categories.push(product.category.clone());
        }
        if !product.brand.is_empty()
            && !brands.iter().any(|b| b.eq_ignore_ascii_case(&product.brand))
        {
            brands.push(product.brand.clone());
        }
        prices.push(product.price);
    }
    categories.truncate(MAX_SUGGESTED_CATEGORIES);
    brands.truncate(MAX_SUGGESTED_BRANDS);

    let price_ranges = match (
        prices.iter().cloned().fold(f64::INFINITY, f64::min),
        prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    ) {
        (min, max) if min.is_finite() && max.is_finite() => {
            let low = (min + (max - min) * 0.3) as i64;
            let high = (min + (max - min) * 0.7) as i64;
            vec![
                format!("Under ${low}"),
                format!("${low} - ${high}"),
                format!("Over ${high}"),
            ]
        }
        _ => Vec::new(),
    };

    SuggestedFilters {
        categories,
        brands,
        price_ranges,
    }
}

fn related_searches(query: &str) -> Vec<String> {
    vec![
        format!("{query} reviews"),
        format!("best {query}"),
        format!("cheap {query}"),
    ]
}

fn trending_searches() -> Vec<String> {
    TRENDING_SEARCHES
        .iter()
        .take(TRENDING_LIMIT)
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, category: &str, brand: &str, price: f64) -> Product {
        Product {
            product_id: id.to_string(),
            name: format!("product {id}"),
            description: "desc".to_string(),
            category: category.to_string(),
            subcategory: String::new(),
            price,
            currency: "USD".to_string(),
            seller: "seller".to_string(),
            brand: brand.to_string(),
            rating: 4.0,
            reviews_count: 1,
            in_stock: true,
            stock_quantity: 1,
            tags: Vec::new(),
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

    #[test]
    fn suggested_filters_cap_categories_and_brands_at_two() {
        let hits = vec![
            (product("p1", "Electronics", "Acme", 100.0), 0.9),
            (product("p2", "Kitchen", "Bosch", 200.0), 0.8),
            (product("p3", "Clothing", "Nike", 300.0), 0.7),
            (product("p4", "electronics", "ACME", 400.0), 0.6),
        ];
        let suggested = suggested_filters(&hits);
        assert_eq!(suggested.categories, vec!["Electronics", "Kitchen"]);
        assert_eq!(suggested.brands, vec!["Acme", "Bosch"]);
    }

    #[test]
    fn price_bands_split_the_spread_at_30_and_70_percent() {
        let hits = vec![
            (product("p1", "c", "b", 100.0), 0.9),
            (product("p2", "c", "b", 200.0), 0.8),
        ];
        let suggested = suggested_filters(&hits);
        // spread 100..200: 30% point 130, 70% point 170.
        assert_eq!(
            suggested.price_ranges,
            vec!["Under $130", "$130 - $170", "Over $170"]
        );
    }

    #[test]
    fn no_hits_means_no_price_bands() {
        let suggested = suggested_filters(&[]);
        assert!(suggested.price_ranges.is_empty());
        assert!(suggested.categories.is_empty());
    }

    #[test]
    fn related_searches_use_the_fixed_transforms() {
        assert_eq!(
            related_searches("espresso machine"),
            vec![
                "espresso machine reviews",
                "best espresso machine",
                "cheap espresso machine"
            ]
        );
    }

    #[test]
    fn trending_is_the_static_top_two() {
        assert_eq!(trending_searches(), vec!["smartphone", "laptop"]);
    }

    #[test]
    fn wishlist_duplicate_add_is_a_noop() {
        let store = MemoryWishlist::default();
        assert!(store.add("user-1", "p1", Some("birthday")).unwrap());
        assert!(!store.add("user-1", "p1", None).unwrap());
        assert!(store.add("user-2", "p1", None).unwrap());
        assert_eq!(store.entries("user-1").unwrap().len(), 1);
    }
}
