//! Catalog entities and response shapes for product search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog product as indexed and returned. Snapshots of this struct are
/// persisted with the vector index, so the shape is serialization-stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub price: f64,
    pub currency: String,
    pub seller: String,
    pub brand: String,
    pub rating: f32,
    pub reviews_count: u32,
    pub in_stock: bool,
    pub stock_quantity: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub specifications: serde_json::Value,
    #[serde(default)]
    pub free_shipping: bool,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub sales_count: u64,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub warranty_months: u32,
    #[serde(default = "default_returnable")]
    pub returnable: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_returnable() -> bool {
    true
}

/// Post-filters applied after the nearest-neighbor scan. Matching never
/// alters scores; non-matching candidates are simply discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub price_min: Option<f64>,
    #[serde(default)]
    pub price_max: Option<f64>,
    #[serde(default = "default_in_stock_only")]
    pub in_stock_only: bool,
    #[serde(default)]
    pub min_rating: Option<f32>,
}

fn default_in_stock_only() -> bool {
    true
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            category: None,
            brand: None,
            price_min: None,
            price_max: None,
            in_stock_only: default_in_stock_only(),
            min_rating: None,
        }
    }
}

impl SearchFilters {
    /// Category and brand match exactly, case-insensitively; price bounds
    /// are inclusive.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category) = &self.category {
            if !product.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(brand) = &self.brand {
            if !product.brand.eq_ignore_ascii_case(brand) {
                return false;
            }
        }
        if let Some(min) = self.price_min {
            if product.price < min {
                return false;
            }
        }
        if let Some(max) = self.price_max {
            if product.price > max {
                return false;
            }
        }
        if self.in_stock_only && !product.in_stock {
            return false;
        }
        if let Some(min_rating) = self.min_rating {
            if product.rating < min_rating {
                return false;
            }
        }
        true
    }
}

/// A scored search hit.
#[derive(Debug, Clone, Serialize)]
pub struct ProductHit {
    #[serde(flatten)]
    pub product: Product,
    pub relevance_score: f32,
}

/// Filter suggestions derived from one result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuggestedFilters {
    pub categories: Vec<String>,
    pub brands: Vec<String>,
    pub price_ranges: Vec<String>,
}

/// Full search response. Search never fails at this layer: an unavailable
/// engine produces an empty result set with the same shape.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub search_id: String,
    pub total_results: usize,
    pub search_time_ms: f64,
    pub products: Vec<ProductHit>,
    pub applied_filters: SearchFilters,
    pub suggested_filters: SuggestedFilters,
    pub related_searches: Vec<String>,
    pub trending_searches: Vec<String>,
}

/// Product detail with similar items from a secondary index query.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub similar_products: Vec<ProductHit>,
}

/// One saved wishlist item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub product_id: String,
    pub notes: Option<String>,
    pub added_at: DateTime<Utc>,
}
