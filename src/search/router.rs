//! HTTP surface for product search.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::SearchFilters;
use super::embedding::Embedder;
use super::index::CatalogSource;
use super::service::{SearchAnalytics, SearchError, SearchQuery, SearchService, WishlistStore};

const DEFAULT_LIMIT: usize = 10;
const DEFAULT_SIMILAR_LIMIT: usize = 2;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRequestBody {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(flatten)]
    filters: SearchFilters,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetailQuery {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WishlistAddRequest {
    user_id: String,
    product_id: String,
    #[serde(default)]
    notes: Option<String>,
}

/// Router builder exposing the search endpoints.
pub fn search_router<E, C, A, W>(service: Arc<SearchService<E, C, A, W>>) -> Router
where
    E: Embedder + 'static,
    C: CatalogSource + 'static,
    A: SearchAnalytics + 'static,
    W: WishlistStore + 'static,
{
    Router::new()
        .route("/api/v1/search/products", post(search_handler::<E, C, A, W>))
        .route(
            "/api/v1/search/products/:product_id",
            get(detail_handler::<E, C, A, W>),
        )
        .route(
            "/api/v1/search/wishlist",
            post(wishlist_add_handler::<E, C, A, W>),
        )
        .route(
            "/api/v1/search/wishlist/:user_id",
            get(wishlist_get_handler::<E, C, A, W>),
        )
        .with_state(service)
}

pub(crate) async fn search_handler<E, C, A, W>(
    State(service): State<Arc<SearchService<E, C, A, W>>>,
    axum::Json(body): axum::Json<SearchRequestBody>,
) -> Response
where
    E: Embedder + 'static,
    C: CatalogSource + 'static,
    A: SearchAnalytics + 'static,
    W: WishlistStore + 'static,
{
    let response = service.search(SearchQuery {
        query: body.query,
        limit: body.limit,
        filters: body.filters,
        user_id: body.user_id,
        session_id: body.session_id,
    });
    (StatusCode::OK, axum::Json(response)).into_response()
}

pub(crate) async fn detail_handler<E, C, A, W>(
    State(service): State<Arc<SearchService<E, C, A, W>>>,
    Path(product_id): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Response
where
    E: Embedder + 'static,
    C: CatalogSource + 'static,
    A: SearchAnalytics + 'static,
    W: WishlistStore + 'static,
{
    match service.get_detail(
        &product_id,
        DEFAULT_SIMILAR_LIMIT,
        query.user_id.as_deref(),
        query.session_id.as_deref(),
    ) {
        Some(detail) => (StatusCode::OK, axum::Json(detail)).into_response(),
        None => {
            let payload = json!({ "error": "product not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn wishlist_add_handler<E, C, A, W>(
    State(service): State<Arc<SearchService<E, C, A, W>>>,
    axum::Json(body): axum::Json<WishlistAddRequest>,
) -> Response
where
    E: Embedder + 'static,
    C: CatalogSource + 'static,
    A: SearchAnalytics + 'static,
    W: WishlistStore + 'static,
{
    match service.add_to_wishlist(&body.user_id, &body.product_id, body.notes.as_deref()) {
        Ok(added) => {
            let payload = json!({ "added": added });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(SearchError::ProductNotFound) => {
            let payload = json!({ "error": "product not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn wishlist_get_handler<E, C, A, W>(
    State(service): State<Arc<SearchService<E, C, A, W>>>,
    Path(user_id): Path<String>,
) -> Response
where
    E: Embedder + 'static,
    C: CatalogSource + 'static,
    A: SearchAnalytics + 'static,
    W: WishlistStore + 'static,
{
    match service.get_wishlist(&user_id) {
        Ok(products) => (StatusCode::OK, axum::Json(products)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
    }
}
