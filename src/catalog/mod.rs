//! Remote product catalog.
//!
//! The catalog is the source of truth for products: nothing is synced into the
//! local database. `HttpCatalog` talks to a dummyjson-compatible REST API and
//! caches single-product lookups and the category list with `moka`.

mod cache;
mod http;

pub use http::HttpCatalog;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Category label the storefront uses for "no category filter".
pub const ALL_CATEGORIES: &str = "All Categories";

/// Errors that can occur when talking to the product catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found upstream.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upstream answered with a non-success status.
    #[error("Catalog returned HTTP {status}")]
    Status { status: u16 },

    /// The configured base URL cannot carry path segments.
    #[error("Invalid catalog base URL: {0}")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[serde(default, alias = "discountPercentage")]
    pub discount_percentage: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// One page of products as returned by the list, search and category endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProductPage {
    pub products: Vec<Product>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub skip: i64,
    #[serde(default)]
    pub limit: i64,
}

/// Read-only access to the product catalog.
///
/// A `limit` of 0 asks the upstream for every matching product.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn list_products(&self, limit: i64, skip: i64) -> Result<ProductPage, CatalogError>;

    async fn list_categories(&self) -> Result<Vec<String>, CatalogError>;

    async fn by_category(
        &self,
        category: &str,
        limit: i64,
        skip: i64,
    ) -> Result<ProductPage, CatalogError>;

    async fn search(&self, text: &str, limit: i64, skip: i64)
    -> Result<ProductPage, CatalogError>;

    async fn get_product(&self, id: i64) -> Result<Product, CatalogError>;
}

/// Text query and category selection from the product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub query: Option<String>,
    pub category: Option<String>,
}

impl ProductFilter {
    pub fn new(query: Option<String>, category: Option<String>) -> Self {
        let query = query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        let category = category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty() && c != ALL_CATEGORIES);
        Self { query, category }
    }
}

/// Resolve a listing request against the catalog.
///
/// A text query combined with a category searches upstream and narrows the
/// result by exact category match locally, so that case pages are cut here.
pub async fn filter_products(
    catalog: &dyn ProductCatalog,
    filter: &ProductFilter,
    limit: i64,
    skip: i64,
) -> Result<ProductPage, CatalogError> {
    match (filter.query.as_deref(), filter.category.as_deref()) {
        (Some(query), Some(category)) => {
            let found = catalog.search(query, 0, 0).await?;
            let matching: Vec<Product> = found
                .products
                .into_iter()
                .filter(|p| p.category == category)
                .collect();
            let total = matching.len() as i64;
            let products = matching
                .into_iter()
                .skip(skip.max(0) as usize)
                .take(limit.max(0) as usize)
                .collect();
            Ok(ProductPage {
                products,
                total,
                skip,
                limit,
            })
        }
        (Some(query), None) => catalog.search(query, limit, skip).await,
        (None, Some(category)) => catalog.by_category(category, limit, skip).await,
        (None, None) => catalog.list_products(limit, skip).await,
    }
}
