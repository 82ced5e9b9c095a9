use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::cache::{CacheKey, CacheValue};
use super::{CatalogError, Product, ProductCatalog, ProductPage};
use crate::config::CatalogConfig;

/// REST client for a dummyjson-compatible product API.
///
/// Single products and the category list are cached for the configured TTL.
/// Listings and searches always go upstream.
#[derive(Clone)]
pub struct HttpCatalog {
    inner: Arc<HttpCatalogInner>,
}

struct HttpCatalogInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CatalogError::InvalidBaseUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(CatalogError::InvalidBaseUrl(config.base_url.clone()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        Ok(Self {
            inner: Arc::new(HttpCatalogInner {
                client,
                base_url,
                cache,
            }),
        })
    }

    /// Base URL plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidBaseUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        let response = self.inner.client.get(url).query(query).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(path));
        }

        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "catalog returned non-success status"
            );
            return Err(CatalogError::Status {
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "failed to parse catalog response"
            );
            CatalogError::Parse(e)
        })
    }
}

fn page_query(limit: i64, skip: i64) -> Vec<(&'static str, String)> {
    vec![("limit", limit.to_string()), ("skip", skip.to_string())]
}

#[async_trait]
impl ProductCatalog for HttpCatalog {
    #[instrument(skip(self))]
    async fn list_products(&self, limit: i64, skip: i64) -> Result<ProductPage, CatalogError> {
        self.get_json(&["products"], &page_query(limit, skip)).await
    }

    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<String>, CatalogError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<String> = self.get_json(&["products", "category-list"], &[]).await?;
        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;
        Ok(categories)
    }

    #[instrument(skip(self))]
    async fn by_category(
        &self,
        category: &str,
        limit: i64,
        skip: i64,
    ) -> Result<ProductPage, CatalogError> {
        self.get_json(&["products", "category", category], &page_query(limit, skip))
            .await
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        text: &str,
        limit: i64,
        skip: i64,
    ) -> Result<ProductPage, CatalogError> {
        let mut query = page_query(limit, skip);
        query.push(("q", text.to_string()));
        self.get_json(&["products", "search"], &query).await
    }

    #[instrument(skip(self))]
    async fn get_product(&self, id: i64) -> Result<Product, CatalogError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let segment = id.to_string();
        let product: Product = self.get_json(&["products", segment.as_str()], &[]).await?;
        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }
}
