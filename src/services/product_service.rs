use crate::{
    catalog::{Product, ProductFilter, filter_products},
    dto::products::{CategoryList, ProductList},
    error::AppResult,
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let filter = ProductFilter::new(query.q, query.category);

    let found = filter_products(state.catalog.as_ref(), &filter, limit, offset).await?;
    tracing::debug!(
        query = ?filter.query,
        category = ?filter.category,
        total = found.total,
        "products filtered"
    );

    let meta = Meta::new(page, limit, found.total);
    let data = ProductList {
        items: found.products,
    };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = state.catalog.list_categories().await?;
    let meta = Meta::total(items.len() as i64);
    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: i64) -> AppResult<ApiResponse<Product>> {
    let product = state.catalog.get_product(id).await?;
    Ok(ApiResponse::success("Product", product, None))
}
