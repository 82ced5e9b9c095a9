use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};

use crate::{
    catalog::Product,
    dto::{
        comments::{CommentList, NewCommentRequest},
        products::{CategoryList, ProductList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Comment,
    response::ApiResponse,
    routes::params::ProductQuery,
    services::{comment_service, product_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/categories", get(list_categories))
        .route("/{id}", get(get_product))
        .route("/{id}/comments", get(list_comments).post(add_comment))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search text"),
        ("category" = Option<String>, Query, description = "Category slug, \"All Categories\" for none"),
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>),
        (status = 502, description = "Catalog unavailable"),
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/categories",
    responses(
        (status = 200, description = "List categories", body = ApiResponse<CategoryList>)
    ),
    tag = "Products"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let resp = product_service::list_categories(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/comments",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Comments for a product", body = ApiResponse<CommentList>)
    ),
    tag = "Comments"
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<CommentList>>> {
    let resp = comment_service::list_for_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/comments",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    request_body = NewCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = ApiResponse<Comment>),
        (status = 400, description = "Invalid rating or comment"),
        (status = 401, description = "Login required"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Comments"
)]
pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<NewCommentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Comment>>)> {
    let resp = comment_service::add_comment(&state, &user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
