use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    cart::{CartLine, ProductSnapshot},
    catalog::{Product, ProductPage},
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartView},
        comments::{CommentList, NewCommentRequest},
        orders::{CreateOrderRequest, OrderList, UpdateOrderRequest},
        products::{CategoryList, ProductList},
    },
    models::{Comment, Order, OrderLine, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        products::list_products,
        products::list_categories,
        products::get_product,
        products::list_comments,
        products::add_comment,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        cart::clear_cart,
        cart::checkout,
        orders::list_orders,
        orders::create_order,
        orders::list_all_orders,
        orders::get_order,
        orders::update_order,
        orders::delete_order
    ),
    components(
        schemas(
            User,
            Product,
            ProductPage,
            ProductSnapshot,
            CartLine,
            CartView,
            Order,
            OrderLine,
            Comment,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            CreateOrderRequest,
            UpdateOrderRequest,
            NewCommentRequest,
            OrderList,
            ProductList,
            CategoryList,
            CommentList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::SortOrder,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<CommentList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and current user"),
        (name = "Products", description = "Catalog browsing, search and category filter"),
        (name = "Comments", description = "Per-product reviews"),
        (name = "Cart", description = "Cart and checkout"),
        (name = "Orders", description = "Persisted orders"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_storefront_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/products",
            "/api/products/{id}/comments",
            "/api/cart/checkout",
            "/api/orders/{id}",
            "/api/auth/login",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
