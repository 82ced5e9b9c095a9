use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    cart::{Cart, CartLine, ProductSnapshot, Removal},
    dto::cart::{AddToCartRequest, CartView},
    entity::cart_items::{
        ActiveModel as CartActive, Column as CartCol, Entity as CartItems, Model as CartModel,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Cart rows for a user, oldest first. Pass `lock` inside a transaction.
pub(crate) async fn load_rows<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    lock: bool,
) -> Result<Vec<CartModel>, DbErr> {
    let mut finder = CartItems::find()
        .filter(CartCol::UserId.eq(user_id))
        .order_by_asc(CartCol::CreatedAt)
        .order_by_asc(CartCol::Id);
    if lock {
        finder = finder.lock(LockType::Update);
    }
    finder.all(db).await
}

pub(crate) fn line_from_entity(model: &CartModel) -> CartLine {
    CartLine {
        product: ProductSnapshot {
            id: model.product_id,
            title: model.title.clone(),
            price: model.price,
            thumbnail: model.thumbnail.clone(),
        },
        quantity: model.quantity,
    }
}

pub(crate) fn cart_from_rows(rows: &[CartModel]) -> Cart {
    Cart::from_lines(rows.iter().map(line_from_entity).collect())
}

fn cart_response(message: &str, cart: Cart) -> ApiResponse<CartView> {
    let meta = Meta::total(cart.lines().len() as i64);
    ApiResponse::success(message, CartView::from(cart), Some(meta))
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let rows = load_rows(&state.orm, user.user_id, false).await?;
    Ok(cart_response("OK", cart_from_rows(&rows)))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = state.catalog.get_product(payload.product_id).await?;
    let line = CartLine {
        product: ProductSnapshot::from(&product),
        quantity: payload.quantity,
    };

    let txn = state.orm.begin().await?;
    let rows = load_rows(&txn, user.user_id, true).await?;
    let mut cart = cart_from_rows(&rows);

    let quantity = cart
        .add(line.clone())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    match rows.iter().find(|r| r.product_id == payload.product_id) {
        Some(existing) => {
            let mut active: CartActive = existing.clone().into();
            active.quantity = Set(quantity);
            active.update(&txn).await?;
        }
        None => {
            CartActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                product_id: Set(line.product.id),
                title: Set(line.product.title.clone()),
                price: Set(line.product.price),
                thumbnail: Set(line.product.thumbnail.clone()),
                quantity: Set(quantity),
                created_at: Set(Utc::now().into()),
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;

    tracing::debug!(
        user_id = %user.user_id,
        product_id = payload.product_id,
        quantity,
        "cart updated"
    );
    Ok(cart_response("Added to cart", cart))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: i64,
) -> AppResult<ApiResponse<CartView>> {
    let txn = state.orm.begin().await?;
    let rows = load_rows(&txn, user.user_id, true).await?;
    let mut cart = cart_from_rows(&rows);

    let row = rows
        .iter()
        .find(|r| r.product_id == product_id)
        .ok_or(AppError::NotFound)?;

    match cart.remove_one(product_id) {
        Removal::Decremented(quantity) => {
            let mut active: CartActive = row.clone().into();
            active.quantity = Set(quantity);
            active.update(&txn).await?;
        }
        Removal::Deleted => {
            CartItems::delete_by_id(row.id).exec(&txn).await?;
        }
        Removal::Missing => return Err(AppError::NotFound),
    }

    txn.commit().await?;

    tracing::debug!(user_id = %user.user_id, product_id, "cart item removed");
    Ok(cart_response("Removed from cart", cart))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    tracing::debug!(user_id = %user.user_id, removed = result.rows_affected, "cart cleared");
    Ok(cart_response("Cart cleared", Cart::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn row(product_id: i64, quantity: i32) -> CartModel {
        CartModel {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            product_id,
            title: format!("Product {product_id}"),
            price: Decimal::new(250, 2),
            thumbnail: String::new(),
            quantity,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn rows_become_cart_in_order() {
        let cart = cart_from_rows(&[row(3, 1), row(1, 4)]);
        let ids: Vec<i64> = cart.lines().iter().map(|l| l.product.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(cart.total(), Decimal::new(1250, 2));
    }

    #[test]
    fn response_carries_total_and_count() {
        let resp = cart_response("OK", cart_from_rows(&[row(1, 2)]));
        let view = resp.data.unwrap();
        assert_eq!(view.total, Decimal::new(500, 2));
        assert_eq!(resp.meta.unwrap().total, Some(1));
    }
}
