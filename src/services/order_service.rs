use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, OrderList, UpdateOrderRequest},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_owner_or_admin},
    models::{Order, OrderLine},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::cart_service::{cart_from_rows, load_rows},
    state::AppState,
};

fn validate_order(amount: Option<Decimal>, details: Option<&[OrderLine]>) -> AppResult<()> {
    if amount.is_some_and(|a| a < Decimal::ZERO) {
        return Err(AppError::BadRequest("amount must not be negative".into()));
    }
    if let Some(details) = details {
        if let Some(line) = details.iter().find(|l| l.quantity < 1) {
            return Err(AppError::BadRequest(format!(
                "quantity for product {} must be greater than 0",
                line.product_id
            )));
        }
    }
    Ok(())
}

async fn insert_lines<C: ConnectionTrait>(
    db: &C,
    order_id: Uuid,
    details: &[OrderLine],
) -> Result<Vec<OrderLine>, DbErr> {
    let mut lines = Vec::with_capacity(details.len());
    for (position, line) in details.iter().enumerate() {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            position: Set(position as i32),
        }
        .insert(db)
        .await?;
        lines.push(line_from_entity(item));
    }
    Ok(lines)
}

/// Insert an order and its lines on an open connection or transaction.
async fn insert_order<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    amount: Decimal,
    details: &[OrderLine],
) -> Result<Order, DbErr> {
    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        amount: Set(amount),
        ordered_at: Set(now.into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await?;

    let lines = insert_lines(db, order.id, details).await?;
    Ok(order_from_entity(order, lines))
}

async fn lines_for<C: ConnectionTrait>(
    db: &C,
    order_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Vec<OrderLine>>, DbErr> {
    let mut grouped: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .order_by_asc(OrderItemCol::Position)
        .all(db)
        .await?;
    for item in items {
        let order_id = item.order_id;
        grouped
            .entry(order_id)
            .or_default()
            .push(line_from_entity(item));
    }
    Ok(grouped)
}

/// Load an order the caller may see. Pass `lock` inside a transaction.
async fn find_visible_order<C: ConnectionTrait>(
    db: &C,
    user: &AuthUser,
    id: Uuid,
    lock: bool,
) -> AppResult<OrderModel> {
    let mut finder = Orders::find_by_id(id);
    if lock {
        finder = finder.lock(LockType::Update);
    }
    let order = finder.one(db).await?.ok_or(AppError::NotFound)?;
    ensure_owner_or_admin(user, order.user_id)?;
    Ok(order)
}

async fn paged_orders(
    state: &AppState,
    finder: Select<Orders>,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::OrderedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::OrderedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let mut lines = lines_for(&state.orm, models.iter().map(|m| m.id).collect()).await?;
    let items = models
        .into_iter()
        .map(|m| {
            let details = lines.remove(&m.id).unwrap_or_default();
            order_from_entity(m, details)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    validate_order(Some(payload.amount), Some(payload.details.as_slice()))?;

    let txn = state.orm.begin().await?;
    let order = insert_order(&txn, user.user_id, payload.amount, &payload.details).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, amount = %order.amount, "order saved");
    Ok(ApiResponse::success("Order created", order, Some(Meta::empty())))
}

/// Turn the user's cart into an order and empty the cart.
pub async fn checkout(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let rows = load_rows(&txn, user.user_id, true).await?;
    let cart = cart_from_rows(&rows);
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let amount = cart.total();
    let details: Vec<OrderLine> = cart
        .lines()
        .iter()
        .map(|l| OrderLine::new(l.product.id, l.quantity))
        .collect();

    let order = insert_order(&txn, user.user_id, amount, &details).await?;

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        amount = %order.amount,
        lines = order.details.len(),
        "order placed"
    );

    Ok(ApiResponse::success(
        "Checkout success",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let finder = Orders::find().filter(OrderCol::UserId.eq(user.user_id));
    paged_orders(state, finder, query).await
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    paged_orders(state, Orders::find(), query).await
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let model = find_visible_order(&state.orm, user, id, false).await?;
    let mut lines = lines_for(&state.orm, vec![model.id]).await?;
    let mut order = order_from_entity(model, lines.remove(&id).unwrap_or_default());

    for line in &mut order.details {
        match state.catalog.get_product(line.product_id).await {
            Ok(product) => line.title = Some(product.title),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    product_id = line.product_id,
                    "product title lookup failed"
                );
            }
        }
    }

    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    validate_order(payload.amount, payload.details.as_deref())?;

    let txn = state.orm.begin().await?;
    let existing = find_visible_order(&txn, user, id, true).await?;

    let mut active: OrderActive = existing.into();
    if let Some(amount) = payload.amount {
        active.amount = Set(amount);
    }
    if let Some(ordered_at) = payload.ordered_at {
        active.ordered_at = Set(ordered_at.into());
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    let details = match payload.details {
        Some(details) => {
            OrderItems::delete_many()
                .filter(OrderItemCol::OrderId.eq(order.id))
                .exec(&txn)
                .await?;
            insert_lines(&txn, order.id, &details).await?
        }
        None => lines_for(&txn, vec![order.id])
            .await?
            .remove(&order.id)
            .unwrap_or_default(),
    };

    txn.commit().await?;

    tracing::info!(order_id = %order.id, "order updated");
    Ok(ApiResponse::success(
        "Updated",
        order_from_entity(order, details),
        Some(Meta::empty()),
    ))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let order = find_visible_order(&state.orm, user, id, false).await?;
    let result = Orders::delete_by_id(order.id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    tracing::info!(order_id = %id, "order deleted");
    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn order_from_entity(model: OrderModel, details: Vec<OrderLine>) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        amount: model.amount,
        ordered_at: to_utc(model.ordered_at),
        created_at: to_utc(model.created_at),
        updated_at: to_utc(model.updated_at),
        details,
    }
}

fn to_utc(dt: sea_orm::prelude::DateTimeWithTimeZone) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

fn line_from_entity(model: OrderItemModel) -> OrderLine {
    OrderLine::new(model.product_id, model.quantity)
}
