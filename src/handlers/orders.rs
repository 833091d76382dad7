use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::{CreateOrder, ItemSize, Order, OrderStatus, Product};
use crate::orders::reconcile_admin;
use crate::payments::{CreateSessionRequest, SessionLineItem, MINOR_UNITS_PER_MAJOR};

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: Order,
    pub session_id: String,
    pub url: String,
}

/// Create an order and its gateway checkout session.
///
/// The total is computed from catalog prices at creation time and never
/// changes afterwards. The session reference is attached exactly once,
/// right after the session is created.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrder>,
) -> Result<(StatusCode, Json<CreateOrderResponse>)> {
    if request.items.is_empty() {
        return Err(AppError::PreconditionFailed(
            "products are required to create an order".into(),
        ));
    }
    if request.items.iter().any(|i| i.quantity < 1) {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }

    let mut conn = state.db.get()?;

    let user = queries::get_user_by_id(&conn, &request.user_id)?.or_not_found("User not found")?;

    let address = queries::get_address_by_id(&conn, &request.shipping_address_id)?
        .or_not_found("Address not found")?;
    if address.user_id != user.id {
        return Err(AppError::PreconditionFailed(
            "address does not belong to this user".into(),
        ));
    }

    // Resolve products up front so a missing one fails the whole order
    // before anything is written.
    let mut products: Vec<Product> = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let product = queries::get_product_by_id(&conn, &item.product_id)?
            .or_not_found("Product not found")?;
        products.push(product);
    }

    let total_amount: i64 = request
        .items
        .iter()
        .zip(&products)
        .map(|(item, product)| product.price * item.quantity)
        .sum();

    let order = queries::create_order(&mut conn, &request, total_amount)?;

    let line_items = request
        .items
        .iter()
        .zip(&products)
        .map(|(item, product)| SessionLineItem {
            name: product.name.clone(),
            description: match &item.color {
                Some(color) => format!("{} - {}", color, product.brand),
                None => product.brand.clone(),
            },
            unit_amount_minor: product.price * MINOR_UNITS_PER_MAJOR,
            quantity: item.quantity,
        })
        .collect();

    let session = state
        .gateway
        .create_checkout_session(&CreateSessionRequest {
            order_id: order.id.clone(),
            customer_email: user.email.clone(),
            currency: state.currency.clone(),
            success_url: format!("{}/success/{}", state.frontend_url, order.id),
            cancel_url: format!("{}/cancel/{}", state.frontend_url, order.id),
            line_items,
        })
        .await?;

    if !queries::set_order_session_ref(&conn, &order.id, &session.id)? {
        return Err(AppError::Conflict(
            "order already has a checkout session".into(),
        ));
    }

    let order =
        queries::get_order_by_id(&conn, &order.id)?.or_not_found("Order not found")?;

    tracing::info!(
        "order {} created: total={}, session_ref={}",
        order.id,
        order.total_amount,
        session.id
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order,
            session_id: session.id.clone(),
            url: session.url,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct OrderProductView {
    pub product_id: String,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub price: i64,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<ItemSize>,
}

/// Order as presented in listings: lifecycle fields plus line items
/// joined with their product details.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub session_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_ref: Option<String>,
    pub total_amount: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub products: Vec<OrderProductView>,
}

fn build_order_view(conn: &rusqlite::Connection, order: Order) -> Result<OrderView> {
    let mut products = Vec::with_capacity(order.items.len());
    for item in &order.items {
        let product = queries::get_product_by_id(conn, &item.product_id)?
            .or_not_found("Product not found")?;
        products.push(OrderProductView {
            product_id: product.id,
            name: product.name,
            description: product.description,
            brand: product.brand,
            price: product.price,
            quantity: item.quantity,
            color: item.color.clone(),
            flavor: item.flavor.clone(),
            size: item.size,
        });
    }

    Ok(OrderView {
        id: order.id,
        user_id: order.user_id,
        status: order.status,
        session_ref: order.session_ref,
        invoice_ref: order.invoice_ref,
        total_amount: order.total_amount,
        created_at: order.created_at,
        updated_at: order.updated_at,
        products,
    })
}

/// List a user's orders, newest first.
pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderView>>> {
    let conn = state.db.get()?;

    let orders = queries::list_orders_for_user(&conn, &user_id)?;
    if orders.is_empty() {
        return Err(AppError::NotFound("No orders found for this user".into()));
    }

    orders
        .into_iter()
        .map(|order| build_order_view(&conn, order))
        .collect::<Result<Vec<_>>>()
        .map(Json)
}

/// List every order (admin), newest first.
pub async fn list_all_orders(State(state): State<AppState>) -> Result<Json<Vec<OrderView>>> {
    let conn = state.db.get()?;

    let orders = queries::list_all_orders(&conn)?;
    if orders.is_empty() {
        return Err(AppError::NotFound("No orders found".into()));
    }

    orders
        .into_iter()
        .map(|order| build_order_view(&conn, order))
        .collect::<Result<Vec<_>>>()
        .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Admin status update: polls the gateway session and applies the
/// requested status through the reconciliation engine.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Order>> {
    let order = reconcile_admin(&state, &order_id, request.status).await?;
    Ok(Json(order))
}

/// Admin direct cancel. Only a pending order can be canceled this way;
/// canceling an already-canceled order is a no-op.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    let conn = state.db.get()?;

    let order = queries::get_order_by_id(&conn, &order_id)?.or_not_found("Order not found")?;

    match order.status {
        OrderStatus::Canceled => Ok(Json(order)),
        OrderStatus::Pending => {
            let written = queries::update_order_status(
                &conn,
                &order.id,
                order.version,
                OrderStatus::Canceled,
                None,
                None,
            )?;
            if !written {
                return Err(AppError::Conflict(
                    "order was modified concurrently; retry the request".into(),
                ));
            }
            queries::get_order_by_id(&conn, &order.id)?
                .or_not_found("Order not found")
                .map(Json)
        }
        OrderStatus::Refunded => Err(AppError::AlreadyRefunded),
        other => Err(AppError::InvalidTransition(format!(
            "cannot cancel an order with status '{}'",
            other
        ))),
    }
}
