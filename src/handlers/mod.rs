mod dashboard;
mod orders;
mod refunds;
mod webhooks;

pub use dashboard::*;
pub use orders::*;
pub use refunds::*;
pub use webhooks::*;

use axum::{
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Storefront endpoints
        .route("/orders", post(create_order))
        .route("/users/{user_id}/orders", get(list_user_orders))
        .route("/refunds/{session_ref}", post(refund_order))
        // Webhook endpoint (provider-signed)
        .route("/webhooks/stripe", post(handle_stripe_webhook))
        // Admin endpoints
        .route("/admin/orders", get(list_all_orders))
        .route("/admin/orders/{order_id}/status", patch(update_order_status))
        .route("/admin/orders/{order_id}/cancel", post(cancel_order))
        .route("/admin/users/{user_id}/refunds", get(user_refund_summary))
        .route("/admin/users/{user_id}/{action}", post(set_user_block))
}
