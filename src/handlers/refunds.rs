use axum::extract::State;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::models::Order;
use crate::orders::refund_by_session_ref;

/// Refund an order, addressed by its gateway session reference. No body;
/// the refund is always for the full order total.
pub async fn refund_order(
    State(state): State<AppState>,
    Path(session_ref): Path<String>,
) -> Result<Json<Order>> {
    let order = refund_by_session_ref(&state, &session_ref).await?;
    Ok(Json(order))
}
