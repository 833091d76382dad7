use axum::extract::State;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::{User, UserStatus};

/// Refunded orders a user may accumulate before the account is blocked.
const REFUND_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub struct RefundSummary {
    pub user_id: String,
    pub refunded_orders: i64,
    pub message: String,
}

/// Per-user refund summary with the safety cutoff: a user at or past
/// the refund limit is blocked on the spot and the request rejected.
pub async fn user_refund_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<RefundSummary>> {
    let conn = state.db.get()?;

    let user = queries::get_user_by_id(&conn, &user_id)?.or_not_found("User not found")?;

    if queries::count_orders_for_user(&conn, &user.id)? == 0 {
        return Err(AppError::NotFound("No orders found for this user".into()));
    }

    let refunded_orders = queries::count_refunded_orders(&conn, &user.id)?;

    if refunded_orders >= REFUND_LIMIT {
        queries::set_user_status(&conn, &user.id, UserStatus::Blocked)?;
        tracing::warn!(
            "user {} blocked: {} refunded orders (limit {})",
            user.id,
            refunded_orders,
            REFUND_LIMIT
        );
        return Err(AppError::RefundLimitExceeded(
            "user has exceeded the refund limit and has been blocked".into(),
        ));
    }

    Ok(Json(RefundSummary {
        user_id: user.id.clone(),
        refunded_orders,
        message: format!("User has {} refunded orders.", refunded_orders),
    }))
}

/// Admin block/unblock. The path action is `block` or `unblock`.
pub async fn set_user_block(
    State(state): State<AppState>,
    Path((user_id, action)): Path<(String, String)>,
) -> Result<Json<User>> {
    let conn = state.db.get()?;

    let user = queries::get_user_by_id(&conn, &user_id)?.or_not_found("User not found")?;

    let status = match action.as_str() {
        "block" => UserStatus::Blocked,
        "unblock" => UserStatus::Active,
        _ => {
            return Err(AppError::BadRequest(
                "Invalid action. Use \"block\" or \"unblock\".".into(),
            ))
        }
    };

    queries::set_user_status(&conn, &user.id, status)?;

    queries::get_user_by_id(&conn, &user.id)?
        .or_not_found("User not found")
        .map(Json)
}
