//! Refund orchestrator: the only writer of the `refunded` status.

use crate::db::{queries, AppState};
use crate::error::{AppError, OptionExt, Result};
use crate::models::{Order, OrderStatus};
use crate::payments::MINOR_UNITS_PER_MAJOR;

/// Retries for persisting the terminal status after the gateway refund
/// has been issued. The money has moved at that point, so a version
/// race must not lose the record.
const REFUND_WRITE_ATTEMPTS: usize = 3;

fn check_refundable(order: &Order) -> Result<()> {
    match order.status {
        OrderStatus::Pending | OrderStatus::Canceled => Err(AppError::InvalidTransition(format!(
            "cannot refund an order with status '{}'",
            order.status
        ))),
        OrderStatus::Refunded => Err(AppError::AlreadyRefunded),
        _ => Ok(()),
    }
}

/// Refund an order, looked up by its gateway session reference.
///
/// Guards, in order: the order must exist; nothing was captured for a
/// pending/canceled order; an already-refunded order is rejected; the
/// gateway session must carry a payment intent. The refund is for the
/// full `total_amount`, converted to the gateway's minor units.
pub async fn refund_by_session_ref(state: &AppState, session_ref: &str) -> Result<Order> {
    let order = {
        let conn = state.db.get()?;
        queries::get_order_by_session_ref(&conn, session_ref)?.or_not_found("Order not found")?
    };

    check_refundable(&order)?;

    let session = state.gateway.retrieve_session(session_ref).await?;
    let payment_intent = session.payment_intent.ok_or_else(|| {
        AppError::PreconditionFailed("no payment intent found for the order".into())
    })?;

    let amount_minor = order.total_amount * MINOR_UNITS_PER_MAJOR;
    let refund = state
        .gateway
        .create_refund(&payment_intent, amount_minor)
        .await?;

    // The gateway refund is issued; the terminal status must stick even
    // if a reconciliation raced us on the version counter.
    let mut current = order;
    for _ in 0..REFUND_WRITE_ATTEMPTS {
        let conn = state.db.get()?;
        let written = queries::update_order_status(
            &conn,
            &current.id,
            current.version,
            OrderStatus::Refunded,
            None,
            Some(&refund.id),
        )?;
        if written {
            tracing::info!(
                "order {} refunded: refund_ref={}, amount_minor={}",
                current.id,
                refund.id,
                amount_minor
            );
            return queries::get_order_by_id(&conn, &current.id)?.or_not_found("Order not found");
        }

        current =
            queries::get_order_by_id(&conn, &current.id)?.or_not_found("Order not found")?;
        if current.status == OrderStatus::Refunded {
            // Another writer refunded first.
            return Err(AppError::AlreadyRefunded);
        }
    }

    Err(AppError::Conflict(
        "order kept changing while recording the refund".into(),
    ))
}
