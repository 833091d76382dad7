//! Order reconciliation engine.
//!
//! The transition policy is an explicit, pure table
//! (`plan_admin_transition`) so it can be audited and tested without
//! touching the database or the gateway; `reconcile_admin` and
//! `apply_completion` are the side-effecting appliers around it.

use crate::db::{queries, AppState};
use crate::error::{AppError, OptionExt, Result};
use crate::models::{Order, OrderStatus};
use crate::payments::{PaymentGateway, SessionStatus};

/// Outcome of the transition table: the status to write and whether the
/// gateway's invoice should be pulled alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub next: OrderStatus,
    pub fetch_invoice: bool,
}

/// Which invoice link to store. The admin path keeps the PDF, the
/// webhook path the hosted page, matching what each caller shows the
/// customer.
#[derive(Debug, Clone, Copy)]
enum InvoiceLink {
    Pdf,
    Hosted,
}

/// Admin-driven transition policy.
///
/// Maps (current status, gateway session status, requested status) to a
/// plan or a rejection:
///
/// - `paid`: reverting to pending/canceled is refused (captured money
///   must be refunded, not forgotten); `refunded` is never writable here
///   (the orchestrator owns it); a refunded order accepts nothing more;
///   anything else is applied and the invoice pulled.
/// - `unpaid`: only pending/canceled may be requested, and only from
///   pending/canceled; a refunded order accepts nothing.
/// - `requires_payment_method`: always refused, payment must be retried.
/// - `canceled`: the cancellation is mirrored regardless of the request,
///   unless the order was already refunded.
/// - anything else the gateway reports is refused as unhandled.
pub fn plan_admin_transition(
    current: OrderStatus,
    gateway_status: &SessionStatus,
    requested: OrderStatus,
) -> Result<TransitionPlan> {
    match gateway_status {
        SessionStatus::Paid => {
            if matches!(requested, OrderStatus::Pending | OrderStatus::Canceled) {
                return Err(AppError::InvalidTransition(
                    "order is paid; initiate a refund instead of reverting it".into(),
                ));
            }
            if requested == OrderStatus::Refunded {
                return Err(AppError::InvalidTransition(
                    "refunds are issued through the refund endpoint".into(),
                ));
            }
            if current == OrderStatus::Refunded {
                return Err(AppError::AlreadyRefunded);
            }
            Ok(TransitionPlan {
                next: requested,
                fetch_invoice: true,
            })
        }
        SessionStatus::Unpaid => {
            if !matches!(requested, OrderStatus::Pending | OrderStatus::Canceled) {
                return Err(AppError::InvalidTransition(format!(
                    "order is unpaid; it can only be marked pending or canceled, not '{}'",
                    requested
                )));
            }
            if current == OrderStatus::Refunded {
                return Err(AppError::AlreadyRefunded);
            }
            if !matches!(current, OrderStatus::Pending | OrderStatus::Canceled) {
                return Err(AppError::InvalidTransition(format!(
                    "unpaid order with status '{}' cannot be marked '{}'",
                    current, requested
                )));
            }
            Ok(TransitionPlan {
                next: requested,
                fetch_invoice: false,
            })
        }
        SessionStatus::RequiresPaymentMethod => Err(AppError::InvalidTransition(
            "payment not completed; please retry the payment".into(),
        )),
        SessionStatus::Canceled => {
            // Refunded is hard-terminal even against a canceled session.
            if current == OrderStatus::Refunded {
                return Err(AppError::AlreadyRefunded);
            }
            Ok(TransitionPlan {
                next: OrderStatus::Canceled,
                fetch_invoice: false,
            })
        }
        SessionStatus::Other(raw) => Err(AppError::UnhandledGatewayStatus(raw.clone())),
    }
}

/// Best-effort invoice resolution. A gateway failure here must never
/// abort the status transition it accompanies, so errors are logged and
/// collapsed to `None`.
async fn resolve_invoice(
    gateway: &dyn PaymentGateway,
    invoice_ref: Option<&str>,
    link: InvoiceLink,
) -> Option<String> {
    let invoice_ref = invoice_ref?;
    match gateway.retrieve_invoice(invoice_ref).await {
        Ok(invoice) => match link {
            InvoiceLink::Pdf => invoice.invoice_pdf.or(invoice.hosted_invoice_url),
            InvoiceLink::Hosted => invoice.hosted_invoice_url.or(invoice.invoice_pdf),
        },
        Err(e) => {
            tracing::warn!(
                "failed to fetch invoice {}: {} - continuing without it",
                invoice_ref,
                e
            );
            None
        }
    }
}

/// Admin-driven reconciliation: poll the gateway session for the order
/// and apply the requested status through the transition table.
///
/// The write carries the version read at the start; if a webhook or a
/// second admin raced us, the caller gets a conflict and retries with
/// fresh state rather than silently overwriting.
pub async fn reconcile_admin(
    state: &AppState,
    order_id: &str,
    requested: OrderStatus,
) -> Result<Order> {
    let order = {
        let conn = state.db.get()?;
        queries::get_order_by_id(&conn, order_id)?.or_not_found("Order not found")?
    };

    let session_ref = order
        .session_ref
        .clone()
        .ok_or_else(|| AppError::PreconditionFailed("order has no checkout session".into()))?;

    let session = state.gateway.retrieve_session(&session_ref).await?;

    let plan = plan_admin_transition(order.status, &session.payment_status, requested)?;

    let invoice_ref = if plan.fetch_invoice {
        resolve_invoice(
            state.gateway.as_ref(),
            session.invoice.as_deref(),
            InvoiceLink::Pdf,
        )
        .await
    } else {
        None
    };

    let conn = state.db.get()?;
    let written = queries::update_order_status(
        &conn,
        &order.id,
        order.version,
        plan.next,
        invoice_ref.as_deref(),
        None,
    )?;
    if !written {
        return Err(AppError::Conflict(
            "order was modified concurrently; retry the request".into(),
        ));
    }

    tracing::info!(
        "order {} reconciled: {} -> {} (gateway {:?})",
        order.id,
        order.status,
        plan.next,
        session.payment_status
    );

    queries::get_order_by_id(&conn, &order.id)?.or_not_found("Order not found")
}

/// Bounded retries for the completion write. Re-applying `completed` is
/// idempotent, so losing a version race just means re-reading and
/// writing again.
const COMPLETION_WRITE_ATTEMPTS: usize = 3;

/// Webhook-driven completion: unconditionally set `completed` and attach
/// the hosted invoice if the event carried one. Safe to invoke multiple
/// times for the same event - re-delivery re-applies the same terminal
/// value and the same invoice link.
pub async fn apply_completion(
    state: &AppState,
    order_id: &str,
    event_invoice_ref: Option<&str>,
) -> Result<Order> {
    let mut order = {
        let conn = state.db.get()?;
        queries::get_order_by_id(&conn, order_id)?.or_not_found("Order not found")?
    };

    if order.session_ref.is_none() {
        return Err(AppError::PreconditionFailed(
            "order has no checkout session".into(),
        ));
    }

    let invoice_ref =
        resolve_invoice(state.gateway.as_ref(), event_invoice_ref, InvoiceLink::Hosted).await;

    for _ in 0..COMPLETION_WRITE_ATTEMPTS {
        let conn = state.db.get()?;
        let written = queries::update_order_status(
            &conn,
            &order.id,
            order.version,
            OrderStatus::Completed,
            invoice_ref.as_deref(),
            None,
        )?;
        if written {
            tracing::info!("order {} completed via webhook", order.id);
            return queries::get_order_by_id(&conn, &order.id)?.or_not_found("Order not found");
        }

        // Lost a version race; re-read and re-apply.
        order = queries::get_order_by_id(&conn, &order.id)?.or_not_found("Order not found")?;
    }

    Err(AppError::Conflict(
        "order kept changing while applying completion".into(),
    ))
}
