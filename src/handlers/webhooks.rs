use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Serialize;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::orders::apply_completion;
use crate::payments::{StripeCheckoutSessionEvent, StripeInvoiceEvent, StripeWebhookEvent};

/// Acknowledgment body the gateway expects for handled and deliberately
/// ignored events alike. Anything other than a 2xx makes the provider
/// retry delivery.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

fn ack() -> Json<WebhookAck> {
    Json(WebhookAck { received: true })
}

/// Stripe webhook ingest.
///
/// The signature is verified against the raw body BEFORE anything is
/// parsed or mutated; an unverified payload is never trusted. After
/// verification the event is demultiplexed: completion events drive the
/// reconciliation engine, everything else is acknowledged and ignored.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::SignatureVerificationFailed)?;

    if !state.gateway.verify_webhook_signature(&body, signature)? {
        return Err(AppError::SignatureVerificationFailed);
    }

    let event: StripeWebhookEvent = serde_json::from_slice(&body)?;

    match event.event_type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(&state, &event).await,
        "invoice.payment_succeeded" => {
            // Informational only.
            if let Ok(invoice) =
                serde_json::from_value::<StripeInvoiceEvent>(event.data.object.clone())
            {
                tracing::info!(
                    "invoice {} payment succeeded: amount_paid={:?} {}",
                    invoice.id,
                    invoice.amount_paid,
                    invoice.currency.unwrap_or_default()
                );
            }
            Ok(ack())
        }
        other => {
            tracing::debug!("ignoring webhook event type {}", other);
            Ok(ack())
        }
    }
}

async fn handle_checkout_completed(
    state: &AppState,
    event: &StripeWebhookEvent,
) -> Result<Json<WebhookAck>> {
    let session: StripeCheckoutSessionEvent =
        serde_json::from_value(event.data.object.clone())?;

    let Some(order_id) = session.metadata.order_id else {
        // Not one of ours; acknowledge so the provider stops retrying.
        tracing::warn!("completed session {} has no order_id metadata", session.id);
        return Ok(ack());
    };

    match apply_completion(state, &order_id, session.invoice.as_deref()).await {
        Ok(order) => {
            tracing::info!(
                "webhook completed order {}: invoice_ref={:?}",
                order.id,
                order.invoice_ref
            );
            Ok(ack())
        }
        Err(AppError::NotFound(_)) => {
            // The order vanished or the metadata points elsewhere;
            // retrying the delivery cannot fix that.
            tracing::warn!("completed session {} references unknown order {}", session.id, order_id);
            Ok(ack())
        }
        Err(e) => Err(e),
    }
}
