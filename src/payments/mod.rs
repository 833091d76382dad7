mod stripe;

pub use stripe::*;

use async_trait::async_trait;

use crate::error::Result;

/// Minor currency units per major unit (e.g. paise per rupee, cents per
/// dollar). The gateway bills and refunds in minor units; orders store
/// major units.
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Status the gateway reports for a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Paid,
    Unpaid,
    RequiresPaymentMethod,
    Canceled,
    /// Anything the reconciliation table does not know about; carries the
    /// raw gateway value for error reporting.
    Other(String),
}

impl SessionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "paid" => SessionStatus::Paid,
            "unpaid" => SessionStatus::Unpaid,
            "requires_payment_method" => SessionStatus::RequiresPaymentMethod,
            "canceled" => SessionStatus::Canceled,
            other => SessionStatus::Other(other.to_string()),
        }
    }
}

/// One priced position on a checkout session, in minor units.
#[derive(Debug, Clone)]
pub struct SessionLineItem {
    pub name: String,
    pub description: String,
    pub unit_amount_minor: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    /// Internal order id, carried in session metadata so the webhook can
    /// link the event back to the order.
    pub order_id: String,
    pub customer_email: String,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub line_items: Vec<SessionLineItem>,
}

/// A freshly created checkout session: the reference to persist and the
/// URL the customer is sent to.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Session state as retrieved from the gateway.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub id: String,
    pub payment_status: SessionStatus,
    /// Invoice reference, present once the gateway has generated one.
    pub invoice: Option<String>,
    /// Payment intent reference; required for refunds.
    pub payment_intent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayInvoice {
    pub id: String,
    pub invoice_pdf: Option<String>,
    pub hosted_invoice_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayRefund {
    pub id: String,
}

/// Capability contract over the payment provider.
///
/// The reconciliation engine and refund orchestrator depend on this
/// trait, never on a concrete provider, so tests substitute a scripted
/// fake.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CheckoutSession>;

    async fn retrieve_session(&self, session_ref: &str) -> Result<GatewaySession>;

    async fn retrieve_invoice(&self, invoice_ref: &str) -> Result<GatewayInvoice>;

    async fn create_refund(&self, payment_intent: &str, amount_minor: i64)
        -> Result<GatewayRefund>;

    /// Verify an inbound webhook payload against its signature header.
    /// Returns `Ok(false)` for a well-formed but wrong signature;
    /// malformed headers are errors.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool>;
}
