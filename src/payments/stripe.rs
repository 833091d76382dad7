use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::StripeConfig;
use crate::error::{AppError, Result};

use super::{
    CheckoutSession, CreateSessionRequest, GatewayInvoice, GatewayRefund, GatewaySession,
    PaymentGateway, SessionStatus,
};

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RetrieveSessionResponse {
    id: String,
    payment_status: String,
    invoice: Option<String>,
    payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetrieveInvoiceResponse {
    id: String,
    invoice_pdf: Option<String>,
    hosted_invoice_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateRefundResponse {
    id: String,
}

#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: Client,
    secret_key: String,
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Stripe {} not found", what)));
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::GatewayUnavailable(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::GatewayUnavailable(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl PaymentGateway for StripeGateway {
    /// Create a checkout session with ad-hoc `price_data` line items
    /// priced from the catalog, invoice creation enabled, and the order
    /// id in metadata for webhook linkage.
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CheckoutSession> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.cancel_url.clone()),
            ("customer_email".into(), request.customer_email.clone()),
            ("invoice_creation[enabled]".into(), "true".into()),
            ("metadata[order_id]".into(), request.order_id.clone()),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            form.push((
                format!("line_items[{}][price_data][currency]", i),
                request.currency.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][product_data][description]", i),
                item.description.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount_minor.to_string(),
            ));
            form.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/checkout/sessions", API_BASE))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("Stripe API error: {}", e)))?;

        let session: CreateCheckoutSessionResponse =
            Self::parse_response(response, "checkout session").await?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn retrieve_session(&self, session_ref: &str) -> Result<GatewaySession> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", API_BASE, session_ref))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("Stripe API error: {}", e)))?;

        let session: RetrieveSessionResponse =
            Self::parse_response(response, "checkout session").await?;

        Ok(GatewaySession {
            id: session.id,
            payment_status: SessionStatus::parse(&session.payment_status),
            invoice: session.invoice,
            payment_intent: session.payment_intent,
        })
    }

    async fn retrieve_invoice(&self, invoice_ref: &str) -> Result<GatewayInvoice> {
        let response = self
            .client
            .get(format!("{}/invoices/{}", API_BASE, invoice_ref))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("Stripe API error: {}", e)))?;

        let invoice: RetrieveInvoiceResponse = Self::parse_response(response, "invoice").await?;

        Ok(GatewayInvoice {
            id: invoice.id,
            invoice_pdf: invoice.invoice_pdf,
            hosted_invoice_url: invoice.hosted_invoice_url,
        })
    }

    async fn create_refund(
        &self,
        payment_intent: &str,
        amount_minor: i64,
    ) -> Result<GatewayRefund> {
        let response = self
            .client
            .post(format!("{}/refunds", API_BASE))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("payment_intent", payment_intent),
                ("amount", &amount_minor.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("Stripe API error: {}", e)))?;

        let refund: CreateRefundResponse = Self::parse_response(response, "refund").await?;

        Ok(GatewayRefund { id: refund.id })
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        // Stripe signature format: t=timestamp,v1=signature
        let parts: Vec<&str> = signature.split(',').collect();

        let mut timestamp = None;
        let mut sig_v1 = None;

        for part in parts {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let timestamp_str = timestamp
            .ok_or_else(|| AppError::BadRequest("Invalid signature format".into()))?;
        let sig_v1 =
            sig_v1.ok_or_else(|| AppError::BadRequest("Invalid signature format".into()))?;

        // Parse and validate timestamp to prevent replay attacks.
        // Reject webhooks older than WEBHOOK_TIMESTAMP_TOLERANCE_SECS.
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid timestamp in signature".into()))?;

        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }

        // Also reject timestamps from the future (clock skew tolerance: 60 seconds)
        if age < -60 {
            tracing::warn!(
                "Stripe webhook rejected: timestamp in the future (age={}s)",
                age
            );
            return Ok(false);
        }

        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time comparison to prevent timing attacks. The length
        // check is not constant-time, but signature length is not secret
        // (always 64 hex chars for SHA-256).
        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig_v1.as_bytes();

        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ checkout.session.completed ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSessionEvent {
    pub id: String,
    pub payment_status: Option<String>,
    pub invoice: Option<String>,
    pub metadata: StripeMetadata,
}

#[derive(Debug, Deserialize, Default)]
pub struct StripeMetadata {
    pub order_id: Option<String>,
}

// ============ invoice.payment_succeeded ============

#[derive(Debug, Deserialize)]
pub struct StripeInvoiceEvent {
    pub id: String,
    pub amount_paid: Option<i64>,
    pub currency: Option<String>,
}
