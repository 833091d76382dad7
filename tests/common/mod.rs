//! Test utilities and fixtures for Storefront integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use storefront::db::{init_db, queries, AppState};
pub use storefront::error::AppError;
pub use storefront::handlers;
pub use storefront::models::*;
pub use storefront::payments::*;

use storefront::config::StripeConfig;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Scriptable fake gateway. Signature verification delegates to the real
/// Stripe scheme so webhook tests exercise the production verifier; every
/// other operation returns whatever the test scripted.
pub struct MockGateway {
    verifier: StripeGateway,
    session_counter: AtomicU64,
    /// Requests passed to create_checkout_session, for assertions.
    pub created_sessions: Mutex<Vec<CreateSessionRequest>>,
    /// What retrieve_session reports; `None` means the gateway does not
    /// know the session.
    pub session: Mutex<Option<GatewaySession>>,
    /// What retrieve_invoice reports.
    pub invoice: Mutex<Option<GatewayInvoice>>,
    /// Refund id handed out by create_refund.
    pub refund_id: Mutex<String>,
    /// (payment_intent, amount_minor) pairs create_refund was called with.
    pub refund_calls: Mutex<Vec<(String, i64)>>,
    /// Simulate provider outage for the named operations.
    pub session_unavailable: AtomicBool,
    pub invoice_unavailable: AtomicBool,
    pub refund_unavailable: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            verifier: StripeGateway::new(&StripeConfig {
                secret_key: "sk_test_xxx".to_string(),
                webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            }),
            session_counter: AtomicU64::new(0),
            created_sessions: Mutex::new(Vec::new()),
            session: Mutex::new(None),
            invoice: Mutex::new(Some(GatewayInvoice {
                id: "in_test_1".to_string(),
                invoice_pdf: Some("https://pay.example.com/invoice/in_test_1/pdf".to_string()),
                hosted_invoice_url: Some("https://pay.example.com/invoice/in_test_1".to_string()),
            })),
            refund_id: Mutex::new("re_test_1".to_string()),
            refund_calls: Mutex::new(Vec::new()),
            session_unavailable: AtomicBool::new(false),
            invoice_unavailable: AtomicBool::new(false),
            refund_unavailable: AtomicBool::new(false),
        })
    }

    /// Script the session the gateway reports, with the given payment
    /// status and a capturable payment intent.
    pub fn set_session_status(&self, status: SessionStatus) {
        *self.session.lock().unwrap() = Some(GatewaySession {
            id: String::new(),
            payment_status: status,
            invoice: Some("in_test_1".to_string()),
            payment_intent: Some("pi_123".to_string()),
        });
    }

    pub fn set_session(&self, session: GatewaySession) {
        *self.session.lock().unwrap() = Some(session);
    }

    pub fn clear_session(&self) {
        *self.session.lock().unwrap() = None;
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> storefront::error::Result<CheckoutSession> {
        let n = self.session_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.created_sessions.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            id: format!("cs_test_{}", n),
            url: format!("https://checkout.example.com/c/pay/cs_test_{}", n),
        })
    }

    async fn retrieve_session(
        &self,
        session_ref: &str,
    ) -> storefront::error::Result<GatewaySession> {
        if self.session_unavailable.load(Ordering::SeqCst) {
            return Err(AppError::GatewayUnavailable("connection timed out".into()));
        }
        match self.session.lock().unwrap().clone() {
            Some(mut session) => {
                session.id = session_ref.to_string();
                Ok(session)
            }
            None => Err(AppError::NotFound("Stripe checkout session not found".into())),
        }
    }

    async fn retrieve_invoice(
        &self,
        invoice_ref: &str,
    ) -> storefront::error::Result<GatewayInvoice> {
        if self.invoice_unavailable.load(Ordering::SeqCst) {
            return Err(AppError::GatewayUnavailable("connection timed out".into()));
        }
        match self.invoice.lock().unwrap().clone() {
            Some(invoice) => Ok(invoice),
            None => Err(AppError::NotFound(format!(
                "Stripe invoice not found: {}",
                invoice_ref
            ))),
        }
    }

    async fn create_refund(
        &self,
        payment_intent: &str,
        amount_minor: i64,
    ) -> storefront::error::Result<GatewayRefund> {
        if self.refund_unavailable.load(Ordering::SeqCst) {
            return Err(AppError::GatewayUnavailable("connection timed out".into()));
        }
        self.refund_calls
            .lock()
            .unwrap()
            .push((payment_intent.to_string(), amount_minor));
        Ok(GatewayRefund {
            id: self.refund_id.lock().unwrap().clone(),
        })
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> storefront::error::Result<bool> {
        self.verifier.verify_webhook_signature(payload, signature)
    }
}

/// Create an AppState over a single shared in-memory database, wired to
/// the given mock gateway. Pool size 1 so every handler sees the same
/// in-memory database.
pub fn test_state_with(gateway: Arc<MockGateway>) -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        gateway,
        frontend_url: "http://localhost:3000".to_string(),
        currency: "inr".to_string(),
    }
}

pub fn create_test_app_state() -> (AppState, Arc<MockGateway>) {
    let gateway = MockGateway::new();
    (test_state_with(gateway.clone()), gateway)
}

/// Full application router for `tower::ServiceExt::oneshot` tests.
pub fn app(state: AppState) -> Router {
    handlers::router().with_state(state)
}

pub fn create_test_user(conn: &Connection) -> User {
    queries::create_user(
        conn,
        &CreateUser {
            username: "testuser".to_string(),
            email: "test@example.com".to_string(),
        },
    )
    .expect("Failed to create test user")
}

pub fn create_test_address(conn: &Connection, user_id: &str) -> Address {
    queries::create_address(
        conn,
        &CreateAddress {
            user_id: user_id.to_string(),
            street: "12 Test Lane".to_string(),
            city: "Testopolis".to_string(),
            state: "TS".to_string(),
            postal_code: "560001".to_string(),
            country: "IN".to_string(),
        },
    )
    .expect("Failed to create test address")
}

pub fn create_test_product(conn: &Connection, name: &str, price: i64) -> Product {
    queries::create_product(
        conn,
        &CreateProduct {
            name: name.to_string(),
            description: format!("{} description", name),
            brand: "TestBrand".to_string(),
            category: Some("apparel".to_string()),
            price,
            market_price: None,
        },
    )
    .expect("Failed to create test product")
}

/// Create an order with one line item and attach a session ref.
pub fn create_test_order(
    conn: &mut Connection,
    user_id: &str,
    address_id: &str,
    product_id: &str,
    quantity: i64,
    price: i64,
    session_ref: &str,
) -> Order {
    let order = queries::create_order(
        conn,
        &CreateOrder {
            user_id: user_id.to_string(),
            shipping_address_id: address_id.to_string(),
            items: vec![CreateLineItem {
                product_id: product_id.to_string(),
                quantity,
                color: None,
                flavor: None,
                size: None,
            }],
        },
        price * quantity,
    )
    .expect("Failed to create test order");

    assert!(
        queries::set_order_session_ref(conn, &order.id, session_ref)
            .expect("Failed to attach session ref")
    );

    queries::get_order_by_id(conn, &order.id)
        .expect("Failed to reload order")
        .expect("Order missing after creation")
}

/// Force an order into a status, bypassing the engine (fixture setup
/// only).
pub fn force_status(conn: &Connection, order_id: &str, status: OrderStatus) -> Order {
    let order = queries::get_order_by_id(conn, order_id)
        .expect("Failed to load order")
        .expect("Order not found");
    assert!(
        queries::update_order_status(conn, &order.id, order.version, status, None, None)
            .expect("Failed to force status")
    );
    queries::get_order_by_id(conn, order_id)
        .expect("Failed to reload order")
        .expect("Order not found")
}

/// Compute a valid Stripe-style signature header for a payload.
pub fn stripe_signature_header(payload: &[u8], secret: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
