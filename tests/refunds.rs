//! Refund orchestrator tests via POST /refunds/{session_ref}

mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use common::*;

struct Fixture {
    state: AppState,
    gateway: std::sync::Arc<MockGateway>,
    order: Order,
}

fn setup(session_ref: &str, status: OrderStatus) -> Fixture {
    let (state, gateway) = create_test_app_state();
    let order = {
        let mut conn = state.db.get().unwrap();
        let user = create_test_user(&conn);
        let address = create_test_address(&conn, &user.id);
        let product = create_test_product(&conn, "Trail Mix", 500);
        let order =
            create_test_order(&mut conn, &user.id, &address.id, &product.id, 1, 500, session_ref);
        if status != OrderStatus::Pending {
            force_status(&conn, &order.id, status)
        } else {
            order
        }
    };
    gateway.set_session_status(SessionStatus::Paid);
    Fixture {
        state,
        gateway,
        order,
    }
}

async fn post_refund(state: AppState, session_ref: &str) -> (StatusCode, Value) {
    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/refunds/{}", session_ref))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status_code = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status_code, serde_json::from_slice(&bytes).unwrap())
}

fn reload(state: &AppState, order_id: &str) -> Order {
    let conn = state.db.get().unwrap();
    queries::get_order_by_id(&conn, order_id).unwrap().unwrap()
}

#[tokio::test]
async fn test_refund_paid_order_full_amount_in_minor_units() {
    let fx = setup("cs_test_1", OrderStatus::Paid);

    let (code, body) = post_refund(fx.state.clone(), "cs_test_1").await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["status"], "refunded");
    assert_eq!(body["refund_ref"], "re_test_1");

    // totalAmount 500 major units -> 50000 minor units at the gateway.
    let calls = fx.gateway.refund_calls.lock().unwrap().clone();
    assert_eq!(calls, vec![("pi_123".to_string(), 50000)]);

    let order = reload(&fx.state, &fx.order.id);
    assert_eq!(order.status, OrderStatus::Refunded);
    assert_eq!(order.refund_ref.as_deref(), Some("re_test_1"));
    assert_eq!(order.total_amount, 500, "total never changes, even on refund");
}

#[tokio::test]
async fn test_second_refund_always_fails() {
    let fx = setup("cs_test_1", OrderStatus::Paid);

    let (code, _) = post_refund(fx.state.clone(), "cs_test_1").await;
    assert_eq!(code, StatusCode::OK);

    let (code, body) = post_refund(fx.state.clone(), "cs_test_1").await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "already_refunded");

    // The gateway was only asked once.
    assert_eq!(fx.gateway.refund_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_pending_and_canceled_orders_cannot_be_refunded() {
    for status in [OrderStatus::Pending, OrderStatus::Canceled] {
        let fx = setup("cs_test_1", status);

        let (code, body) = post_refund(fx.state.clone(), "cs_test_1").await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_transition");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains(&format!("'{}'", status.as_ref())));

        assert_eq!(reload(&fx.state, &fx.order.id).status, status);
        assert!(fx.gateway.refund_calls.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_refund_reachable_from_completed() {
    let fx = setup("cs_test_1", OrderStatus::Completed);

    let (code, body) = post_refund(fx.state.clone(), "cs_test_1").await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["status"], "refunded");
}

#[tokio::test]
async fn test_refund_requires_payment_intent() {
    let fx = setup("cs_test_1", OrderStatus::Paid);
    fx.gateway.set_session(GatewaySession {
        id: String::new(),
        payment_status: SessionStatus::Paid,
        invoice: None,
        payment_intent: None,
    });

    let (code, body) = post_refund(fx.state.clone(), "cs_test_1").await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "precondition_failed");

    assert_eq!(reload(&fx.state, &fx.order.id).status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_gateway_outage_leaves_order_untouched() {
    let fx = setup("cs_test_1", OrderStatus::Paid);
    fx.gateway
        .refund_unavailable
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let (code, body) = post_refund(fx.state.clone(), "cs_test_1").await;
    assert_eq!(code, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "gateway_unavailable");

    let order = reload(&fx.state, &fx.order.id);
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.refund_ref.is_none());
}

#[tokio::test]
async fn test_unknown_session_ref_is_not_found() {
    let fx = setup("cs_test_1", OrderStatus::Paid);

    let (code, body) = post_refund(fx.state.clone(), "cs_test_unknown").await;
    assert_eq!(code, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_session_missing_at_gateway_is_not_found() {
    let fx = setup("cs_test_1", OrderStatus::Paid);
    fx.gateway.clear_session();

    let (code, body) = post_refund(fx.state.clone(), "cs_test_1").await;
    assert_eq!(code, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    assert_eq!(reload(&fx.state, &fx.order.id).status, OrderStatus::Paid);
}
