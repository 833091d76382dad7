use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Internal order status. Transitions are constrained by the
/// reconciliation engine in `crate::orders`; `Refunded` is hard-terminal
/// and may only be written by the refund orchestrator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Refunded,
    Dispatched,
    Delivered,
    Completed,
    Canceled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Apparel size option on a line item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ItemSize {
    S,
    M,
    L,
    Xl,
    Xxl,
}

/// One product position on an order. Variant selections (color, flavor,
/// size) are snapshotted at order time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<ItemSize>,
}

/// A customer order and its payment lifecycle state.
///
/// `session_ref` is empty at creation and assigned exactly once when the
/// gateway checkout session is created; it never changes afterwards.
/// `total_amount` is the sum over line items at creation time, in major
/// currency units, and never changes - not even on refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub shipping_address_id: String,
    pub items: Vec<LineItem>,
    /// Payment-gateway checkout session reference (`cs_...`).
    pub session_ref: Option<String>,
    /// Gateway refund reference (`re_...`), set at most once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_ref: Option<String>,
    pub total_amount: i64,
    pub status: OrderStatus,
    /// Hosted invoice link, attached opportunistically when the gateway
    /// reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_ref: Option<String>,
    /// Optimistic-concurrency counter; every status-affecting write
    /// increments it and carries the expected value.
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a new order. The total is computed from the
/// referenced products, never supplied by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub user_id: String,
    pub shipping_address_id: String,
    pub items: Vec<CreateLineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLineItem {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub size: Option<ItemSize>,
}

fn default_quantity() -> i64 {
    1
}
