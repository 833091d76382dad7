use serde::{Deserialize, Serialize};

/// Catalog product. Only the fields the order flow reads are modeled;
/// `price` is in major currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub category: Option<String>,
    pub price: i64,
    pub market_price: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub description: String,
    pub brand: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price: i64,
    #[serde(default)]
    pub market_price: Option<i64>,
}
