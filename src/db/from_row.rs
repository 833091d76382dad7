//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupted data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub const USER_COLS: &str = "id, username, email, status, created_at";

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            created_at: row.get(4)?,
        })
    }
}

pub const ADDRESS_COLS: &str = "id, user_id, street, city, state, postal_code, country, created_at";

impl FromRow for Address {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Address {
            id: row.get(0)?,
            user_id: row.get(1)?,
            street: row.get(2)?,
            city: row.get(3)?,
            state: row.get(4)?,
            postal_code: row.get(5)?,
            country: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

pub const PRODUCT_COLS: &str =
    "id, name, description, brand, category, price, market_price, created_at";

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            brand: row.get(3)?,
            category: row.get(4)?,
            price: row.get(5)?,
            market_price: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

pub const ORDER_COLS: &str = "id, user_id, shipping_address_id, session_ref, refund_ref, \
     total_amount, status, invoice_ref, version, created_at, updated_at";

/// Orders map without their line items; `queries::attach_items` fills
/// them in with a second query.
impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            user_id: row.get(1)?,
            shipping_address_id: row.get(2)?,
            session_ref: row.get(3)?,
            refund_ref: row.get(4)?,
            total_amount: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            invoice_ref: row.get(7)?,
            version: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            items: Vec::new(),
        })
    }
}

pub const ORDER_ITEM_COLS: &str = "product_id, quantity, color, flavor, size";

impl FromRow for LineItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let size: Option<String> = row.get(4)?;
        let size = match size {
            Some(s) => Some(s.parse::<ItemSize>().map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    4,
                    "size".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?),
            None => None,
        };
        Ok(LineItem {
            product_id: row.get(0)?,
            quantity: row.get(1)?,
            color: row.get(2)?,
            flavor: row.get(3)?,
            size,
        })
    }
}
