use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    query_all, query_one, ADDRESS_COLS, ORDER_COLS, ORDER_ITEM_COLS, PRODUCT_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let user = User {
        id: EntityType::User.gen_id(),
        username: input.username.clone(),
        email: input.email.clone(),
        status: UserStatus::Active,
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO users (id, username, email, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.id,
            user.username,
            user.email,
            user.status.as_ref(),
            user.created_at
        ],
    )?;

    Ok(user)
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn set_user_status(conn: &Connection, id: &str, status: UserStatus) -> Result<()> {
    conn.execute(
        "UPDATE users SET status = ?1 WHERE id = ?2",
        params![status.as_ref(), id],
    )?;
    Ok(())
}

// ============ addresses ============

pub fn create_address(conn: &Connection, input: &CreateAddress) -> Result<Address> {
    let address = Address {
        id: EntityType::Address.gen_id(),
        user_id: input.user_id.clone(),
        street: input.street.clone(),
        city: input.city.clone(),
        state: input.state.clone(),
        postal_code: input.postal_code.clone(),
        country: input.country.clone(),
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO addresses (id, user_id, street, city, state, postal_code, country, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            address.id,
            address.user_id,
            address.street,
            address.city,
            address.state,
            address.postal_code,
            address.country,
            address.created_at
        ],
    )?;

    Ok(address)
}

pub fn get_address_by_id(conn: &Connection, id: &str) -> Result<Option<Address>> {
    query_one(
        conn,
        &format!("SELECT {} FROM addresses WHERE id = ?1", ADDRESS_COLS),
        &[&id],
    )
}

// ============ products ============

pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    let product = Product {
        id: EntityType::Product.gen_id(),
        name: input.name.clone(),
        description: input.description.clone(),
        brand: input.brand.clone(),
        category: input.category.clone(),
        price: input.price,
        market_price: input.market_price,
        created_at: now(),
    };

    conn.execute(
        "INSERT INTO products (id, name, description, brand, category, price, market_price, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            product.id,
            product.name,
            product.description,
            product.brand,
            product.category,
            product.price,
            product.market_price,
            product.created_at
        ],
    )?;

    Ok(product)
}

pub fn get_product_by_id(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

// ============ orders ============

/// Insert an order (status pending, no session ref) together with its
/// line items, atomically.
pub fn create_order(
    conn: &mut Connection,
    input: &CreateOrder,
    total_amount: i64,
) -> Result<Order> {
    let ts = now();
    let order = Order {
        id: EntityType::Order.gen_id(),
        user_id: input.user_id.clone(),
        shipping_address_id: input.shipping_address_id.clone(),
        items: input
            .items
            .iter()
            .map(|i| LineItem {
                product_id: i.product_id.clone(),
                quantity: i.quantity,
                color: i.color.clone(),
                flavor: i.flavor.clone(),
                size: i.size,
            })
            .collect(),
        session_ref: None,
        refund_ref: None,
        total_amount,
        status: OrderStatus::Pending,
        invoice_ref: None,
        version: 0,
        created_at: ts,
        updated_at: ts,
    };

    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO orders (id, user_id, shipping_address_id, session_ref, refund_ref, \
         total_amount, status, invoice_ref, version, created_at, updated_at) \
         VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?5, NULL, 0, ?6, ?7)",
        params![
            order.id,
            order.user_id,
            order.shipping_address_id,
            order.total_amount,
            order.status.as_ref(),
            order.created_at,
            order.updated_at
        ],
    )?;

    for (position, item) in order.items.iter().enumerate() {
        tx.execute(
            "INSERT INTO order_items (order_id, position, product_id, quantity, color, flavor, size) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                order.id,
                position as i64,
                item.product_id,
                item.quantity,
                item.color,
                item.flavor,
                item.size.map(|s| s.as_ref().to_string())
            ],
        )?;
    }

    tx.commit()?;

    Ok(order)
}

fn attach_items(conn: &Connection, order: &mut Order) -> Result<()> {
    order.items = query_all(
        conn,
        &format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY position",
            ORDER_ITEM_COLS
        ),
        &[&order.id],
    )?;
    Ok(())
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    let order: Option<Order> = query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )?;

    match order {
        Some(mut order) => {
            attach_items(conn, &mut order)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

pub fn get_order_by_session_ref(conn: &Connection, session_ref: &str) -> Result<Option<Order>> {
    let order: Option<Order> = query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE session_ref = ?1", ORDER_COLS),
        &[&session_ref],
    )?;

    match order {
        Some(mut order) => {
            attach_items(conn, &mut order)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

pub fn list_orders_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Order>> {
    let mut orders: Vec<Order> = query_all(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC",
            ORDER_COLS
        ),
        &[&user_id],
    )?;

    for order in &mut orders {
        attach_items(conn, order)?;
    }
    Ok(orders)
}

pub fn list_all_orders(conn: &Connection) -> Result<Vec<Order>> {
    let mut orders: Vec<Order> = query_all(
        conn,
        &format!("SELECT {} FROM orders ORDER BY created_at DESC", ORDER_COLS),
        &[],
    )?;

    for order in &mut orders {
        attach_items(conn, order)?;
    }
    Ok(orders)
}

/// Attach the gateway checkout session reference to an order.
///
/// The assignment is one-shot: the UPDATE only matches while the column
/// is still NULL, so a second attempt reports `false` instead of
/// overwriting the immutable reference.
pub fn set_order_session_ref(conn: &Connection, id: &str, session_ref: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET session_ref = ?1, updated_at = ?2 \
         WHERE id = ?3 AND session_ref IS NULL",
        params![session_ref, now(), id],
    )?;
    Ok(affected == 1)
}

/// Versioned status write: the single primitive every transition goes
/// through. The UPDATE only matches when `expected_version` is still
/// current; a concurrent writer makes it match zero rows and the caller
/// sees `false` (lost race) instead of a silent last-writer-wins.
///
/// `invoice_ref`/`refund_ref` are set-if-provided and keep their stored
/// value otherwise, which makes webhook re-delivery idempotent.
pub fn update_order_status(
    conn: &Connection,
    id: &str,
    expected_version: i64,
    status: OrderStatus,
    invoice_ref: Option<&str>,
    refund_ref: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = ?1, \
             invoice_ref = COALESCE(?2, invoice_ref), \
             refund_ref = COALESCE(?3, refund_ref), \
             version = version + 1, \
             updated_at = ?4 \
         WHERE id = ?5 AND version = ?6",
        params![status.as_ref(), invoice_ref, refund_ref, now(), id, expected_version],
    )?;
    Ok(affected == 1)
}

pub fn count_refunded_orders(conn: &Connection, user_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE user_id = ?1 AND status = 'refunded'",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_orders_for_user(conn: &Connection, user_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
