use rusqlite::Connection;

use crate::error::Result;

/// Initialize the database schema. Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL,
            email       TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'active',
            created_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS addresses (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            street      TEXT NOT NULL,
            city        TEXT NOT NULL,
            state       TEXT NOT NULL,
            postal_code TEXT NOT NULL,
            country     TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            description  TEXT NOT NULL,
            brand        TEXT NOT NULL,
            category     TEXT,
            price        INTEGER NOT NULL,
            market_price INTEGER,
            created_at   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS orders (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL REFERENCES users(id),
            shipping_address_id TEXT NOT NULL REFERENCES addresses(id),
            session_ref         TEXT UNIQUE,
            refund_ref          TEXT,
            total_amount        INTEGER NOT NULL,
            status              TEXT NOT NULL DEFAULT 'pending',
            invoice_ref         TEXT,
            version             INTEGER NOT NULL DEFAULT 0,
            created_at          INTEGER NOT NULL,
            updated_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);
        CREATE INDEX IF NOT EXISTS idx_orders_session_ref ON orders(session_ref);

        CREATE TABLE IF NOT EXISTS order_items (
            order_id   TEXT NOT NULL REFERENCES orders(id),
            position   INTEGER NOT NULL,
            product_id TEXT NOT NULL REFERENCES products(id),
            quantity   INTEGER NOT NULL DEFAULT 1,
            color      TEXT,
            flavor     TEXT,
            size       TEXT,
            PRIMARY KEY (order_id, position)
        );
        ",
    )?;

    Ok(())
}
