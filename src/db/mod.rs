mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::payments::PaymentGateway;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Payment gateway behind the capability contract, so handlers and
    /// the reconciliation core never see a concrete provider.
    pub gateway: Arc<dyn PaymentGateway>,
    /// Base URL for checkout success/cancel redirects.
    pub frontend_url: String,
    /// Currency code for checkout sessions and refunds.
    pub currency: String,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
