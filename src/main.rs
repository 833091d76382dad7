use std::sync::Arc;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::config::Config;
use storefront::db::{create_pool, init_db, queries, AppState};
use storefront::handlers;
use storefront::models::{CreateAddress, CreateProduct, CreateUser};
use storefront::payments::StripeGateway;

#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(about = "E-commerce order and payment lifecycle backend")]
struct Cli {
    /// Seed the database with dev data (user, address, products)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for testing.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .expect("Failed to count users");
    if existing > 0 {
        tracing::info!("Users already exist, skipping seed");
        return;
    }

    let user = queries::create_user(
        &conn,
        &CreateUser {
            username: "dev".to_string(),
            email: "dev@example.com".to_string(),
        },
    )
    .expect("Failed to create seed user");

    let address = queries::create_address(
        &conn,
        &CreateAddress {
            user_id: user.id.clone(),
            street: "1 Dev Street".to_string(),
            city: "Devville".to_string(),
            state: "DV".to_string(),
            postal_code: "00000".to_string(),
            country: "IN".to_string(),
        },
    )
    .expect("Failed to create seed address");

    let product = queries::create_product(
        &conn,
        &CreateProduct {
            name: "Sample Tee".to_string(),
            description: "A sample product for development".to_string(),
            brand: "DevBrand".to_string(),
            category: Some("apparel".to_string()),
            price: 500,
            market_price: Some(650),
        },
    )
    .expect("Failed to create seed product");

    tracing::info!("Seeded dev data:");
    tracing::info!("  user: {}", user.id);
    tracing::info!("  address: {}", address.id);
    tracing::info!("  product: {}", product.id);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = pool.get().expect("Failed to get db connection");
        init_db(&conn).expect("Failed to initialize schema");
    }

    let gateway = Arc::new(StripeGateway::new(&config.stripe));

    let state = AppState {
        db: pool,
        gateway,
        frontend_url: config.frontend_url.clone(),
        currency: config.currency.clone(),
    };

    if cli.seed {
        if config.dev_mode {
            seed_dev_data(&state);
        } else {
            tracing::warn!("--seed ignored outside dev mode (set STOREFRONT_ENV=dev)");
        }
    }

    let app = handlers::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Storefront server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
