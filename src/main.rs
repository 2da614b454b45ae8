use anyhow::Context;
use axum::Router;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use time::Duration;
use tokio::net::TcpListener;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

mod analysis;
mod error;
mod ingest;
mod model;
mod schema;
mod selection;
mod session;
mod srs;
mod sync;
mod utils;

type DbPool = Pool<ConnectionManager<SqliteConnection>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Database configuration
    dotenv::dotenv().ok();
    env_logger::init();
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://sync.db".into());

    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .build(manager)
        .context("Failed to create DB pool")?;

    // Sessions configuration; the gateway's login flow populates them,
    // this core only reads user_id back out.
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::days(1)))
        .with_secure(false);

    // Main application router
    let app = Router::new()
        .nest("/api/sync", sync::sync_router(pool))
        .layer(session_layer);

    // Start server
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".into());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;

    log::info!("Sync server running on http://{bind_addr}");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
