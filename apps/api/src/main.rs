use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use booking_cell::{BookingService, DraftStore, InMemoryDraftStore, RedisDraftStore};
use shared_config::AppConfig;

async fn draft_store(config: &AppConfig) -> Arc<dyn DraftStore> {
    match config.redis_url.as_deref() {
        Some(url) => match RedisDraftStore::connect(url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Redis unavailable, keeping booking drafts in memory: {}", e);
                Arc::new(InMemoryDraftStore::new())
            }
        },
        None => Arc::new(InMemoryDraftStore::new()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic booking API server");

    let config = Arc::new(AppConfig::from_env());
    if !config.is_payment_configured() {
        error!("Payment initiation is not configured; booking submission will fail");
    }

    let drafts = draft_store(&config).await;
    let booking = Arc::new(BookingService::new(&config, drafts));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config, booking)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
