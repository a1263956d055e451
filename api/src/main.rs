use api::{metrics, rest, store::RestStore};
use axum::{routing::get, Router};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let store_url =
        env::var("STORE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let api_key = env::var("STORE_API_KEY").unwrap_or_default();
    let http_addr = env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let store_timeout_secs: u64 = env::var("STORE_TIMEOUT_SECS")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .unwrap_or(10);

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting telemetry API");
    info!("Store: {}", store_url);
    info!("HTTP server: {}", http_addr);
    info!("Store timeout: {}s", store_timeout_secs);
    if api_key.is_empty() {
        error!("STORE_API_KEY is not set; store requests will be unauthenticated");
    }

    metrics::init_metrics();

    let store = match RestStore::new(&store_url, &api_key, Duration::from_secs(store_timeout_secs))
    {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to build store client: {}", e);
            std::process::exit(1);
        }
    };

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .merge(rest::create_router(store));

    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}

async fn healthz() -> &'static str {
    "ok"
}
