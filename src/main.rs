// This is the entry point of the event sheets service.
//
// **Architecture Overview:**
// - `core/` = Business logic (sheet building, validation, orchestration)
// - `infra/` = Implementations of core traits (Google Sheets and Drive APIs)
// - `web/` = HTTP adapters (routes, middleware, error responses)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Build the router and serve it until shutdown

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "web/web_layer.rs"]
mod web;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::core::sheets::{SheetsConfig, SheetsService};
use crate::infra::google::{GoogleSheetsClient, ServiceAccountAuth};
use crate::web::{build_router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let server_config = ServerConfig::from_env();
    let sheets_config = SheetsConfig::from_env();

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let auth = ServiceAccountAuth::from_env()
        .await
        .context("Failed to load Google service account credentials")?;
    tracing::info!(account = %auth.client_email(), "Loaded Google service account");

    let client = GoogleSheetsClient::new(auth);
    let sheets_service = SheetsService::new(client, sheets_config);
    tracing::info!(
        time_zone = %sheets_service.config().time_zone,
        share_role = sheets_service.config().share_role.as_str(),
        allow_empty = sheets_service.config().allow_empty,
        "Sheets service configured"
    );

    let app = build_router(AppState::new(sheets_service), &server_config);

    // ========================================================================
    // SERVER
    // ========================================================================

    let addr = format!("{}:{}", server_config.host, server_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        prefix = %server_config.api_prefix,
        api_key = server_config.api_key.is_some(),
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler the server just runs until killed.
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
