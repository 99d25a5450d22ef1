mod api;
mod config;
mod errors;
mod headers;
mod models;
mod openapi;
mod services;
mod state;
mod store;
#[cfg(test)]
mod test_utils;

use crate::state::AppState;
use axum::routing::get;
use axum::{Json, Router};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load configuration
    let settings = match config::Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let store = match store::create_store(&settings.store).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize store: {}", e);
            std::process::exit(1);
        }
    };

    let state = match AppState::new(settings.clone(), store) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };

    issue_developer_tokens(&state).await;

    let app = create_app(state);

    // Build server address
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

    let server = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server running on {}, press Ctrl+C to stop", addr);
    let serve = axum::serve(server, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = serve {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Create a new application instance with a given state
pub fn create_app(state: AppState) -> Router {
    let (openapi_router, api_doc) =
        OpenApiRouter::with_openapi(openapi::ApiDoc::openapi()).split_for_parts();

    let openapi_json = api_doc.clone();
    Router::new()
        .merge(api::router())
        .merge(openapi_router)
        .route("/openapi.json", get(move || async move { Json(openapi_json) }))
        .merge(Scalar::with_url("/scalar", api_doc))
        .with_state(state)
}

/// Mints a developer token for every user id listed in the configuration
async fn issue_developer_tokens(state: &AppState) {
    if state.settings.developer_tokens.is_empty() {
        return;
    }

    for userid in &state.settings.developer_tokens {
        match state.users.fetch(userid).await {
            Ok(Some(_)) => {}
            Ok(None) => warn!("Issuing a developer token for unknown user '{}'", userid),
            Err(e) => {
                error!("Failed to look up user '{}': {}", userid, e);
                continue;
            }
        }

        match state.token_issuer.create_developer_token(userid).await {
            Ok(token) => {
                info!("Issued developer token for '{}'", userid);
                debug!("Developer token for '{}': {}", userid, token.value);
            }
            Err(e) => error!("Failed to issue developer token for '{}': {}", userid, e),
        }
    }
}

// Simple signal handler that works on all platforms
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
