//! School Site Backend - sites, ordered pages and typed content sections

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod logging;
pub mod ordering;
pub mod pages;
pub mod routes;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    middleware, Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::state::AppState;

/// Configure CORS from the configured origins.
/// Falls back to the local frontend dev servers when none are set.
pub fn configure_cors(config: &AppConfig) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        origins = vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ];
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState, config: &AppConfig) -> Router {
    let cors = configure_cors(config);

    Router::new()
        .nest("/api", routes::api_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(cors)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server...");
}

/// Run the server (used by main).
pub async fn run() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();

    // Dropping these early shuts down the background log writers.
    let _log_guards = logging::init(&config.log);

    tracing::info!(
        environment = ?config.environment,
        max_body_bytes = config.max_body_bytes,
        "Configuration loaded"
    );

    let store = db::connect_store(&config.db).await;
    tracing::info!(backend = store.backend(), "Site store ready");

    let app = create_app(AppState::new(store), &config);

    let addr: SocketAddr = config.bind_addr().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid HOST/PORT configuration: {e}"),
        )
    })?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = create_app(AppState::in_memory(), &AppConfig::default());
        let res = app
            .oneshot(Request::get("/api/nothing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = create_app(AppState::in_memory(), &AppConfig::default());
        let res = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[test]
    fn test_invalid_origins_fall_back_to_defaults() {
        let config = AppConfig {
            allowed_origins: vec!["not a header\n".to_string()],
            ..AppConfig::default()
        };
        let _cors = configure_cors(&config);
    }
}
