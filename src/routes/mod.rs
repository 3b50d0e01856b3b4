/**
 * Routes Module
 * API route handlers
 */

pub mod health;
pub mod pages;
pub mod sections;
pub mod sites;

use axum::{
    routing::{get, post, put},
    Router,
};
use serde::Serialize;

use crate::state::AppState;

/// `{ "message": ... }` body returned by deletes
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Routes mounted under `/api`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/sites", post(sites::create_site).get(sites::list_sites))
        .route(
            "/sites/{id}",
            get(sites::get_site)
                .put(sites::update_site)
                .delete(sites::delete_site),
        )
        .route("/sites/{id}/settings", put(sites::update_site_settings))
        .route("/sites/{id}/pages", get(pages::list_pages))
        .route("/pages", post(pages::create_page))
        .route("/pages/order", put(pages::reorder_pages))
        .route(
            "/pages/{id}",
            get(pages::get_page)
                .put(pages::update_page)
                .delete(pages::delete_page),
        )
        .route("/pages/{id}/sections", get(sections::list_sections))
        .route("/sections", post(sections::create_section))
        .route("/sections/order", post(sections::move_section))
        .route(
            "/sections/{id}",
            get(sections::get_section)
                .put(sections::update_section)
                .delete(sections::delete_section),
        )
        .route("/sections/{id}/duplicate", post(sections::duplicate_section))
}

/// Liveness and readiness checks, served outside `/api`.
pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_ping))
        .route("/health/store", get(health::health_store))
        .route("/health/ready", get(health::health_ready))
}
