/**
 * Page Routes
 * Pages of a site: CRUD, reordering and the homepage flag
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{NewPage, Page, PageChanges, PageWithSections, Section};
use crate::error::{AppError, AppResult};
use crate::routes::MessageResponse;
use crate::state::AppState;

/// Request body for POST /api/pages
#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    pub site_id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub is_homepage: bool,
}

/// Request body for PUT /api/pages/{id}
#[derive(Debug, Deserialize)]
pub struct UpdatePageRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub is_homepage: Option<bool>,
}

/// Request body for PUT /api/pages/order: every page id of the site, in
/// the new order.
#[derive(Debug, Deserialize)]
pub struct ReorderPagesRequest {
    pub site_id: Uuid,
    pub pages: Vec<Uuid>,
}

/// Response for GET /api/pages/{id}
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub page: Page,
    pub sections: Vec<Section>,
}

/// POST /api/pages
pub async fn create_page(
    State(state): State<AppState>,
    payload: Result<Json<CreatePageRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;

    let page = state
        .store
        .create_page(NewPage {
            site_id: req.site_id,
            title: req.title,
            slug: req.slug,
            is_homepage: req.is_homepage,
        })
        .await?;

    tracing::info!(
        page_id = %page.id,
        site_id = %page.site_id,
        slug = %page.slug,
        is_homepage = page.is_homepage,
        "page created"
    );
    Ok((StatusCode::CREATED, Json(page)))
}

/// GET /api/sites/{site_id}/pages
pub async fn list_pages(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.list_pages(site_id).await?))
}

/// GET /api/pages/{id}
pub async fn get_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let PageWithSections { page, sections } = state.store.page_with_sections(id).await?;
    Ok(Json(PageResponse { page, sections }))
}

/// PUT /api/pages/{id}
pub async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdatePageRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;

    let page = state
        .store
        .update_page(
            id,
            PageChanges {
                title: req.title,
                slug: req.slug,
                is_homepage: req.is_homepage,
            },
        )
        .await?;

    Ok(Json(page))
}

/// PUT /api/pages/order
pub async fn reorder_pages(
    State(state): State<AppState>,
    payload: Result<Json<ReorderPagesRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;

    if req.pages.is_empty() {
        return Err(AppError::validation("Page order must list the site's pages"));
    }

    let pages = state.store.reorder_pages(req.site_id, req.pages).await?;
    tracing::info!(site_id = %req.site_id, pages = pages.len(), "pages reordered");
    Ok(Json(pages))
}

/// DELETE /api/pages/{id}
pub async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.store.delete_page(id).await?;
    tracing::info!(page_id = %id, "page deleted");
    Ok(Json(MessageResponse::new("Page deleted successfully")))
}
