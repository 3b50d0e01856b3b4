/**
 * Section Routes
 * Typed content sections of a page and their ordering
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::content::{SectionBody, SectionKind};
use crate::db::models::{normalize_label, NewSection, Section, SectionChanges};
use crate::error::{AppError, AppResult};
use crate::routes::MessageResponse;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for POST /api/sections
#[derive(Debug, Deserialize)]
pub struct CreateSectionRequest {
    pub page_id: Uuid,
    #[serde(rename = "type")]
    pub section_type: String,
    pub label: Option<String>,
    #[serde(default)]
    pub content: Value,
    pub order_index: i32,
}

/// Request body for PUT /api/sections/{id}
#[derive(Debug, Deserialize)]
pub struct UpdateSectionRequest {
    #[serde(rename = "type")]
    pub section_type: Option<String>,
    pub label: Option<String>,
    pub content: Option<Value>,
}

/// Request body for POST /api/sections/order
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSectionRequest {
    pub section_id: Uuid,
    pub new_index: i32,
}

/// Response for POST /api/sections/{id}/duplicate
#[derive(Debug, Serialize)]
pub struct DuplicateResponse {
    pub message: String,
    pub section: Section,
}

fn parse_kind(tag: &str) -> AppResult<SectionKind> {
    SectionKind::parse(tag.trim())
        .ok_or_else(|| AppError::validation(format!("Unknown section type: {tag}")))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/sections - insert at `order_index`, shifting later sections
pub async fn create_section(
    State(state): State<AppState>,
    payload: Result<Json<CreateSectionRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;

    let kind = parse_kind(&req.section_type)?;
    let body = SectionBody::from_parts(kind, req.content)?;

    let section = state
        .store
        .insert_section(NewSection {
            page_id: req.page_id,
            label: normalize_label(req.label),
            body,
            order_index: req.order_index,
        })
        .await?;

    tracing::info!(
        section_id = %section.id,
        page_id = %section.page_id,
        section_type = %section.kind(),
        order_index = section.order_index,
        "section created"
    );
    Ok((StatusCode::CREATED, Json(section)))
}

/// GET /api/pages/{page_id}/sections
pub async fn list_sections(
    State(state): State<AppState>,
    Path(page_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.list_sections(page_id).await?))
}

/// GET /api/sections/{id}
pub async fn get_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.get_section(id).await?))
}

/// PUT /api/sections/{id} - type, label and content only
pub async fn update_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateSectionRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;

    let kind = req.section_type.as_deref().map(parse_kind).transpose()?;
    let section = state
        .store
        .update_section(
            id,
            SectionChanges {
                kind,
                label: req.label,
                content: req.content,
            },
        )
        .await?;

    Ok(Json(section))
}

/// POST /api/sections/order - swap with the section at `newIndex`
pub async fn move_section(
    State(state): State<AppState>,
    payload: Result<Json<MoveSectionRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;

    let sections = state
        .store
        .move_section(req.section_id, req.new_index)
        .await?;

    tracing::info!(
        section_id = %req.section_id,
        new_index = req.new_index,
        "section moved"
    );
    Ok(Json(sections))
}

/// DELETE /api/sections/{id}
pub async fn delete_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.store.delete_section(id).await?;
    tracing::info!(section_id = %id, "section deleted");
    Ok(Json(MessageResponse::new("Section deleted successfully")))
}

/// POST /api/sections/{id}/duplicate
pub async fn duplicate_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let section = state.store.duplicate_section(id).await?;
    tracing::info!(source_id = %id, section_id = %section.id, "section duplicated");
    Ok((
        StatusCode::CREATED,
        Json(DuplicateResponse {
            message: "Section duplicated successfully".to_string(),
            section,
        }),
    ))
}
