/**
 * Site Routes
 * CRUD endpoints for school sites
 */
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::{
    ColorChanges, FontChanges, NewSite, SeoChanges, SiteChanges, SiteFilter, SiteSettingsChanges,
    SiteStatus,
};
use crate::error::{AppError, AppResult};
use crate::routes::MessageResponse;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

/// Request body for POST /api/sites
#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub name: Option<String>,
    pub domain: Option<String>,
    #[serde(alias = "schoolId")]
    pub school_id: Option<Uuid>,
    pub image_url: Option<String>,
}

/// Request body for PUT /api/sites/{id}
#[derive(Debug, Deserialize)]
pub struct UpdateSiteRequest {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub status: Option<SiteStatus>,
    pub image_url: Option<String>,
}

/// Request body for PUT /api/sites/{id}/settings
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSiteSettingsRequest {
    pub colors: Option<ColorChanges>,
    pub fonts: Option<FontChanges>,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
    pub social_links: Option<std::collections::BTreeMap<String, String>>,
    pub analytics: Option<serde_json::Map<String, serde_json::Value>>,
    pub seo: Option<SeoChanges>,
}

impl From<UpdateSiteSettingsRequest> for SiteSettingsChanges {
    fn from(req: UpdateSiteSettingsRequest) -> Self {
        SiteSettingsChanges {
            colors: req.colors,
            fonts: req.fonts,
            logo_url: req.logo_url,
            favicon_url: req.favicon_url,
            social_links: req.social_links,
            analytics: req.analytics,
            seo: req.seo,
        }
    }
}

/// Query parameters for GET /api/sites
#[derive(Debug, Deserialize)]
pub struct SiteListQuery {
    #[serde(alias = "schoolId")]
    pub school_id: Option<Uuid>,
    /// `draft`, `published`, or `all`
    pub status: Option<String>,
}

impl SiteListQuery {
    fn into_filter(self) -> AppResult<SiteFilter> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(other) => Some(SiteStatus::parse(other).ok_or_else(|| {
                AppError::validation(format!("Unknown site status: {other}"))
            })?),
        };
        Ok(SiteFilter {
            school_id: self.school_id,
            status,
        })
    }
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `None` stays `None`; a provided but blank value is an error.
fn present_or_reject(value: Option<String>, message: &str) -> AppResult<Option<String>> {
    match value {
        Some(v) => required(Some(v))
            .map(Some)
            .ok_or_else(|| AppError::validation(message)),
        None => Ok(None),
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().to_ascii_lowercase()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/sites
pub async fn create_site(
    State(state): State<AppState>,
    payload: Result<Json<CreateSiteRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;

    let (Some(name), Some(domain)) = (required(req.name), required(req.domain)) else {
        return Err(AppError::validation("Name and domain are required"));
    };

    let site = state
        .store
        .create_site(NewSite {
            school_id: req.school_id,
            name,
            domain: normalize_domain(&domain),
            image_url: required(req.image_url),
        })
        .await?;

    tracing::info!(site_id = %site.site.id, domain = %site.site.domain, "site created");
    Ok((StatusCode::CREATED, Json(site)))
}

/// GET /api/sites?school_id=&status=
pub async fn list_sites(
    State(state): State<AppState>,
    Query(query): Query<SiteListQuery>,
) -> AppResult<impl IntoResponse> {
    let sites = state.store.list_sites(query.into_filter()?).await?;
    Ok(Json(sites))
}

/// GET /api/sites/{id} - the site with its settings, pages and their sections
pub async fn get_site(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.site_tree(id).await?))
}

/// PUT /api/sites/{id}
pub async fn update_site(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateSiteRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;

    let name = present_or_reject(req.name, "Name cannot be empty")?;
    let domain =
        present_or_reject(req.domain, "Domain cannot be empty")?.map(|d| normalize_domain(&d));

    let site = state
        .store
        .update_site(
            id,
            SiteChanges {
                name,
                domain,
                status: req.status,
                image_url: required(req.image_url),
            },
        )
        .await?;

    Ok(Json(site))
}

/// PUT /api/sites/{id}/settings
pub async fn update_site_settings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateSiteSettingsRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(req) = payload?;

    let settings = state.store.update_site_settings(id, req.into()).await?;
    tracing::info!(site_id = %id, "site settings updated");
    Ok(Json(settings))
}

/// DELETE /api/sites/{id}
pub async fn delete_site(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.store.delete_site(id).await?;
    tracing::info!(site_id = %id, "site deleted");
    Ok(Json(MessageResponse::new("Site deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_all_means_no_filter() {
        let filter = SiteListQuery {
            school_id: None,
            status: Some("all".to_string()),
        }
        .into_filter()
        .unwrap();
        assert!(filter.status.is_none());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = SiteListQuery {
            school_id: None,
            status: Some("archived".to_string()),
        }
        .into_filter()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required(Some("  Oak Hill ".into())).as_deref(), Some("Oak Hill"));
        assert_eq!(required(Some("   ".into())), None);
        assert_eq!(required(None), None);
    }
}
