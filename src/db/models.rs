//! Database Models - structs representing database tables (used by sqlx/serde).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::content::{SectionBody, SectionKind};
use crate::error::{AppError, AppResult};
use crate::ordering::Ranked;

/// Publication state of a site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    #[default]
    Draft,
    Published,
}

impl SiteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SiteStatus::Draft => "draft",
            SiteStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(SiteStatus::Draft),
            "published" => Some(SiteStatus::Published),
            _ => None,
        }
    }
}

/// Site model
#[derive(Debug, Clone, Serialize)]
pub struct Site {
    pub id: Uuid,
    pub school_id: Option<Uuid>,
    pub name: String,
    pub domain: String,
    pub status: SiteStatus,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `sites` row; `status` is kept as text in the table.
#[derive(Debug, Clone, FromRow)]
pub struct SiteRow {
    pub id: Uuid,
    pub school_id: Option<Uuid>,
    pub name: String,
    pub domain: String,
    pub status: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SiteRow> for Site {
    type Error = AppError;

    fn try_from(row: SiteRow) -> AppResult<Self> {
        let status = SiteStatus::parse(&row.status).ok_or_else(|| {
            AppError::Database(sqlx::Error::Decode(
                format!("unknown site status {:?}", row.status).into(),
            ))
        })?;
        Ok(Site {
            id: row.id,
            school_id: row.school_id,
            name: row.name,
            domain: row.domain,
            status,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// New site for insertion
#[derive(Debug, Clone)]
pub struct NewSite {
    pub school_id: Option<Uuid>,
    pub name: String,
    pub domain: String,
    pub image_url: Option<String>,
}

/// Site update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct SiteChanges {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub status: Option<SiteStatus>,
    pub image_url: Option<String>,
}

/// Filter for listing sites
#[derive(Debug, Clone, Default)]
pub struct SiteFilter {
    pub school_id: Option<Uuid>,
    pub status: Option<SiteStatus>,
}

impl SiteFilter {
    pub fn matches(&self, site: &Site) -> bool {
        self.school_id.map_or(true, |id| site.school_id == Some(id))
            && self.status.map_or(true, |status| site.status == status)
    }
}

// ============================================================================
// Site settings
// ============================================================================

/// Theme colors. Missing keys fall back to the stock palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeColors {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            primary: "#000000".to_string(),
            secondary: "#ffffff".to_string(),
            accent: "#007bff".to_string(),
            background: "#ffffff".to_string(),
            text: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeFonts {
    pub heading: String,
    pub body: String,
}

impl Default for ThemeFonts {
    fn default() -> Self {
        Self {
            heading: "Arial".to_string(),
            body: "Arial".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeoSettings {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

/// Per-site theme, branding and SEO. Exactly one per site, created with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSettings {
    pub site_id: Uuid,
    pub colors: ThemeColors,
    pub fonts: ThemeFonts,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
    pub social_links: BTreeMap<String, String>,
    pub analytics: serde_json::Map<String, serde_json::Value>,
    pub seo: SeoSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteSettings {
    /// Settings a new site starts with; the SEO title is the site name.
    pub fn defaults_for(site: &Site) -> Self {
        SiteSettings {
            site_id: site.id,
            colors: ThemeColors::default(),
            fonts: ThemeFonts::default(),
            logo_url: None,
            favicon_url: None,
            social_links: BTreeMap::new(),
            analytics: serde_json::Map::new(),
            seo: SeoSettings {
                title: Some(site.name.clone()),
                description: Some(String::new()),
                keywords: Vec::new(),
            },
            created_at: site.created_at,
            updated_at: site.created_at,
        }
    }

    /// Merge `changes` in. Colors, fonts and SEO merge key by key; social
    /// links and analytics are replaced whole.
    pub fn apply(&mut self, changes: SiteSettingsChanges) {
        if let Some(colors) = changes.colors {
            let c = &mut self.colors;
            merge_field(&mut c.primary, colors.primary);
            merge_field(&mut c.secondary, colors.secondary);
            merge_field(&mut c.accent, colors.accent);
            merge_field(&mut c.background, colors.background);
            merge_field(&mut c.text, colors.text);
        }
        if let Some(fonts) = changes.fonts {
            merge_field(&mut self.fonts.heading, fonts.heading);
            merge_field(&mut self.fonts.body, fonts.body);
        }
        if let Some(logo_url) = non_blank(changes.logo_url) {
            self.logo_url = Some(logo_url);
        }
        if let Some(favicon_url) = non_blank(changes.favicon_url) {
            self.favicon_url = Some(favicon_url);
        }
        if let Some(links) = changes.social_links {
            self.social_links = links;
        }
        if let Some(analytics) = changes.analytics {
            self.analytics = analytics;
        }
        if let Some(seo) = changes.seo {
            if let Some(title) = seo.title {
                self.seo.title = Some(title.trim().to_string());
            }
            if let Some(description) = seo.description {
                self.seo.description = Some(description.trim().to_string());
            }
            if let Some(keywords) = seo.keywords {
                self.seo.keywords = keywords
                    .into_iter()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect();
            }
        }
        self.updated_at = Utc::now();
    }
}

fn merge_field(slot: &mut String, value: Option<String>) {
    if let Some(value) = non_blank(value) {
        *slot = value;
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColorChanges {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub accent: Option<String>,
    pub background: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FontChanges {
    pub heading: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
}

/// Body of PUT /api/sites/{id}/settings; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteSettingsChanges {
    pub colors: Option<ColorChanges>,
    pub fonts: Option<FontChanges>,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
    pub social_links: Option<BTreeMap<String, String>>,
    pub analytics: Option<serde_json::Map<String, serde_json::Value>>,
    pub seo: Option<SeoChanges>,
}

/// Raw `site_settings` row; the nested groups live in JSONB columns.
#[derive(Debug, Clone, FromRow)]
pub struct SiteSettingsRow {
    pub site_id: Uuid,
    pub colors: Json<ThemeColors>,
    pub fonts: Json<ThemeFonts>,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
    pub social_links: Json<BTreeMap<String, String>>,
    pub analytics: Json<serde_json::Map<String, serde_json::Value>>,
    pub seo: Json<SeoSettings>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SiteSettingsRow> for SiteSettings {
    fn from(row: SiteSettingsRow) -> Self {
        SiteSettings {
            site_id: row.site_id,
            colors: row.colors.0,
            fonts: row.fonts.0,
            logo_url: row.logo_url,
            favicon_url: row.favicon_url,
            social_links: row.social_links.0,
            analytics: row.analytics.0,
            seo: row.seo.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Site as returned by create and update: the row plus its settings
#[derive(Debug, Clone, Serialize)]
pub struct SiteWithSettings {
    #[serde(flatten)]
    pub site: Site,
    pub settings: SiteSettings,
}

/// Page model
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Page {
    pub id: Uuid,
    pub site_id: Uuid,
    pub title: String,
    pub slug: String,
    pub is_homepage: bool,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ranked for Page {
    fn id(&self) -> Uuid {
        self.id
    }

    fn order_index(&self) -> i32 {
        self.order_index
    }

    fn set_order_index(&mut self, index: i32) {
        self.order_index = index;
    }
}

/// New page for creation
#[derive(Debug, Clone)]
pub struct NewPage {
    pub site_id: Uuid,
    pub title: String,
    pub slug: String,
    pub is_homepage: bool,
}

/// Page update
#[derive(Debug, Clone, Default)]
pub struct PageChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub is_homepage: Option<bool>,
}

/// Section model. `body` carries both the `type` tag and the typed `content`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub id: Uuid,
    pub page_id: Uuid,
    pub label: Option<String>,
    #[serde(flatten)]
    pub body: SectionBody,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        self.body.kind()
    }

    /// A fresh section, not yet placed on its page.
    pub fn draft(page_id: Uuid, label: Option<String>, body: SectionBody) -> Self {
        let now = Utc::now();
        Section {
            id: Uuid::new_v4(),
            page_id,
            label,
            body,
            order_index: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy of this section with a new id and a "(Copy)" label, placed at `order_index`.
    pub fn duplicate(&self, order_index: i32) -> Self {
        let label = match self.label.as_deref() {
            Some(label) => format!("{label} (Copy)"),
            None => format!("{} (Copy)", self.kind().display_name()),
        };
        let mut copy = Section::draft(self.page_id, Some(label), self.body.clone());
        copy.order_index = order_index;
        copy
    }

    /// Merge an update into this section. The resulting `(type, content)`
    /// pair is validated as a whole, so changing only the type re-checks the
    /// stored content against the new kind.
    pub fn apply(&mut self, changes: SectionChanges) -> AppResult<()> {
        if changes.kind.is_some() || changes.content.is_some() {
            let kind = changes.kind.unwrap_or_else(|| self.kind());
            let content = changes
                .content
                .unwrap_or_else(|| self.body.content_json());
            self.body = SectionBody::from_parts(kind, content)?;
        }

        if let Some(label) = normalize_label(changes.label) {
            self.label = Some(label);
        }

        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Ranked for Section {
    fn id(&self) -> Uuid {
        self.id
    }

    fn order_index(&self) -> i32 {
        self.order_index
    }

    fn set_order_index(&mut self, index: i32) {
        self.order_index = index;
    }
}

/// Raw `sections` row
#[derive(Debug, Clone, FromRow)]
pub struct SectionRow {
    pub id: Uuid,
    pub page_id: Uuid,
    pub section_type: String,
    pub label: Option<String>,
    pub content: serde_json::Value,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SectionRow> for Section {
    type Error = AppError;

    fn try_from(row: SectionRow) -> AppResult<Self> {
        let kind = SectionKind::parse(&row.section_type).ok_or_else(|| {
            AppError::Database(sqlx::Error::Decode(
                format!("unknown section type {:?}", row.section_type).into(),
            ))
        })?;
        Ok(Section {
            id: row.id,
            page_id: row.page_id,
            label: row.label,
            body: SectionBody::from_parts(kind, row.content)?,
            order_index: row.order_index,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// New section, inserted at `order_index`
#[derive(Debug, Clone)]
pub struct NewSection {
    pub page_id: Uuid,
    pub label: Option<String>,
    pub body: SectionBody,
    pub order_index: i32,
}

/// Section update; ordering is never part of it
#[derive(Debug, Clone, Default)]
pub struct SectionChanges {
    pub kind: Option<SectionKind>,
    pub label: Option<String>,
    pub content: Option<serde_json::Value>,
}

/// Page together with its ordered sections
#[derive(Debug, Clone, Serialize)]
pub struct PageWithSections {
    #[serde(flatten)]
    pub page: Page,
    pub sections: Vec<Section>,
}

/// Site with every page and section, as served by GET /sites/{id}
#[derive(Debug, Clone, Serialize)]
pub struct SiteTree {
    #[serde(flatten)]
    pub site: Site,
    pub settings: SiteSettings,
    pub pages: Vec<PageWithSections>,
}

/// Trimmed label, or `None` when absent or blank.
pub fn normalize_label(label: Option<String>) -> Option<String> {
    label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}
