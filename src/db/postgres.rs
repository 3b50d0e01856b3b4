//! PostgreSQL-backed store.
//!
//! Structural changes run in one transaction that first locks the parent row
//! (`pages` row for section writes, `sites` row for page writes) with
//! `FOR UPDATE`. The new order is computed in memory and written back in a
//! single `UPDATE ... FROM UNNEST(...)`; the `order_index` unique constraints
//! are deferred to commit, so no intermediate sentinel index is needed.
//!
//! Tree reads (`site_tree`, `page_with_sections`) run in a read-only
//! `REPEATABLE READ` transaction so every query sees the same snapshot.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::{types::Json, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::models::{
    NewPage, NewSection, NewSite, Page, PageChanges, PageWithSections, Section, SectionChanges,
    SectionRow, Site, SiteChanges, SiteFilter, SiteRow, SiteSettings, SiteSettingsChanges,
    SiteSettingsRow, SiteTree, SiteWithSettings,
};
use crate::db::store::SiteStore;
use crate::error::{AppError, AppResult};
use crate::ordering::{self, Reindex};
use crate::pages;

const SITE_COLUMNS: &str =
    "id, school_id, name, domain, status, image_url, created_at, updated_at";
const SETTINGS_COLUMNS: &str = "site_id, colors, fonts, logo_url, favicon_url, social_links, \
     analytics, seo, created_at, updated_at";
const PAGE_COLUMNS: &str =
    "id, site_id, title, slug, is_homepage, order_index, created_at, updated_at";
const SECTION_COLUMNS: &str =
    "id, page_id, section_type, label, content, order_index, created_at, updated_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read-only transaction over one consistent snapshot.
    async fn snapshot(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

/// Map unique violations on the named constraint to a client conflict.
fn conflict_on(err: sqlx::Error, constraint: &str, message: &str) -> AppError {
    let is_match = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation() && db.constraint() == Some(constraint));
    if is_match {
        AppError::Conflict(message.to_string())
    } else {
        AppError::Database(err)
    }
}

async fn lock_site(conn: &mut PgConnection, site_id: Uuid) -> AppResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM sites WHERE id = $1 FOR UPDATE")
        .bind(site_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound("Site"))
}

async fn lock_page(conn: &mut PgConnection, page_id: Uuid) -> AppResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM pages WHERE id = $1 FOR UPDATE")
        .bind(page_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound("Page"))
}

async fn fetch_site(conn: &mut PgConnection, id: Uuid) -> AppResult<Site> {
    let row = sqlx::query_as::<_, SiteRow>(&format!(
        "SELECT {SITE_COLUMNS} FROM sites WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Site"))?;
    Site::try_from(row)
}

async fn fetch_settings(conn: &mut PgConnection, site_id: Uuid) -> AppResult<SiteSettings> {
    sqlx::query_as::<_, SiteSettingsRow>(&format!(
        "SELECT {SETTINGS_COLUMNS} FROM site_settings WHERE site_id = $1"
    ))
    .bind(site_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(SiteSettings::from)
    .ok_or(AppError::NotFound("Site settings"))
}

async fn save_settings(conn: &mut PgConnection, settings: &SiteSettings) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO site_settings
            (site_id, colors, fonts, logo_url, favicon_url, social_links, analytics, seo, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (site_id) DO UPDATE
        SET colors = EXCLUDED.colors,
            fonts = EXCLUDED.fonts,
            logo_url = EXCLUDED.logo_url,
            favicon_url = EXCLUDED.favicon_url,
            social_links = EXCLUDED.social_links,
            analytics = EXCLUDED.analytics,
            seo = EXCLUDED.seo,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(settings.site_id)
    .bind(Json(&settings.colors))
    .bind(Json(&settings.fonts))
    .bind(&settings.logo_url)
    .bind(&settings.favicon_url)
    .bind(Json(&settings.social_links))
    .bind(Json(&settings.analytics))
    .bind(Json(&settings.seo))
    .bind(settings.created_at)
    .bind(settings.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_page(conn: &mut PgConnection, id: Uuid) -> AppResult<Page> {
    sqlx::query_as::<_, Page>(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Page"))
}

async fn fetch_pages(conn: &mut PgConnection, site_id: Uuid) -> AppResult<Vec<Page>> {
    let pages = sqlx::query_as::<_, Page>(&format!(
        "SELECT {PAGE_COLUMNS} FROM pages WHERE site_id = $1 ORDER BY order_index"
    ))
    .bind(site_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(pages)
}

async fn fetch_section(conn: &mut PgConnection, id: Uuid) -> AppResult<Section> {
    let row = sqlx::query_as::<_, SectionRow>(&format!(
        "SELECT {SECTION_COLUMNS} FROM sections WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Section"))?;
    Section::try_from(row)
}

async fn fetch_sections(conn: &mut PgConnection, page_id: Uuid) -> AppResult<Vec<Section>> {
    sqlx::query_as::<_, SectionRow>(&format!(
        "SELECT {SECTION_COLUMNS} FROM sections WHERE page_id = $1 ORDER BY order_index"
    ))
    .bind(page_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Section::try_from)
    .collect()
}

/// Every section of every page of the site, grouped by page, each group in
/// `order_index` order.
async fn fetch_site_sections(
    conn: &mut PgConnection,
    site_id: Uuid,
) -> AppResult<HashMap<Uuid, Vec<Section>>> {
    let rows = sqlx::query_as::<_, SectionRow>(&format!(
        r#"
        SELECT {SECTION_COLUMNS} FROM sections
        WHERE page_id IN (SELECT id FROM pages WHERE site_id = $1)
        ORDER BY page_id, order_index
        "#
    ))
    .bind(site_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<Section>> = HashMap::new();
    for row in rows {
        let section = Section::try_from(row)?;
        grouped.entry(section.page_id).or_default().push(section);
    }
    Ok(grouped)
}

/// Persist `rewrites` to `table` in one statement.
async fn apply_reindex(
    conn: &mut PgConnection,
    table: &'static str,
    rewrites: &[Reindex],
) -> AppResult<()> {
    if rewrites.is_empty() {
        return Ok(());
    }

    let ids: Vec<Uuid> = rewrites.iter().map(|r| r.id).collect();
    let indices: Vec<i32> = rewrites.iter().map(|r| r.order_index).collect();

    sqlx::query(&format!(
        r#"
        UPDATE {table} AS t
        SET order_index = v.order_index, updated_at = now()
        FROM UNNEST($1::uuid[], $2::int4[]) AS v(id, order_index)
        WHERE t.id = v.id
        "#
    ))
    .bind(&ids)
    .bind(&indices)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_section_row(conn: &mut PgConnection, section: &Section) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sections (id, page_id, section_type, label, content, order_index, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(section.id)
    .bind(section.page_id)
    .bind(section.kind().as_str())
    .bind(&section.label)
    .bind(section.body.content_json())
    .bind(section.order_index)
    .bind(section.created_at)
    .bind(section.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn save_page(conn: &mut PgConnection, plan: &pages::PagePlan) -> AppResult<()> {
    let page = &plan.page;
    if plan.demote_others {
        sqlx::query(
            "UPDATE pages SET is_homepage = false, updated_at = now() \
             WHERE site_id = $1 AND is_homepage AND id <> $2",
        )
        .bind(page.site_id)
        .bind(page.id)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO pages (id, site_id, title, slug, is_homepage, order_index, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE
        SET title = EXCLUDED.title,
            slug = EXCLUDED.slug,
            is_homepage = EXCLUDED.is_homepage,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(page.id)
    .bind(page.site_id)
    .bind(&page.title)
    .bind(&page.slug)
    .bind(page.is_homepage)
    .bind(page.order_index)
    .bind(page.created_at)
    .bind(page.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| conflict_on(e, "pages_site_slug_key", "Slug is already in use for this site"))?;
    Ok(())
}

#[async_trait]
impl SiteStore for PgStore {
    async fn health_check(&self) -> AppResult<Duration> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn create_site(&self, new: NewSite) -> AppResult<SiteWithSettings> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, SiteRow>(&format!(
            r#"
            INSERT INTO sites (school_id, name, domain, status, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, 'draft', $4, now(), now())
            RETURNING {SITE_COLUMNS}
            "#
        ))
        .bind(new.school_id)
        .bind(&new.name)
        .bind(&new.domain)
        .bind(&new.image_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on(e, "sites_domain_key", "Domain is already in use"))?;
        let site = Site::try_from(row)?;

        let settings = SiteSettings::defaults_for(&site);
        save_settings(&mut tx, &settings).await?;

        tx.commit().await?;
        Ok(SiteWithSettings { site, settings })
    }

    async fn list_sites(&self, filter: SiteFilter) -> AppResult<Vec<Site>> {
        sqlx::query_as::<_, SiteRow>(&format!(
            r#"
            SELECT {SITE_COLUMNS} FROM sites
            WHERE ($1::uuid IS NULL OR school_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.school_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Site::try_from)
        .collect()
    }

    async fn get_site(&self, id: Uuid) -> AppResult<Site> {
        let mut conn = self.pool.acquire().await?;
        fetch_site(&mut conn, id).await
    }

    async fn update_site(&self, id: Uuid, changes: SiteChanges) -> AppResult<SiteWithSettings> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, SiteRow>(&format!(
            r#"
            UPDATE sites
            SET name = COALESCE($2, name),
                domain = COALESCE($3, domain),
                status = COALESCE($4, status),
                image_url = COALESCE($5, image_url),
                updated_at = now()
            WHERE id = $1
            RETURNING {SITE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.domain)
        .bind(changes.status.map(|s| s.as_str()))
        .bind(&changes.image_url)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| conflict_on(e, "sites_domain_key", "Domain is already in use"))?
        .ok_or(AppError::NotFound("Site"))?;
        let site = Site::try_from(row)?;
        let settings = fetch_settings(&mut tx, id).await?;

        tx.commit().await?;
        Ok(SiteWithSettings { site, settings })
    }

    async fn update_site_settings(
        &self,
        site_id: Uuid,
        changes: SiteSettingsChanges,
    ) -> AppResult<SiteSettings> {
        let mut tx = self.pool.begin().await?;
        let mut settings = sqlx::query_as::<_, SiteSettingsRow>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM site_settings WHERE site_id = $1 FOR UPDATE"
        ))
        .bind(site_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(SiteSettings::from)
        .ok_or(AppError::NotFound("Site settings"))?;

        settings.apply(changes);
        save_settings(&mut tx, &settings).await?;

        tx.commit().await?;
        Ok(settings)
    }

    async fn delete_site(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM sites WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Site"));
        }
        Ok(())
    }

    async fn site_tree(&self, id: Uuid) -> AppResult<SiteTree> {
        let mut tx = self.snapshot().await?;
        let site = fetch_site(&mut tx, id).await?;
        let settings = fetch_settings(&mut tx, id).await?;
        let pages = fetch_pages(&mut tx, id).await?;
        let mut sections = fetch_site_sections(&mut tx, id).await?;
        tx.commit().await?;

        let pages = pages
            .into_iter()
            .map(|page| {
                let sections = sections.remove(&page.id).unwrap_or_default();
                PageWithSections { page, sections }
            })
            .collect();
        Ok(SiteTree {
            site,
            settings,
            pages,
        })
    }

    async fn create_page(&self, new: NewPage) -> AppResult<Page> {
        let mut tx = self.pool.begin().await?;
        lock_site(&mut tx, new.site_id).await?;

        let siblings = fetch_pages(&mut tx, new.site_id).await?;
        let plan = pages::plan_create(&siblings, new)?;
        save_page(&mut tx, &plan).await?;

        tx.commit().await?;
        Ok(plan.page)
    }

    async fn list_pages(&self, site_id: Uuid) -> AppResult<Vec<Page>> {
        let mut conn = self.pool.acquire().await?;
        fetch_site(&mut conn, site_id).await?;
        fetch_pages(&mut conn, site_id).await
    }

    async fn get_page(&self, id: Uuid) -> AppResult<Page> {
        let mut conn = self.pool.acquire().await?;
        fetch_page(&mut conn, id).await
    }

    async fn page_with_sections(&self, id: Uuid) -> AppResult<PageWithSections> {
        let mut tx = self.snapshot().await?;
        let page = fetch_page(&mut tx, id).await?;
        let sections = fetch_sections(&mut tx, id).await?;
        tx.commit().await?;
        Ok(PageWithSections { page, sections })
    }

    async fn update_page(&self, id: Uuid, changes: PageChanges) -> AppResult<Page> {
        let mut tx = self.pool.begin().await?;
        let site_id = fetch_page(&mut tx, id).await?.site_id;
        lock_site(&mut tx, site_id).await?;

        let siblings = fetch_pages(&mut tx, site_id).await?;
        let plan = pages::plan_update(&siblings, id, changes)?;
        save_page(&mut tx, &plan).await?;

        tx.commit().await?;
        Ok(plan.page)
    }

    async fn reorder_pages(&self, site_id: Uuid, order: Vec<Uuid>) -> AppResult<Vec<Page>> {
        let mut tx = self.pool.begin().await?;
        lock_site(&mut tx, site_id).await?;

        let mut siblings = fetch_pages(&mut tx, site_id).await?;
        let rewrites = ordering::reorder(&mut siblings, &order)?;
        apply_reindex(&mut tx, "pages", &rewrites).await?;

        let pages = fetch_pages(&mut tx, site_id).await?;
        tx.commit().await?;
        Ok(pages)
    }

    async fn delete_page(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let page = fetch_page(&mut tx, id).await?;
        lock_site(&mut tx, page.site_id).await?;

        let mut siblings = fetch_pages(&mut tx, page.site_id).await?;
        let page = siblings
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(AppError::NotFound("Page"))?;
        pages::check_delete(&siblings, &page)?;
        let (_, rewrites) = ordering::remove(&mut siblings, id)?;

        // Sections go with the page through ON DELETE CASCADE.
        sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        apply_reindex(&mut tx, "pages", &rewrites).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_section(&self, new: NewSection) -> AppResult<Section> {
        let mut tx = self.pool.begin().await?;
        lock_page(&mut tx, new.page_id).await?;

        let mut siblings = fetch_sections(&mut tx, new.page_id).await?;
        let section = Section::draft(new.page_id, new.label, new.body);
        let id = section.id;
        let placement = ordering::insert_at(&mut siblings, new.order_index, section)?;

        apply_reindex(&mut tx, "sections", &placement.shifted).await?;
        let inserted = siblings
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound("Section"))?;
        insert_section_row(&mut tx, &inserted).await?;

        tx.commit().await?;
        tracing::debug!(
            section_id = %id,
            page_id = %inserted.page_id,
            order_index = placement.index,
            shifted = placement.shifted.len(),
            "section inserted"
        );
        Ok(inserted)
    }

    async fn list_sections(&self, page_id: Uuid) -> AppResult<Vec<Section>> {
        let mut conn = self.pool.acquire().await?;
        fetch_page(&mut conn, page_id).await?;
        fetch_sections(&mut conn, page_id).await
    }

    async fn get_section(&self, id: Uuid) -> AppResult<Section> {
        let mut conn = self.pool.acquire().await?;
        fetch_section(&mut conn, id).await
    }

    async fn update_section(&self, id: Uuid, changes: SectionChanges) -> AppResult<Section> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, SectionRow>(&format!(
            "SELECT {SECTION_COLUMNS} FROM sections WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Section"))?;

        let mut section = Section::try_from(row)?;
        section.apply(changes)?;

        sqlx::query(
            r#"
            UPDATE sections
            SET section_type = $2, label = $3, content = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(section.id)
        .bind(section.kind().as_str())
        .bind(&section.label)
        .bind(section.body.content_json())
        .bind(section.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(section)
    }

    async fn move_section(&self, id: Uuid, new_index: i32) -> AppResult<Vec<Section>> {
        let mut tx = self.pool.begin().await?;
        let page_id = fetch_section(&mut tx, id).await?.page_id;
        lock_page(&mut tx, page_id).await?;

        let mut siblings = fetch_sections(&mut tx, page_id).await?;
        let rewrites = ordering::swap_with_occupant(&mut siblings, id, new_index)?;
        apply_reindex(&mut tx, "sections", &rewrites).await?;

        tx.commit().await?;
        Ok(siblings)
    }

    async fn delete_section(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let page_id = fetch_section(&mut tx, id).await?.page_id;
        lock_page(&mut tx, page_id).await?;

        let mut siblings = fetch_sections(&mut tx, page_id).await?;
        let (_, rewrites) = ordering::remove(&mut siblings, id)?;

        sqlx::query("DELETE FROM sections WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        apply_reindex(&mut tx, "sections", &rewrites).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn duplicate_section(&self, id: Uuid) -> AppResult<Section> {
        let mut tx = self.pool.begin().await?;
        let page_id = fetch_section(&mut tx, id).await?.page_id;
        lock_page(&mut tx, page_id).await?;

        let siblings = fetch_sections(&mut tx, page_id).await?;
        let source = siblings
            .iter()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound("Section"))?;
        let copy = source.duplicate(ordering::append_index(&siblings));
        insert_section_row(&mut tx, &copy).await?;

        tx.commit().await?;
        Ok(copy)
    }
}
