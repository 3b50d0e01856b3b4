//! Page rules that span a whole site: slug uniqueness and the single
//! homepage. Stores call these while holding the site lock, against the
//! site's current pages.

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use crate::db::models::{NewPage, Page, PageChanges};
use crate::error::{AppError, AppResult};
use crate::ordering;

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

fn check_slug(siblings: &[Page], slug: &str, except: Option<Uuid>) -> AppResult<()> {
    if !is_valid_slug(slug) {
        return Err(AppError::validation(
            "Slug must contain only lowercase letters, numbers, and hyphens",
        ));
    }
    if siblings
        .iter()
        .any(|p| p.slug == slug && Some(p.id) != except)
    {
        return Err(AppError::Conflict(
            "Slug is already in use for this site".to_string(),
        ));
    }
    Ok(())
}

fn check_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    Ok(())
}

fn other_homepage_exists(siblings: &[Page], page_id: Uuid) -> bool {
    siblings.iter().any(|p| p.is_homepage && p.id != page_id)
}

/// Outcome of planning a page write.
#[derive(Debug, Clone)]
pub struct PagePlan {
    /// The page as it must be stored.
    pub page: Page,
    /// Clear `is_homepage` on every other page of the site first.
    pub demote_others: bool,
}

/// Build the page row for a creation request.
///
/// The page is appended after its siblings. The first page of a site is
/// always its homepage; asking for a homepage later moves the flag.
pub fn plan_create(siblings: &[Page], new: NewPage) -> AppResult<PagePlan> {
    check_title(&new.title)?;
    let slug = new.slug.trim().to_string();
    check_slug(siblings, &slug, None)?;

    let has_homepage = siblings.iter().any(|p| p.is_homepage);
    let is_homepage = new.is_homepage || !has_homepage;
    let now = Utc::now();

    Ok(PagePlan {
        page: Page {
            id: Uuid::new_v4(),
            site_id: new.site_id,
            title: new.title.trim().to_string(),
            slug,
            is_homepage,
            order_index: ordering::append_index(siblings),
            created_at: now,
            updated_at: now,
        },
        demote_others: new.is_homepage && has_homepage,
    })
}

/// Apply `changes` to the page `id` among `siblings`.
pub fn plan_update(siblings: &[Page], id: Uuid, changes: PageChanges) -> AppResult<PagePlan> {
    let mut page = siblings
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .ok_or(AppError::NotFound("Page"))?;

    if let Some(title) = changes.title {
        check_title(&title)?;
        page.title = title.trim().to_string();
    }

    if let Some(slug) = changes.slug {
        let slug = slug.trim().to_string();
        if slug != page.slug {
            check_slug(siblings, &slug, Some(page.id))?;
            page.slug = slug;
        }
    }

    let mut demote_others = false;
    match changes.is_homepage {
        Some(true) => {
            demote_others = other_homepage_exists(siblings, page.id);
            page.is_homepage = true;
        }
        Some(false) if page.is_homepage => {
            if !other_homepage_exists(siblings, page.id) {
                return Err(AppError::HomepageRequired(
                    "Cannot remove homepage status: site must have a homepage",
                ));
            }
            page.is_homepage = false;
        }
        Some(false) | None => {}
    }

    page.updated_at = Utc::now();
    Ok(PagePlan {
        page,
        demote_others,
    })
}

/// Refuse deleting the page that holds the site's homepage flag.
pub fn check_delete(siblings: &[Page], page: &Page) -> AppResult<()> {
    if page.is_homepage && !other_homepage_exists(siblings, page.id) {
        return Err(AppError::HomepageRequired("Cannot delete the only homepage"));
    }
    Ok(())
}
