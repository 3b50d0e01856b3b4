//! Storage seam for sites, pages and sections.
//!
//! Every mutating call is atomic: implementations run it under a lock on the
//! owning parent (the site for page writes, the page for section writes), so
//! concurrent requests against the same parent are serialized and the
//! `order_index` sequences stay contiguous.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{
    NewPage, NewSection, NewSite, Page, PageChanges, PageWithSections, Section, SectionChanges,
    Site, SiteChanges, SiteFilter, SiteSettings, SiteSettingsChanges, SiteTree, SiteWithSettings,
};
use crate::error::AppResult;

#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Round-trip to the backing store, returning its latency.
    async fn health_check(&self) -> AppResult<Duration>;

    /// Short name of the backend, for logs and health output.
    fn backend(&self) -> &'static str;

    // Sites

    /// Create a site together with its default settings.
    async fn create_site(&self, new: NewSite) -> AppResult<SiteWithSettings>;

    /// Sites matching `filter`, newest first.
    async fn list_sites(&self, filter: SiteFilter) -> AppResult<Vec<Site>>;

    async fn get_site(&self, id: Uuid) -> AppResult<Site>;

    async fn update_site(&self, id: Uuid, changes: SiteChanges) -> AppResult<SiteWithSettings>;

    /// Merge `changes` into the site's settings.
    async fn update_site_settings(
        &self,
        site_id: Uuid,
        changes: SiteSettingsChanges,
    ) -> AppResult<SiteSettings>;

    /// Delete a site together with its settings, pages and their sections.
    async fn delete_site(&self, id: Uuid) -> AppResult<()>;

    /// The site, its settings and every page with its sections, read from
    /// one consistent snapshot.
    async fn site_tree(&self, id: Uuid) -> AppResult<SiteTree>;

    // Pages

    async fn create_page(&self, new: NewPage) -> AppResult<Page>;

    /// Pages of a site sorted by `order_index`.
    async fn list_pages(&self, site_id: Uuid) -> AppResult<Vec<Page>>;

    async fn get_page(&self, id: Uuid) -> AppResult<Page>;

    /// A page and its ordered sections from one consistent snapshot.
    async fn page_with_sections(&self, id: Uuid) -> AppResult<PageWithSections>;

    async fn update_page(&self, id: Uuid, changes: PageChanges) -> AppResult<Page>;

    /// Re-rank every page of the site in the order given.
    async fn reorder_pages(&self, site_id: Uuid, order: Vec<Uuid>) -> AppResult<Vec<Page>>;

    /// Delete a page and its sections, compacting the remaining pages.
    async fn delete_page(&self, id: Uuid) -> AppResult<()>;

    // Sections

    /// Insert at `new.order_index`, shifting the sections at or after it.
    async fn insert_section(&self, new: NewSection) -> AppResult<Section>;

    /// Sections of a page sorted by `order_index`.
    async fn list_sections(&self, page_id: Uuid) -> AppResult<Vec<Section>>;

    async fn get_section(&self, id: Uuid) -> AppResult<Section>;

    /// Change type, label or content. Never touches `order_index`.
    async fn update_section(&self, id: Uuid, changes: SectionChanges) -> AppResult<Section>;

    /// Swap the section with the one at `new_index`, returning the page's
    /// sections in order.
    async fn move_section(&self, id: Uuid, new_index: i32) -> AppResult<Vec<Section>>;

    /// Remove the section and close the gap behind it.
    async fn delete_section(&self, id: Uuid) -> AppResult<()>;

    /// Copy the section to the end of its page.
    async fn duplicate_section(&self, id: Uuid) -> AppResult<Section>;
}
