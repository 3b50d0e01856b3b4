//! In-process store. Used when no database is configured and in tests.
//!
//! A single `RwLock` guards all data; every mutating call holds the write
//! guard from its first read to its last write.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{
    NewPage, NewSection, NewSite, Page, PageChanges, PageWithSections, Section, SectionChanges,
    Site, SiteChanges, SiteFilter, SiteSettings, SiteSettingsChanges, SiteStatus, SiteTree,
    SiteWithSettings,
};
use crate::db::store::SiteStore;
use crate::error::{AppError, AppResult};
use crate::ordering::{self, Reindex};
use crate::pages;

#[derive(Debug, Default)]
struct Tables {
    sites: HashMap<Uuid, Site>,
    settings: HashMap<Uuid, SiteSettings>,
    pages: HashMap<Uuid, Page>,
    sections: HashMap<Uuid, Section>,
}

impl Tables {
    fn site(&self, id: Uuid) -> AppResult<&Site> {
        self.sites.get(&id).ok_or(AppError::NotFound("Site"))
    }

    fn page(&self, id: Uuid) -> AppResult<&Page> {
        self.pages.get(&id).ok_or(AppError::NotFound("Page"))
    }

    fn section(&self, id: Uuid) -> AppResult<&Section> {
        self.sections.get(&id).ok_or(AppError::NotFound("Section"))
    }

    fn settings_of(&self, site_id: Uuid) -> AppResult<&SiteSettings> {
        self.settings
            .get(&site_id)
            .ok_or(AppError::NotFound("Site settings"))
    }

    fn with_settings(&self, site: Site) -> AppResult<SiteWithSettings> {
        let settings = self.settings_of(site.id)?.clone();
        Ok(SiteWithSettings { site, settings })
    }

    fn page_with_sections(&self, page: Page) -> PageWithSections {
        let sections = self.sections_of(page.id);
        PageWithSections { page, sections }
    }

    fn domain_taken(&self, domain: &str, except: Option<Uuid>) -> bool {
        self.sites
            .values()
            .any(|s| s.domain == domain && Some(s.id) != except)
    }

    fn pages_of(&self, site_id: Uuid) -> Vec<Page> {
        let mut pages: Vec<Page> = self
            .pages
            .values()
            .filter(|p| p.site_id == site_id)
            .cloned()
            .collect();
        ordering::sort_by_rank(&mut pages);
        pages
    }

    fn sections_of(&self, page_id: Uuid) -> Vec<Section> {
        let mut sections: Vec<Section> = self
            .sections
            .values()
            .filter(|s| s.page_id == page_id)
            .cloned()
            .collect();
        ordering::sort_by_rank(&mut sections);
        sections
    }

    fn reindex_pages(&mut self, rewrites: &[Reindex]) {
        let now = Utc::now();
        for rewrite in rewrites {
            if let Some(page) = self.pages.get_mut(&rewrite.id) {
                page.order_index = rewrite.order_index;
                page.updated_at = now;
            }
        }
    }

    fn reindex_sections(&mut self, rewrites: &[Reindex]) {
        let now = Utc::now();
        for rewrite in rewrites {
            if let Some(section) = self.sections.get_mut(&rewrite.id) {
                section.order_index = rewrite.order_index;
                section.updated_at = now;
            }
        }
    }

    fn demote_homepages(&mut self, site_id: Uuid) {
        for page in self.pages.values_mut() {
            if page.site_id == site_id && page.is_homepage {
                page.is_homepage = false;
            }
        }
    }

    fn remove_page_cascade(&mut self, page_id: Uuid) {
        self.sections.retain(|_, s| s.page_id != page_id);
        self.pages.remove(&page_id);
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn health_check(&self) -> AppResult<Duration> {
        let start = Instant::now();
        let _tables = self.tables.read().await;
        Ok(start.elapsed())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create_site(&self, new: NewSite) -> AppResult<SiteWithSettings> {
        let mut tables = self.tables.write().await;
        if tables.domain_taken(&new.domain, None) {
            return Err(AppError::Conflict("Domain is already in use".to_string()));
        }

        let now = Utc::now();
        let site = Site {
            id: Uuid::new_v4(),
            school_id: new.school_id,
            name: new.name,
            domain: new.domain,
            status: SiteStatus::Draft,
            image_url: new.image_url,
            created_at: now,
            updated_at: now,
        };
        let settings = SiteSettings::defaults_for(&site);
        tables.sites.insert(site.id, site.clone());
        tables.settings.insert(site.id, settings.clone());
        Ok(SiteWithSettings { site, settings })
    }

    async fn list_sites(&self, filter: SiteFilter) -> AppResult<Vec<Site>> {
        let tables = self.tables.read().await;
        let mut sites: Vec<Site> = tables
            .sites
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sites)
    }

    async fn get_site(&self, id: Uuid) -> AppResult<Site> {
        let tables = self.tables.read().await;
        tables.site(id).cloned()
    }

    async fn update_site(&self, id: Uuid, changes: SiteChanges) -> AppResult<SiteWithSettings> {
        let mut tables = self.tables.write().await;
        tables.site(id)?;
        if let Some(domain) = changes.domain.as_deref() {
            if tables.domain_taken(domain, Some(id)) {
                return Err(AppError::Conflict("Domain is already in use".to_string()));
            }
        }

        let site = tables
            .sites
            .get_mut(&id)
            .ok_or(AppError::NotFound("Site"))?;
        if let Some(name) = changes.name {
            site.name = name;
        }
        if let Some(domain) = changes.domain {
            site.domain = domain;
        }
        if let Some(status) = changes.status {
            site.status = status;
        }
        if let Some(image_url) = changes.image_url {
            site.image_url = Some(image_url);
        }
        site.updated_at = Utc::now();
        let site = site.clone();
        tables.with_settings(site)
    }

    async fn update_site_settings(
        &self,
        site_id: Uuid,
        changes: SiteSettingsChanges,
    ) -> AppResult<SiteSettings> {
        let mut tables = self.tables.write().await;
        let settings = tables
            .settings
            .get_mut(&site_id)
            .ok_or(AppError::NotFound("Site settings"))?;
        settings.apply(changes);
        Ok(settings.clone())
    }

    async fn delete_site(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.site(id)?;
        let page_ids: Vec<Uuid> = tables.pages_of(id).iter().map(|p| p.id).collect();
        for page_id in page_ids {
            tables.remove_page_cascade(page_id);
        }
        tables.settings.remove(&id);
        tables.sites.remove(&id);
        Ok(())
    }

    async fn site_tree(&self, id: Uuid) -> AppResult<SiteTree> {
        let tables = self.tables.read().await;
        let site = tables.site(id)?.clone();
        let settings = tables.settings_of(id)?.clone();
        let pages = tables
            .pages_of(id)
            .into_iter()
            .map(|page| tables.page_with_sections(page))
            .collect();
        Ok(SiteTree {
            site,
            settings,
            pages,
        })
    }

    async fn create_page(&self, new: NewPage) -> AppResult<Page> {
        let mut tables = self.tables.write().await;
        tables.site(new.site_id)?;

        let site_id = new.site_id;
        let siblings = tables.pages_of(site_id);
        let plan = pages::plan_create(&siblings, new)?;
        if plan.demote_others {
            tables.demote_homepages(site_id);
        }
        tables.pages.insert(plan.page.id, plan.page.clone());
        Ok(plan.page)
    }

    async fn list_pages(&self, site_id: Uuid) -> AppResult<Vec<Page>> {
        let tables = self.tables.read().await;
        tables.site(site_id)?;
        Ok(tables.pages_of(site_id))
    }

    async fn get_page(&self, id: Uuid) -> AppResult<Page> {
        let tables = self.tables.read().await;
        tables.page(id).cloned()
    }

    async fn page_with_sections(&self, id: Uuid) -> AppResult<PageWithSections> {
        let tables = self.tables.read().await;
        let page = tables.page(id)?.clone();
        Ok(tables.page_with_sections(page))
    }

    async fn update_page(&self, id: Uuid, changes: PageChanges) -> AppResult<Page> {
        let mut tables = self.tables.write().await;
        let site_id = tables.page(id)?.site_id;

        let siblings = tables.pages_of(site_id);
        let plan = pages::plan_update(&siblings, id, changes)?;
        if plan.demote_others {
            tables.demote_homepages(site_id);
        }
        tables.pages.insert(plan.page.id, plan.page.clone());
        Ok(plan.page)
    }

    async fn reorder_pages(&self, site_id: Uuid, order: Vec<Uuid>) -> AppResult<Vec<Page>> {
        let mut tables = self.tables.write().await;
        tables.site(site_id)?;

        let mut siblings = tables.pages_of(site_id);
        let rewrites = ordering::reorder(&mut siblings, &order)?;
        tables.reindex_pages(&rewrites);
        Ok(tables.pages_of(site_id))
    }

    async fn delete_page(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let page = tables.page(id)?.clone();

        let mut siblings = tables.pages_of(page.site_id);
        pages::check_delete(&siblings, &page)?;
        let (_, rewrites) = ordering::remove(&mut siblings, id)?;

        tables.remove_page_cascade(id);
        tables.reindex_pages(&rewrites);
        Ok(())
    }

    async fn insert_section(&self, new: NewSection) -> AppResult<Section> {
        let mut tables = self.tables.write().await;
        tables.page(new.page_id)?;

        let mut siblings = tables.sections_of(new.page_id);
        let section = Section::draft(new.page_id, new.label, new.body);
        let id = section.id;
        let placement = ordering::insert_at(&mut siblings, new.order_index, section)?;

        tables.reindex_sections(&placement.shifted);
        let inserted = siblings
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound("Section"))?;
        tables.sections.insert(id, inserted.clone());
        Ok(inserted)
    }

    async fn list_sections(&self, page_id: Uuid) -> AppResult<Vec<Section>> {
        let tables = self.tables.read().await;
        tables.page(page_id)?;
        Ok(tables.sections_of(page_id))
    }

    async fn get_section(&self, id: Uuid) -> AppResult<Section> {
        let tables = self.tables.read().await;
        tables.section(id).cloned()
    }

    async fn update_section(&self, id: Uuid, changes: SectionChanges) -> AppResult<Section> {
        let mut tables = self.tables.write().await;
        let mut section = tables.section(id)?.clone();
        section.apply(changes)?;
        tables.sections.insert(id, section.clone());
        Ok(section)
    }

    async fn move_section(&self, id: Uuid, new_index: i32) -> AppResult<Vec<Section>> {
        let mut tables = self.tables.write().await;
        let page_id = tables.section(id)?.page_id;

        let mut siblings = tables.sections_of(page_id);
        let rewrites = ordering::swap_with_occupant(&mut siblings, id, new_index)?;
        tables.reindex_sections(&rewrites);
        Ok(tables.sections_of(page_id))
    }

    async fn delete_section(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let page_id = tables.section(id)?.page_id;

        let mut siblings = tables.sections_of(page_id);
        let (_, rewrites) = ordering::remove(&mut siblings, id)?;

        tables.sections.remove(&id);
        tables.reindex_sections(&rewrites);
        Ok(())
    }

    async fn duplicate_section(&self, id: Uuid) -> AppResult<Section> {
        let mut tables = self.tables.write().await;
        let source = tables.section(id)?.clone();

        let siblings = tables.sections_of(source.page_id);
        let copy = source.duplicate(ordering::append_index(&siblings));
        tables.sections.insert(copy.id, copy.clone());
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{HeadingContent, SectionBody, SectionKind};
    use crate::ordering::is_contiguous;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn site_with_page(store: &MemoryStore) -> (Site, Page) {
        let site = store
            .create_site(NewSite {
                school_id: None,
                name: "Riverside Academy".to_string(),
                domain: "riverside".to_string(),
                image_url: None,
            })
            .await
            .unwrap()
            .site;
        let page = store
            .create_page(NewPage {
                site_id: site.id,
                title: "Home".to_string(),
                slug: "home".to_string(),
                is_homepage: true,
            })
            .await
            .unwrap();
        (site, page)
    }

    async fn insert(store: &MemoryStore, page_id: Uuid, kind: SectionKind, index: i32) -> Section {
        store
            .insert_section(NewSection {
                page_id,
                label: Some(kind.display_name().to_string()),
                body: SectionBody::from_parts(kind, json!({})).unwrap(),
                order_index: index,
            })
            .await
            .unwrap()
    }

    async fn kinds(store: &MemoryStore, page_id: Uuid) -> Vec<(SectionKind, i32)> {
        store
            .list_sections(page_id)
            .await
            .unwrap()
            .iter()
            .map(|s| (s.kind(), s.order_index))
            .collect()
    }

    #[tokio::test]
    async fn test_insert_then_delete_scenario() {
        let store = MemoryStore::new();
        let (_, page) = site_with_page(&store).await;

        let heading = insert(&store, page.id, SectionKind::Heading, 0).await;
        insert(&store, page.id, SectionKind::Hero, 1).await;
        insert(&store, page.id, SectionKind::Cta, 2).await;
        insert(&store, page.id, SectionKind::Testimonials, 1).await;

        assert_eq!(
            kinds(&store, page.id).await,
            vec![
                (SectionKind::Heading, 0),
                (SectionKind::Testimonials, 1),
                (SectionKind::Hero, 2),
                (SectionKind::Cta, 3),
            ]
        );

        store.delete_section(heading.id).await.unwrap();
        assert_eq!(
            kinds(&store, page.id).await,
            vec![
                (SectionKind::Testimonials, 0),
                (SectionKind::Hero, 1),
                (SectionKind::Cta, 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_into_missing_page() {
        let store = MemoryStore::new();
        let err = store
            .insert_section(NewSection {
                page_id: Uuid::new_v4(),
                label: None,
                body: SectionBody::Heading(HeadingContent::default()),
                order_index: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Page")));
    }

    #[tokio::test]
    async fn test_move_swaps_only_two_sections() {
        let store = MemoryStore::new();
        let (_, page) = site_with_page(&store).await;
        let a = insert(&store, page.id, SectionKind::Hero, 0).await;
        for (i, kind) in [SectionKind::Features, SectionKind::Cta, SectionKind::Video, SectionKind::News]
            .into_iter()
            .enumerate()
        {
            insert(&store, page.id, kind, i as i32 + 1).await;
        }

        let sections = store.move_section(a.id, 3).await.unwrap();
        let layout: Vec<(SectionKind, i32)> =
            sections.iter().map(|s| (s.kind(), s.order_index)).collect();
        assert_eq!(
            layout,
            vec![
                (SectionKind::Video, 0),
                (SectionKind::Features, 1),
                (SectionKind::Cta, 2),
                (SectionKind::Hero, 3),
                (SectionKind::News, 4),
            ]
        );

        let err = store.move_section(a.id, 9).await.unwrap_err();
        assert!(matches!(err, AppError::TargetNotFound));
        assert!(is_contiguous(&store.list_sections(page.id).await.unwrap()));
    }

    #[tokio::test]
    async fn test_duplicate_appends() {
        let store = MemoryStore::new();
        let (_, page) = site_with_page(&store).await;
        let first = insert(&store, page.id, SectionKind::Hero, 0).await;
        insert(&store, page.id, SectionKind::Cta, 1).await;
        insert(&store, page.id, SectionKind::News, 2).await;

        let copy = store.duplicate_section(first.id).await.unwrap();
        assert_eq!(copy.order_index, 3);
        assert_eq!(copy.label.as_deref(), Some("Hero (Copy)"));
        assert_eq!(copy.body, first.body);

        let layout = kinds(&store, page.id).await;
        assert_eq!(layout[0], (SectionKind::Hero, 0));
        assert_eq!(layout[3], (SectionKind::Hero, 3));
    }

    #[tokio::test]
    async fn test_update_keeps_order_index() {
        let store = MemoryStore::new();
        let (_, page) = site_with_page(&store).await;
        insert(&store, page.id, SectionKind::Hero, 0).await;
        let cta = insert(&store, page.id, SectionKind::Cta, 1).await;

        let updated = store
            .update_section(
                cta.id,
                SectionChanges {
                    label: Some("Join us".to_string()),
                    content: Some(json!({ "title": "Open day" })),
                    ..SectionChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.order_index, 1);
        assert_eq!(updated.label.as_deref(), Some("Join us"));
        assert_eq!(updated.body.content_json()["title"], "Open day");
    }

    #[tokio::test]
    async fn test_page_lifecycle_keeps_one_homepage() {
        let store = MemoryStore::new();
        let (site, home) = site_with_page(&store).await;
        let about = store
            .create_page(NewPage {
                site_id: site.id,
                title: "About".to_string(),
                slug: "about".to_string(),
                is_homepage: false,
            })
            .await
            .unwrap();

        let err = store
            .update_page(
                home.id,
                PageChanges {
                    is_homepage: Some(false),
                    ..PageChanges::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::HomepageRequired(_)));

        store
            .update_page(
                about.id,
                PageChanges {
                    is_homepage: Some(true),
                    ..PageChanges::default()
                },
            )
            .await
            .unwrap();
        let pages = store.list_pages(site.id).await.unwrap();
        let homepages: Vec<&str> = pages
            .iter()
            .filter(|p| p.is_homepage)
            .map(|p| p.slug.as_str())
            .collect();
        assert_eq!(homepages, vec!["about"]);

        assert!(matches!(
            store.delete_page(about.id).await,
            Err(AppError::HomepageRequired(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_page_cascades_and_compacts() {
        let store = MemoryStore::new();
        let (site, _home) = site_with_page(&store).await;
        let mut extra = Vec::new();
        for slug in ["news", "contact", "faq"] {
            extra.push(
                store
                    .create_page(NewPage {
                        site_id: site.id,
                        title: slug.to_string(),
                        slug: slug.to_string(),
                        is_homepage: false,
                    })
                    .await
                    .unwrap(),
            );
        }
        let section = insert(&store, extra[0].id, SectionKind::News, 0).await;

        store.delete_page(extra[0].id).await.unwrap();

        let pages = store.list_pages(site.id).await.unwrap();
        let slugs: Vec<(&str, i32)> = pages
            .iter()
            .map(|p| (p.slug.as_str(), p.order_index))
            .collect();
        assert_eq!(slugs, vec![("home", 0), ("contact", 1), ("faq", 2)]);
        assert!(matches!(
            store.get_section(section.id).await,
            Err(AppError::NotFound("Section"))
        ));
    }

    #[tokio::test]
    async fn test_reorder_pages() {
        let store = MemoryStore::new();
        let (site, home) = site_with_page(&store).await;
        let about = store
            .create_page(NewPage {
                site_id: site.id,
                title: "About".to_string(),
                slug: "about".to_string(),
                is_homepage: false,
            })
            .await
            .unwrap();

        let pages = store
            .reorder_pages(site.id, vec![about.id, home.id])
            .await
            .unwrap();
        assert_eq!(pages[0].id, about.id);
        assert_eq!(pages[1].order_index, 1);

        let err = store.reorder_pages(site.id, vec![about.id]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_site_domain_conflict_and_cascade() {
        let store = MemoryStore::new();
        let (site, page) = site_with_page(&store).await;
        insert(&store, page.id, SectionKind::Hero, 0).await;

        let err = store
            .create_site(NewSite {
                school_id: None,
                name: "Copycat".to_string(),
                domain: "riverside".to_string(),
                image_url: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        store.delete_site(site.id).await.unwrap();
        assert!(store.get_page(page.id).await.is_err());
        assert!(store.list_sites(SiteFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_site_settings_lifecycle() {
        let store = MemoryStore::new();
        let (site, _page) = site_with_page(&store).await;

        let tree = store.site_tree(site.id).await.unwrap();
        assert_eq!(tree.settings.colors.accent, "#007bff");
        assert_eq!(tree.settings.seo.title.as_deref(), Some("Riverside Academy"));

        let settings = store
            .update_site_settings(
                site.id,
                SiteSettingsChanges {
                    colors: Some(crate::db::models::ColorChanges {
                        primary: Some("#123456".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(settings.colors.primary, "#123456");
        assert_eq!(settings.colors.secondary, "#ffffff");

        store.delete_site(site.id).await.unwrap();
        let err = store
            .update_site_settings(site.id, SiteSettingsChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Site settings")));
    }

    #[tokio::test]
    async fn test_site_tree_nests_pages_and_sections_in_order() {
        let store = MemoryStore::new();
        let (site, home) = site_with_page(&store).await;
        let about = store
            .create_page(NewPage {
                site_id: site.id,
                title: "About".to_string(),
                slug: "about".to_string(),
                is_homepage: false,
            })
            .await
            .unwrap();
        insert(&store, home.id, SectionKind::Hero, 0).await;
        insert(&store, home.id, SectionKind::Heading, 0).await;
        insert(&store, about.id, SectionKind::StaffDirectory, 0).await;

        let tree = store.site_tree(site.id).await.unwrap();
        let layout: Vec<(&str, Vec<SectionKind>)> = tree
            .pages
            .iter()
            .map(|p| {
                (
                    p.page.slug.as_str(),
                    p.sections.iter().map(|s| s.kind()).collect(),
                )
            })
            .collect();
        assert_eq!(
            layout,
            vec![
                ("home", vec![SectionKind::Heading, SectionKind::Hero]),
                ("about", vec![SectionKind::StaffDirectory]),
            ]
        );

        let page = store.page_with_sections(home.id).await.unwrap();
        assert_eq!(page.sections.len(), 2);
        assert!(matches!(
            store.page_with_sections(Uuid::new_v4()).await,
            Err(AppError::NotFound("Page"))
        ));
        assert!(matches!(
            store.site_tree(Uuid::new_v4()).await,
            Err(AppError::NotFound("Site"))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_stay_contiguous() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let (_, page) = site_with_page(&store).await;
        let page_id = page.id;

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_section(NewSection {
                        page_id,
                        label: None,
                        body: SectionBody::Heading(HeadingContent::default()),
                        order_index: i % 5,
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let sections = store.list_sections(page_id).await.unwrap();
        assert_eq!(sections.len(), 32);
        assert!(is_contiguous(&sections));
    }
}
