pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use url::Url;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::SiteStore;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

/// Connection URL safe for logs: credentials masked, query dropped.
fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return "<unparseable database url>".to_string();
    };
    if !url.username().is_empty() || url.password().is_some() {
        if url.set_password(None).is_err() || url.set_username("***").is_err() {
            return format!("{}://***", url.scheme());
        }
    }
    url.set_query(None);
    url.to_string()
}

pub async fn init_pool(url: &str, config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Initializing database connection pool...");
    tracing::debug!("Database URL: {}", redact_url(url));

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    Ok(pool)
}

/// Schema statements, applied one at a time; each is idempotent.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sites (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        school_id UUID,
        name TEXT NOT NULL,
        domain TEXT UNIQUE NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sites_school_id ON sites(school_id)",
    "ALTER TABLE sites ADD COLUMN IF NOT EXISTS image_url TEXT",
    r##"
    CREATE TABLE IF NOT EXISTS site_settings (
        site_id UUID PRIMARY KEY REFERENCES sites(id) ON DELETE CASCADE,
        colors JSONB NOT NULL DEFAULT '{"primary": "#000000", "secondary": "#ffffff", "accent": "#007bff", "background": "#ffffff", "text": "#000000"}',
        fonts JSONB NOT NULL DEFAULT '{"heading": "Arial", "body": "Arial"}',
        logo_url TEXT,
        favicon_url TEXT,
        social_links JSONB NOT NULL DEFAULT '{}',
        analytics JSONB NOT NULL DEFAULT '{}',
        seo JSONB NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "##,
    // Sites created before settings existed get the stock defaults.
    r#"
    INSERT INTO site_settings (site_id, seo)
    SELECT id, jsonb_build_object('title', name, 'description', '', 'keywords', '[]'::jsonb)
    FROM sites
    ON CONFLICT (site_id) DO NOTHING
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pages (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        site_id UUID NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        slug TEXT NOT NULL,
        is_homepage BOOLEAN NOT NULL DEFAULT false,
        order_index INTEGER NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT pages_site_slug_key UNIQUE (site_id, slug),
        CONSTRAINT pages_site_order_key UNIQUE (site_id, order_index)
            DEFERRABLE INITIALLY DEFERRED
    )
    "#,
    // At most one homepage per site; the application keeps it at exactly one.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_pages_site_homepage
        ON pages(site_id) WHERE is_homepage
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sections (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        page_id UUID NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
        section_type TEXT NOT NULL,
        label TEXT,
        content JSONB NOT NULL,
        order_index INTEGER NOT NULL CHECK (order_index >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT sections_page_order_key UNIQUE (page_id, order_index)
            DEFERRABLE INITIALLY DEFERRED
    )
    "#,
];

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    for statement in MIGRATIONS {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

/// Pick the store: Postgres when `DATABASE_URL` is set and reachable,
/// otherwise the in-memory store.
pub async fn connect_store(config: &DbConfig) -> Arc<dyn SiteStore> {
    let Some(url) = config.url.as_deref() else {
        tracing::info!("DATABASE_URL not set. Running with the in-memory store.");
        return Arc::new(MemoryStore::new());
    };

    match init_pool(url, config).await {
        Ok(pool) => {
            if let Err(e) = run_migrations(&pool).await {
                tracing::error!("Failed to run database migrations: {}", e);
            }
            Arc::new(PgStore::new(pool))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize database pool: {}. Continuing with the in-memory store.",
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}
