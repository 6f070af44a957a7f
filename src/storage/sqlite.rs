//! SQLite catalog storage.
//!
//! `sqlite::memory:` gives an ephemeral catalog for tests; production runs
//! point at a file URL such as `sqlite://listings.db`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use tracing::{debug, info};

use crate::error::{Result, ScrapeError};
use crate::models::{ExtractedData, ListingMeta, PropertyRecord, DEFAULT_CURRENCY};
use crate::storage::{coerce_integer, coerce_price, ListingStore, UpsertOutcome};

const CREATE_PROPERTIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS properties (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    address TEXT,
    price INTEGER NOT NULL,
    currency TEXT NOT NULL DEFAULT 'CZK',
    usable_area INTEGER,
    latitude REAL,
    longitude REAL,
    image_urls TEXT NOT NULL DEFAULT '[]',
    meta_data TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// Only title, price and updated_at are refreshed on conflict
const UPSERT_PROPERTY: &str = r#"
INSERT INTO properties (
    external_id, title, description, address, price, currency, usable_area,
    latitude, longitude, image_urls, meta_data, created_at, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (external_id) DO UPDATE SET
    title = excluded.title,
    price = excluded.price,
    updated_at = excluded.updated_at
"#;

const COUNT_BY_EXTERNAL_ID: &str = "SELECT COUNT(*) FROM properties WHERE external_id = ?";

pub struct SqliteListingRepository {
    pool: SqlitePool,
}

impl SqliteListingRepository {
    /// Connect (creating the database file if needed) and ensure the table exists
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool_options = if database_url.contains(":memory:") {
            // Every connection to `:memory:` is a separate database, so keep
            // exactly one alive for the lifetime of the pool
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        let repository = Self { pool };
        repository.migrate().await?;
        info!(database_url, "Catalog ready");
        Ok(repository)
    }

    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_PROPERTIES_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM properties")
            .fetch_one(&self.pool)
            .await
    }

    /// Upsert with an explicit timestamp for both insert and refresh paths.
    ///
    /// The existence check and the write share a transaction, so the outcome
    /// does not depend on the timestamps stored in the row.
    pub async fn upsert_at(&self, data: &ExtractedData, now: DateTime<Utc>) -> Result<UpsertOutcome> {
        let persistence = |source: sqlx::Error| ScrapeError::Persistence {
            external_id: data.external_id.clone(),
            source,
        };

        let mut tx = self.pool.begin().await.map_err(persistence)?;

        let existing: i64 = sqlx::query_scalar(COUNT_BY_EXTERNAL_ID)
            .bind(&data.external_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(persistence)?;

        sqlx::query(UPSERT_PROPERTY)
            .bind(&data.external_id)
            .bind(&data.title)
            .bind(&data.description)
            .bind(&data.address)
            .bind(coerce_price(data.price))
            .bind(DEFAULT_CURRENCY)
            .bind(coerce_integer(data.usable_area.as_deref()))
            .bind(data.latitude)
            .bind(data.longitude)
            .bind(Json(&data.image_urls))
            .bind(Json(ListingMeta::from(data)))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;

        tx.commit().await.map_err(persistence)?;

        let outcome = if existing == 0 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Refreshed
        };
        debug!(external_id = %data.external_id, ?outcome, "Listing upserted");
        Ok(outcome)
    }
}

#[async_trait]
impl ListingStore for SqliteListingRepository {
    async fn upsert(&self, data: &ExtractedData) -> Result<UpsertOutcome> {
        self.upsert_at(data, Utc::now()).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PropertyRecord>> {
        sqlx::query_as::<_, PropertyRecord>(
            r#"
            SELECT id, external_id, title, description, address, price, currency, usable_area,
                   latitude, longitude, image_urls, meta_data, created_at, updated_at
            FROM properties
            WHERE external_id = ?
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| ScrapeError::Persistence {
            external_id: external_id.to_string(),
            source,
        })
    }
}
