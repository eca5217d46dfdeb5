//! SQLite storage implementation.
//!
//! A file-based storage backend using SQLite. Good for:
//! - Operator tooling (the `catalog` CLI)
//! - Single-server deployments
//! - Testing with persistent data
//!
//! Unique indexes on `external_resources.url` and
//! `(external_resources.id_type, external_resources.id_value)` back the
//! insert-or-fetch contract; a violation surfaces as
//! `CatalogError::UniqueViolation`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{CatalogError, Result};
use crate::traits::store::{AuditLog, CatalogStore, ItemStore, ResourceStore};
use crate::types::{
    audit::AuditEntry,
    id_type::IdType,
    item::{Item, ItemId, ItemModel, NewItem},
    resource::{ExternalResource, NewResource, ResourceId},
};

/// SQLite-based catalog store.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn db_err(e: sqlx::Error) -> CatalogError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return CatalogError::UniqueViolation {
                constraint: db.message().to_string(),
            };
        }
    }
    CatalogError::Storage(Box::new(e))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|e| CatalogError::storage(format!("Invalid date: {}", e)))?
        .with_timezone(&Utc))
}

fn parse_model(s: &str) -> Result<ItemModel> {
    ItemModel::from_name(s).ok_or_else(|| CatalogError::storage(format!("Invalid model: {}", s)))
}

const ITEM_COLUMNS: &str = "id, uid, model, primary_lookup_id_type, primary_lookup_id_value, \
    metadata, cover, parent_item, merged_to_item, is_deleted, created_time, edited_time";

const RESOURCE_COLUMNS: &str = "id, item, id_type, id_value, url, cover, other_lookup_ids, \
    metadata, scraped_time, created_time, edited_time, required_resources, related_resources, \
    prematched_resources";

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://catalog.db?mode=rwc` - File-based, create if not exists
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    ///
    /// Limited to one connection since every connection to `:memory:` opens
    /// its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uid TEXT NOT NULL UNIQUE,
                model TEXT NOT NULL,
                primary_lookup_id_type TEXT,
                primary_lookup_id_value TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                cover TEXT,
                parent_item INTEGER REFERENCES items(id),
                merged_to_item INTEGER REFERENCES items(id),
                is_deleted INTEGER NOT NULL DEFAULT 0,
                created_time TEXT NOT NULL,
                edited_time TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_lookup
                ON items(primary_lookup_id_type, primary_lookup_id_value);
            CREATE INDEX IF NOT EXISTS idx_items_merged_to ON items(merged_to_item);
            CREATE INDEX IF NOT EXISTS idx_items_parent ON items(parent_item);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS external_resources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item INTEGER REFERENCES items(id),
                id_type TEXT NOT NULL,
                id_value TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                cover TEXT,
                other_lookup_ids TEXT NOT NULL DEFAULT '{}',
                metadata TEXT NOT NULL DEFAULT '{}',
                scraped_time TEXT,
                created_time TEXT NOT NULL,
                edited_time TEXT NOT NULL,
                required_resources TEXT NOT NULL DEFAULT '[]',
                related_resources TEXT NOT NULL DEFAULT '[]',
                prematched_resources TEXT NOT NULL DEFAULT '[]',
                UNIQUE (id_type, id_value)
            );

            CREATE INDEX IF NOT EXISTS idx_resources_item ON external_resources(item);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item INTEGER NOT NULL,
                action TEXT NOT NULL,
                before TEXT,
                after TEXT,
                actor TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_item ON audit_log(item);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_items(&self, filter: &str, id: i64) -> Result<Vec<Item>> {
        let sql = format!("SELECT {} FROM items WHERE {} = ? ORDER BY id", ITEM_COLUMNS, filter);
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(ItemRow::into_item).collect()
    }
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct ItemRow {
    id: i64,
    uid: String,
    model: String,
    primary_lookup_id_type: Option<String>,
    primary_lookup_id_value: Option<String>,
    metadata: String,
    cover: Option<String>,
    parent_item: Option<i64>,
    merged_to_item: Option<i64>,
    is_deleted: bool,
    created_time: String,
    edited_time: String,
}

impl ItemRow {
    fn into_item(self) -> Result<Item> {
        let uid = self
            .uid
            .parse()
            .map_err(|e| CatalogError::storage(format!("Invalid uid: {}", e)))?;
        let primary_lookup_id_type = self
            .primary_lookup_id_type
            .as_deref()
            .map(str::parse::<IdType>)
            .transpose()?;

        Ok(Item {
            id: ItemId(self.id),
            uid,
            model: parse_model(&self.model)?,
            primary_lookup_id_type,
            primary_lookup_id_value: self.primary_lookup_id_value,
            metadata: serde_json::from_str(&self.metadata)?,
            cover: self.cover,
            parent_item: self.parent_item.map(ItemId),
            merged_to_item: self.merged_to_item.map(ItemId),
            is_deleted: self.is_deleted,
            created_time: parse_time(&self.created_time)?,
            edited_time: parse_time(&self.edited_time)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct ResourceRow {
    id: i64,
    item: Option<i64>,
    id_type: String,
    id_value: String,
    url: String,
    cover: Option<String>,
    other_lookup_ids: String,
    metadata: String,
    scraped_time: Option<String>,
    created_time: String,
    edited_time: String,
    required_resources: String,
    related_resources: String,
    prematched_resources: String,
}

impl ResourceRow {
    fn into_resource(self) -> Result<ExternalResource> {
        Ok(ExternalResource {
            id: ResourceId(self.id),
            item: self.item.map(ItemId),
            id_type: self.id_type.parse()?,
            id_value: self.id_value,
            url: self.url,
            cover: self.cover,
            other_lookup_ids: serde_json::from_str(&self.other_lookup_ids)?,
            metadata: serde_json::from_str(&self.metadata)?,
            scraped_time: self.scraped_time.as_deref().map(parse_time).transpose()?,
            created_time: parse_time(&self.created_time)?,
            edited_time: parse_time(&self.edited_time)?,
            required_resources: serde_json::from_str(&self.required_resources)?,
            related_resources: serde_json::from_str(&self.related_resources)?,
            prematched_resources: serde_json::from_str(&self.prematched_resources)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    item: i64,
    action: String,
    before: Option<String>,
    after: Option<String>,
    actor: Option<String>,
    timestamp: String,
}

impl AuditRow {
    fn into_entry(self) -> Result<AuditEntry> {
        Ok(AuditEntry {
            item: ItemId(self.item),
            action: self.action.parse()?,
            before: self.before,
            after: self.after,
            actor: self.actor,
            timestamp: parse_time(&self.timestamp)?,
        })
    }
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.fetch_items("id", id.0).await?.into_iter().next())
    }

    async fn create_item(&self, item: NewItem) -> Result<Item> {
        let mut item = item.into_item(ItemId(0));
        let metadata = serde_json::to_string(&item.metadata)?;

        let result = sqlx::query(
            r#"
            INSERT INTO items (uid, model, primary_lookup_id_type, primary_lookup_id_value,
                metadata, cover, parent_item, merged_to_item, is_deleted, created_time, edited_time)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.uid.to_string())
        .bind(item.model.as_str())
        .bind(item.primary_lookup_id_type.map(IdType::as_str))
        .bind(&item.primary_lookup_id_value)
        .bind(&metadata)
        .bind(&item.cover)
        .bind(item.parent_item.map(|i| i.0))
        .bind(item.merged_to_item.map(|i| i.0))
        .bind(item.is_deleted)
        .bind(item.created_time.to_rfc3339())
        .bind(item.edited_time.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        item.id = ItemId(result.last_insert_rowid());
        Ok(item)
    }

    async fn update_item(&self, item: &Item) -> Result<()> {
        let metadata = serde_json::to_string(&item.metadata)?;
        let result = sqlx::query(
            r#"
            UPDATE items SET
                primary_lookup_id_type = ?,
                primary_lookup_id_value = ?,
                metadata = ?,
                cover = ?,
                parent_item = ?,
                merged_to_item = ?,
                is_deleted = ?,
                edited_time = ?
            WHERE id = ?
            "#,
        )
        .bind(item.primary_lookup_id_type.map(IdType::as_str))
        .bind(&item.primary_lookup_id_value)
        .bind(&metadata)
        .bind(&item.cover)
        .bind(item.parent_item.map(|i| i.0))
        .bind(item.merged_to_item.map(|i| i.0))
        .bind(item.is_deleted)
        .bind(Utc::now().to_rfc3339())
        .bind(item.id.0)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::ItemNotFound(item.id));
        }
        Ok(())
    }

    async fn update_item_content(&self, item: &Item) -> Result<()> {
        let metadata = serde_json::to_string(&item.metadata)?;
        let result = sqlx::query(
            r#"
            UPDATE items SET
                primary_lookup_id_type = ?,
                primary_lookup_id_value = ?,
                metadata = ?,
                cover = ?,
                edited_time = ?
            WHERE id = ?
            "#,
        )
        .bind(item.primary_lookup_id_type.map(IdType::as_str))
        .bind(&item.primary_lookup_id_value)
        .bind(&metadata)
        .bind(&item.cover)
        .bind(Utc::now().to_rfc3339())
        .bind(item.id.0)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::ItemNotFound(item.id));
        }
        Ok(())
    }

    async fn set_item_parent(&self, id: ItemId, parent: Option<ItemId>) -> Result<()> {
        let result = sqlx::query("UPDATE items SET parent_item = ?, edited_time = ? WHERE id = ?")
            .bind(parent.map(|i| i.0))
            .bind(Utc::now().to_rfc3339())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::ItemNotFound(id));
        }
        Ok(())
    }

    async fn find_item_by_lookup_id(
        &self,
        model: ItemModel,
        id_type: IdType,
        value: &str,
    ) -> Result<Option<Item>> {
        let sql = format!(
            "SELECT {} FROM items WHERE model = ? AND primary_lookup_id_type = ? \
             AND primary_lookup_id_value = ? ORDER BY id LIMIT 1",
            ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(model.as_str())
            .bind(id_type.as_str())
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(ItemRow::into_item).transpose()
    }

    async fn items_merged_into(&self, id: ItemId) -> Result<Vec<Item>> {
        self.fetch_items("merged_to_item", id.0).await
    }

    async fn child_items(&self, id: ItemId) -> Result<Vec<Item>> {
        self.fetch_items("parent_item", id.0).await
    }

    async fn list_items(&self) -> Result<Vec<Item>> {
        let sql = format!("SELECT {} FROM items ORDER BY id", ITEM_COLUMNS);
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(ItemRow::into_item).collect()
    }
}

#[async_trait]
impl ResourceStore for SqliteStore {
    async fn get_resource(&self, id: ResourceId) -> Result<Option<ExternalResource>> {
        let sql = format!("SELECT {} FROM external_resources WHERE id = ?", RESOURCE_COLUMNS);
        let row = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(ResourceRow::into_resource).transpose()
    }

    async fn get_resource_by_url(&self, url: &str) -> Result<Option<ExternalResource>> {
        let sql = format!("SELECT {} FROM external_resources WHERE url = ?", RESOURCE_COLUMNS);
        let row = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(ResourceRow::into_resource).transpose()
    }

    async fn get_resource_by_lookup(
        &self,
        id_type: IdType,
        id_value: &str,
    ) -> Result<Option<ExternalResource>> {
        let sql = format!(
            "SELECT {} FROM external_resources WHERE id_type = ? AND id_value = ?",
            RESOURCE_COLUMNS
        );
        let row = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(id_type.as_str())
            .bind(id_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(ResourceRow::into_resource).transpose()
    }

    async fn insert_resource(&self, resource: NewResource) -> Result<ExternalResource> {
        let mut resource = resource.into_resource(ResourceId(0));
        let result = sqlx::query(
            r#"
            INSERT INTO external_resources (id_type, id_value, url, created_time, edited_time)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(resource.id_type.as_str())
        .bind(&resource.id_value)
        .bind(&resource.url)
        .bind(resource.created_time.to_rfc3339())
        .bind(resource.edited_time.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        resource.id = ResourceId(result.last_insert_rowid());
        Ok(resource)
    }

    async fn update_resource(&self, resource: &ExternalResource) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE external_resources SET
                item = ?,
                cover = ?,
                other_lookup_ids = ?,
                metadata = ?,
                scraped_time = ?,
                edited_time = ?,
                required_resources = ?,
                related_resources = ?,
                prematched_resources = ?
            WHERE id = ?
            "#,
        )
        .bind(resource.item.map(|i| i.0))
        .bind(&resource.cover)
        .bind(serde_json::to_string(&resource.other_lookup_ids)?)
        .bind(serde_json::to_string(&resource.metadata)?)
        .bind(resource.scraped_time.map(|t| t.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .bind(serde_json::to_string(&resource.required_resources)?)
        .bind(serde_json::to_string(&resource.related_resources)?)
        .bind(serde_json::to_string(&resource.prematched_resources)?)
        .bind(resource.id.0)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::ResourceNotFound(resource.id.to_string()));
        }
        Ok(())
    }

    async fn resources_for_item(&self, item: ItemId) -> Result<Vec<ExternalResource>> {
        let sql = format!(
            "SELECT {} FROM external_resources WHERE item = ? ORDER BY id",
            RESOURCE_COLUMNS
        );
        let rows = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(item.0)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(ResourceRow::into_resource).collect()
    }
}

#[async_trait]
impl AuditLog for SqliteStore {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_log (item, action, before, after, actor, timestamp) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.item.0)
        .bind(entry.action.as_str())
        .bind(&entry.before)
        .bind(&entry.after)
        .bind(&entry.actor)
        .bind(entry.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn entries_for_item(&self, item: ItemId) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT item, action, before, after, actor, timestamp FROM audit_log WHERE item = ? ORDER BY id",
        )
        .bind(item.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(AuditRow::into_entry).collect()
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn commit_merge(&self, item: ItemId, target: ItemId) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Target must still be terminal at write time
        let updated = sqlx::query(
            r#"
            UPDATE items SET merged_to_item = ?, edited_time = ?
            WHERE id = ?
              AND EXISTS (SELECT 1 FROM items WHERE id = ? AND merged_to_item IS NULL)
            "#,
        )
        .bind(target.0)
        .bind(&now)
        .bind(item.0)
        .bind(target.0)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            let target_row: Option<(Option<i64>,)> =
                sqlx::query_as("SELECT merged_to_item FROM items WHERE id = ?")
                    .bind(target.0)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err)?;
            return Err(match target_row {
                None => CatalogError::ItemNotFound(target),
                Some((Some(merged_to),)) => CatalogError::TargetAlreadyMerged {
                    item,
                    target,
                    merged_to: ItemId(merged_to),
                },
                Some((None,)) => CatalogError::ItemNotFound(item),
            });
        }

        let relinked = sqlx::query("UPDATE external_resources SET item = ?, edited_time = ? WHERE item = ?")
            .bind(target.0)
            .bind(&now)
            .bind(item.0)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(relinked.rows_affected() as usize)
    }

    async fn commit_clear(&self, item: &Item) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let metadata = serde_json::to_string(&item.metadata)?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated = sqlx::query(
            r#"
            UPDATE items SET
                primary_lookup_id_type = ?,
                primary_lookup_id_value = ?,
                metadata = ?,
                cover = ?,
                parent_item = ?,
                merged_to_item = ?,
                is_deleted = ?,
                edited_time = ?
            WHERE id = ?
            "#,
        )
        .bind(item.primary_lookup_id_type.map(IdType::as_str))
        .bind(&item.primary_lookup_id_value)
        .bind(&metadata)
        .bind(&item.cover)
        .bind(item.parent_item.map(|i| i.0))
        .bind(item.merged_to_item.map(|i| i.0))
        .bind(item.is_deleted)
        .bind(&now)
        .bind(item.id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            return Err(CatalogError::ItemNotFound(item.id));
        }

        let unlinked = sqlx::query("UPDATE external_resources SET item = NULL, edited_time = ? WHERE item = ?")
            .bind(&now)
            .bind(item.id.0)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(unlinked.rows_affected() as usize)
    }

    async fn replace_item_model(&self, item: ItemId, model: ItemModel) -> Result<Item> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let updated = sqlx::query("UPDATE items SET model = ?, edited_time = ? WHERE id = ?")
            .bind(model.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(item.0)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            return Err(CatalogError::ItemNotFound(item));
        }

        let sql = format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS);
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item.0)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        row.into_item()
    }
}
