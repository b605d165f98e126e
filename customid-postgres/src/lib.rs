//! PostgreSQL adapter for the `customid` engine
//!
//! Templates, sequence counters and items live in four tables (see
//! `migrations/`). Uniqueness of `(inventory_id, custom_id)` is a table
//! constraint, sequence reservation is a single upsert, and template replace
//! runs in one transaction holding the config row lock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use customid::element::{CustomIdConfig, CustomIdElement, Element, ElementType};
use customid::errors::{StoreError, StoreResult};
use customid::store::{ExpectedVersion, InventoryItem, InventoryStore, NewItem};
use customid::types::{ConfigVersion, CustomId, InventoryId, ItemId, ItemVersion, Timestamp};
use nutype::nutype;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{query, Pool, Postgres, Row};
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Errors raised while setting up the store.
#[derive(Debug, Error)]
pub enum PostgresInventoryStoreError {
    /// The connection pool could not be created.
    #[error("failed to create postgres connection pool")]
    ConnectionFailed(#[source] sqlx::Error),

    /// The schema migrations failed.
    #[error("failed to run postgres migrations")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}

/// Maximum number of database connections in the pool.
///
/// Must be at least 1, enforced by using `NonZeroU32` as the underlying type.
///
/// # Examples
///
/// ```ignore
/// use customid_postgres::MaxConnections;
/// use std::num::NonZeroU32;
///
/// let small_pool = MaxConnections::new(NonZeroU32::new(5).expect("5 is non-zero"));
/// ```
#[nutype(derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRef, Into))]
pub struct MaxConnections(NonZeroU32);

/// Configuration for the `PostgresInventoryStore` connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: MaxConnections,
    /// Timeout for acquiring a connection from the pool (default: 30 seconds)
    pub acquire_timeout: Duration,
    /// Idle timeout for connections in the pool (default: 10 minutes)
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        const DEFAULT_MAX_CONNECTIONS: NonZeroU32 = match NonZeroU32::new(10) {
            Some(v) => v,
            None => unreachable!(),
        };

        Self {
            max_connections: MaxConnections::new(DEFAULT_MAX_CONNECTIONS),
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// `InventoryStore` backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Pool<Postgres>,
}

impl PostgresInventoryStore {
    /// Connect with the default pool configuration.
    pub async fn new<S: Into<String>>(
        connection_string: S,
    ) -> Result<Self, PostgresInventoryStoreError> {
        Self::with_config(connection_string, PostgresConfig::default()).await
    }

    /// Connect with a custom pool configuration.
    pub async fn with_config<S: Into<String>>(
        connection_string: S,
        config: PostgresConfig,
    ) -> Result<Self, PostgresInventoryStoreError> {
        let connection_string = connection_string.into();
        let max_connections: NonZeroU32 = config.max_connections.into();
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.get())
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&connection_string)
            .await
            .map_err(PostgresInventoryStoreError::ConnectionFailed)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool, e.g. one shared with the rest of the
    /// application.
    pub const fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), PostgresInventoryStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(PostgresInventoryStoreError::MigrationFailed)?;
        info!("[postgres.migrate] custom ID schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(name = "postgres.load_config", skip(self))]
    async fn load_config(&self, inventory_id: &InventoryId) -> StoreResult<Option<CustomIdConfig>> {
        let rows = query(
            "SELECT c.version, c.updated_at, e.position, e.element_type, e.format, e.value
             FROM custom_id_configs c
             LEFT JOIN custom_id_elements e ON e.inventory_id = c.inventory_id
             WHERE c.inventory_id = $1
             ORDER BY e.position ASC",
        )
        .bind(inventory_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "load_config"))?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let version = config_version(first.try_get("version").map_err(corrupt)?)?;
        let updated_at: DateTime<Utc> = first.try_get("updated_at").map_err(corrupt)?;

        let mut elements = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(element) = element_from_row(row)? {
                elements.push(element);
            }
        }

        Ok(Some(CustomIdConfig {
            inventory_id: inventory_id.clone(),
            elements,
            version,
            updated_at: Timestamp::new(updated_at),
        }))
    }

    #[instrument(name = "postgres.replace_config", skip(self, elements), fields(elements = elements.len()))]
    async fn replace_config(
        &self,
        inventory_id: &InventoryId,
        mut elements: Vec<CustomIdElement>,
        expected: ExpectedVersion,
    ) -> StoreResult<CustomIdConfig> {
        elements.sort_by_key(|element| element.order);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| map_sqlx_error(error, "begin_transaction"))?;

        // Each statement takes the config row lock and holds it until commit.
        let claimed = match expected {
            ExpectedVersion::Any => query(
                "INSERT INTO custom_id_configs (inventory_id, version, updated_at)
                 VALUES ($1, 1, now())
                 ON CONFLICT (inventory_id)
                 DO UPDATE SET version = custom_id_configs.version + 1, updated_at = now()
                 RETURNING version, updated_at",
            )
            .bind(inventory_id.as_str())
            .fetch_optional(&mut *tx)
            .await,
            ExpectedVersion::New => query(
                "INSERT INTO custom_id_configs (inventory_id, version, updated_at)
                 VALUES ($1, 1, now())
                 ON CONFLICT (inventory_id) DO NOTHING
                 RETURNING version, updated_at",
            )
            .bind(inventory_id.as_str())
            .fetch_optional(&mut *tx)
            .await,
            ExpectedVersion::Exact(version) => query(
                "UPDATE custom_id_configs
                 SET version = version + 1, updated_at = now()
                 WHERE inventory_id = $1 AND version = $2
                 RETURNING version, updated_at",
            )
            .bind(inventory_id.as_str())
            .bind(to_i64(version.into_inner())?)
            .fetch_optional(&mut *tx)
            .await,
        }
        .map_err(|error| map_sqlx_error(error, "replace_config"))?;

        let Some(row) = claimed else {
            let current: Option<i64> =
                query("SELECT version FROM custom_id_configs WHERE inventory_id = $1")
                    .bind(inventory_id.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|error| map_sqlx_error(error, "replace_config"))?
                    .map(|row| row.try_get("version"))
                    .transpose()
                    .map_err(corrupt)?;
            let current = current.map(config_version).transpose()?;
            warn!(
                inventory = %inventory_id,
                ?expected,
                ?current,
                "[postgres.version_conflict] custom ID template version check failed"
            );
            return Err(StoreError::ConfigVersionConflict {
                inventory_id: inventory_id.clone(),
                expected: expected.expected(),
                current,
            });
        };
        let version = config_version(row.try_get("version").map_err(corrupt)?)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(corrupt)?;

        query("DELETE FROM custom_id_elements WHERE inventory_id = $1")
            .bind(inventory_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|error| map_sqlx_error(error, "replace_config"))?;

        for element in &elements {
            query(
                "INSERT INTO custom_id_elements (inventory_id, position, element_type, format, value)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(inventory_id.as_str())
            .bind(i64::from(element.order))
            .bind(element.element_type().as_str())
            .bind(element.format.as_str())
            .bind(element.element.value())
            .execute(&mut *tx)
            .await
            .map_err(|error| map_sqlx_error(error, "replace_config"))?;
        }

        tx.commit()
            .await
            .map_err(|error| map_sqlx_error(error, "commit_transaction"))?;

        info!(
            inventory = %inventory_id,
            version = %version,
            "[postgres.replace_config] custom ID template stored"
        );
        Ok(CustomIdConfig {
            inventory_id: inventory_id.clone(),
            elements,
            version,
            updated_at: Timestamp::new(updated_at),
        })
    }

    #[instrument(name = "postgres.custom_ids", skip(self))]
    async fn custom_ids(&self, inventory_id: &InventoryId) -> StoreResult<Vec<CustomId>> {
        let rows = query(
            "SELECT custom_id FROM inventory_items
             WHERE inventory_id = $1 AND custom_id IS NOT NULL
             ORDER BY custom_id",
        )
        .bind(inventory_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "custom_ids"))?;

        rows.iter()
            .map(|row| custom_id(row.try_get("custom_id").map_err(corrupt)?))
            .collect()
    }

    #[instrument(name = "postgres.custom_id_taken", skip(self))]
    async fn custom_id_taken(
        &self,
        inventory_id: &InventoryId,
        custom_id: &CustomId,
        except: Option<ItemId>,
    ) -> StoreResult<bool> {
        let row = query(
            "SELECT EXISTS (
                 SELECT 1 FROM inventory_items
                 WHERE inventory_id = $1 AND custom_id = $2
                   AND ($3::uuid IS NULL OR item_id <> $3)
             ) AS taken",
        )
        .bind(inventory_id.as_str())
        .bind(custom_id.as_str())
        .bind(except.map(ItemId::into_inner))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "custom_id_taken"))?;

        row.try_get("taken").map_err(corrupt)
    }

    #[instrument(name = "postgres.advance_sequence", skip(self))]
    async fn advance_sequence(&self, inventory_id: &InventoryId, floor: u64) -> StoreResult<u64> {
        let row = query(
            "INSERT INTO custom_id_sequences (inventory_id, last_value)
             VALUES ($1, $2 + 1)
             ON CONFLICT (inventory_id)
             DO UPDATE SET last_value = GREATEST(custom_id_sequences.last_value, $2) + 1
             RETURNING last_value",
        )
        .bind(inventory_id.as_str())
        .bind(to_i64(floor)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "advance_sequence"))?;

        to_u64(row.try_get("last_value").map_err(corrupt)?)
    }

    #[instrument(name = "postgres.peek_sequence", skip(self))]
    async fn peek_sequence(&self, inventory_id: &InventoryId) -> StoreResult<u64> {
        let row = query("SELECT last_value FROM custom_id_sequences WHERE inventory_id = $1")
            .bind(inventory_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, "peek_sequence"))?;

        match row {
            Some(row) => to_u64(row.try_get("last_value").map_err(corrupt)?),
            None => Ok(0),
        }
    }

    #[instrument(name = "postgres.load_item", skip(self))]
    async fn load_item(&self, item_id: ItemId) -> StoreResult<InventoryItem> {
        let row = query(
            "SELECT item_id, inventory_id, custom_id, version, created_at
             FROM inventory_items WHERE item_id = $1",
        )
        .bind(item_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, "load_item"))?
        .ok_or(StoreError::ItemNotFound(item_id))?;

        item_from_row(&row)
    }

    #[instrument(name = "postgres.insert_item", skip(self, item), fields(item = %item.item_id))]
    async fn insert_item(&self, item: NewItem) -> StoreResult<InventoryItem> {
        let result = query(
            "INSERT INTO inventory_items (item_id, inventory_id, custom_id, version, created_at)
             VALUES ($1, $2, $3, 1, now())
             RETURNING item_id, inventory_id, custom_id, version, created_at",
        )
        .bind(item.item_id.into_inner())
        .bind(item.inventory_id.as_str())
        .bind(item.custom_id.as_deref().map(String::as_str))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => item_from_row(&row),
            Err(error) if is_unique_violation(&error) => match item.custom_id {
                Some(custom_id) => Err(duplicate(item.inventory_id, custom_id)),
                None => Err(map_sqlx_error(error, "insert_item")),
            },
            Err(error) => Err(map_sqlx_error(error, "insert_item")),
        }
    }

    #[instrument(name = "postgres.set_item_custom_id", skip(self))]
    async fn set_item_custom_id(
        &self,
        item_id: ItemId,
        custom_id: Option<CustomId>,
        expected: Option<ItemVersion>,
    ) -> StoreResult<InventoryItem> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| map_sqlx_error(error, "begin_transaction"))?;

        let current = query(
            "SELECT inventory_id, version FROM inventory_items WHERE item_id = $1 FOR UPDATE",
        )
        .bind(item_id.into_inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|error| map_sqlx_error(error, "set_item_custom_id"))?
        .ok_or(StoreError::ItemNotFound(item_id))?;

        let inventory_id = inventory_id(current.try_get("inventory_id").map_err(corrupt)?)?;
        let current_version = item_version(current.try_get("version").map_err(corrupt)?)?;
        if let Some(expected) = expected {
            if expected != current_version {
                return Err(StoreError::ItemVersionConflict {
                    item_id,
                    expected,
                    current: current_version,
                });
            }
        }

        let result = query(
            "UPDATE inventory_items SET custom_id = $2, version = version + 1
             WHERE item_id = $1
             RETURNING item_id, inventory_id, custom_id, version, created_at",
        )
        .bind(item_id.into_inner())
        .bind(custom_id.as_deref().map(String::as_str))
        .fetch_one(&mut *tx)
        .await;

        let row = match result {
            Ok(row) => row,
            Err(error) if is_unique_violation(&error) => match custom_id {
                Some(custom_id) => return Err(duplicate(inventory_id, custom_id)),
                None => return Err(map_sqlx_error(error, "set_item_custom_id")),
            },
            Err(error) => return Err(map_sqlx_error(error, "set_item_custom_id")),
        };

        tx.commit()
            .await
            .map_err(|error| map_sqlx_error(error, "commit_transaction"))?;
        item_from_row(&row)
    }

    #[instrument(name = "postgres.delete_item", skip(self))]
    async fn delete_item(&self, item_id: ItemId) -> StoreResult<()> {
        let result = query("DELETE FROM inventory_items WHERE item_id = $1")
            .bind(item_id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, "delete_item"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ItemNotFound(item_id));
        }
        Ok(())
    }

    #[instrument(name = "postgres.delete_inventory", skip(self))]
    async fn delete_inventory(&self, inventory_id: &InventoryId) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| map_sqlx_error(error, "begin_transaction"))?;

        for statement in [
            "DELETE FROM inventory_items WHERE inventory_id = $1",
            "DELETE FROM custom_id_sequences WHERE inventory_id = $1",
            "DELETE FROM custom_id_configs WHERE inventory_id = $1",
        ] {
            query(statement)
                .bind(inventory_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|error| map_sqlx_error(error, "delete_inventory"))?;
        }

        tx.commit()
            .await
            .map_err(|error| map_sqlx_error(error, "commit_transaction"))?;
        info!(inventory = %inventory_id, "[postgres.delete_inventory] inventory custom ID state removed");
        Ok(())
    }
}

fn element_from_row(row: &PgRow) -> StoreResult<Option<CustomIdElement>> {
    // LEFT JOIN yields one all-NULL element row for a template without elements.
    let Some(position): Option<i64> = row.try_get("position").map_err(corrupt)? else {
        return Ok(None);
    };
    let type_name: String = row.try_get("element_type").map_err(corrupt)?;
    let kind: ElementType = type_name
        .parse()
        .map_err(|error| StoreError::Corrupt(format!("{error}")))?;
    let format: String = row.try_get("format").map_err(corrupt)?;
    let value: Option<String> = row.try_get("value").map_err(corrupt)?;
    let order = u32::try_from(position)
        .map_err(|_| StoreError::Corrupt(format!("element position {position} out of range")))?;

    Ok(Some(CustomIdElement::new(
        Element::from_parts(kind, value),
        format,
        order,
    )))
}

fn item_from_row(row: &PgRow) -> StoreResult<InventoryItem> {
    let id: Uuid = row.try_get("item_id").map_err(corrupt)?;
    let custom_id_text: Option<String> = row.try_get("custom_id").map_err(corrupt)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;

    Ok(InventoryItem {
        id: ItemId::new(id),
        inventory_id: inventory_id(row.try_get("inventory_id").map_err(corrupt)?)?,
        custom_id: custom_id_text.map(custom_id).transpose()?,
        version: item_version(row.try_get("version").map_err(corrupt)?)?,
        created_at: Timestamp::new(created_at),
    })
}

fn inventory_id(raw: String) -> StoreResult<InventoryId> {
    InventoryId::try_new(raw).map_err(|error| StoreError::Corrupt(error.to_string()))
}

fn custom_id(raw: String) -> StoreResult<CustomId> {
    CustomId::try_new(raw).map_err(|error| StoreError::Corrupt(error.to_string()))
}

fn config_version(raw: i64) -> StoreResult<ConfigVersion> {
    to_u64(raw).map(ConfigVersion::new)
}

fn item_version(raw: i64) -> StoreResult<ItemVersion> {
    to_u64(raw).map(ItemVersion::new)
}

fn to_u64(raw: i64) -> StoreResult<u64> {
    u64::try_from(raw).map_err(|_| StoreError::Corrupt(format!("negative counter value {raw}")))
}

fn to_i64(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::Database {
        operation: "encode",
        detail: format!("value {value} exceeds the BIGINT range"),
    })
}

fn corrupt(error: sqlx::Error) -> StoreError {
    StoreError::Corrupt(error.to_string())
}

fn duplicate(inventory_id: InventoryId, custom_id: CustomId) -> StoreError {
    warn!(
        inventory = %inventory_id,
        custom_id = %custom_id,
        "[postgres.duplicate_custom_id] unique constraint rejected custom ID"
    );
    StoreError::DuplicateCustomId {
        inventory_id,
        custom_id,
    }
}

// 23505: unique_violation
fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_error) if db_error.code().as_deref() == Some("23505"))
}

fn map_sqlx_error(error: sqlx::Error, operation: &'static str) -> StoreError {
    match &error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            error!(
                error = %error,
                operation,
                "[postgres.connection_failed] database unreachable"
            );
            StoreError::ConnectionFailed(error.to_string())
        }
        _ => {
            error!(
                error = %error,
                operation,
                "[postgres.database_error] database operation failed"
            );
            StoreError::Database {
                operation,
                detail: error.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_ten_connections() {
        let config = PostgresConfig::default();
        let max: NonZeroU32 = config.max_connections.into();
        assert_eq!(max.get(), 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
    }

    #[test]
    fn negative_counters_are_corrupt() {
        assert!(matches!(to_u64(-1), Err(StoreError::Corrupt(_))));
        assert_eq!(to_u64(42).unwrap(), 42);
    }

    #[test]
    fn oversized_values_cannot_be_encoded() {
        assert!(to_i64(u64::MAX).is_err());
        assert_eq!(to_i64(7).unwrap(), 7);
    }

    #[test]
    fn pool_timeouts_map_to_connection_failures() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut, "load_config"),
            StoreError::ConnectionFailed(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound, "load_item"),
            StoreError::Database {
                operation: "load_item",
                ..
            }
        ));
    }
}
