//! Persistence port.
//!
//! [`InventoryStore`] is everything the engine needs from storage: the saved
//! template per inventory, the custom IDs already in use, a per-inventory
//! sequence counter and minimal item records. Adapters must enforce
//! uniqueness of `(inventory_id, custom_id)` themselves; the engine's
//! pre-insert check is not enough under concurrency.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::element::{CustomIdConfig, CustomIdElement};
use crate::errors::StoreResult;
use crate::types::{ConfigVersion, CustomId, InventoryId, ItemId, ItemVersion, Timestamp};

/// Expected template version for optimistic concurrency control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedVersion {
    /// No template may exist yet
    New,
    /// The stored template must have exactly this version
    Exact(ConfigVersion),
    /// Any state is acceptable (last writer wins)
    #[default]
    Any,
}

impl ExpectedVersion {
    /// Whether a template currently at `current` satisfies this expectation.
    pub fn admits(self, current: Option<ConfigVersion>) -> bool {
        match self {
            Self::New => current.is_none(),
            Self::Exact(expected) => current == Some(expected),
            Self::Any => true,
        }
    }

    /// The version the caller named, for error reporting.
    pub const fn expected(self) -> Option<ConfigVersion> {
        match self {
            Self::Exact(version) => Some(version),
            Self::New | Self::Any => None,
        }
    }
}

/// An item about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    /// Storage identifier
    pub item_id: ItemId,
    /// Owning inventory
    pub inventory_id: InventoryId,
    /// Custom ID, if the inventory generates one or the caller supplied one
    pub custom_id: Option<CustomId>,
}

impl NewItem {
    /// Creates an insert request with a freshly generated item id.
    pub fn new(inventory_id: InventoryId, custom_id: Option<CustomId>) -> Self {
        Self {
            item_id: ItemId::generate(),
            inventory_id,
            custom_id,
        }
    }
}

/// A stored inventory item, reduced to what custom IDs care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    /// Storage identifier
    pub id: ItemId,
    /// Owning inventory
    pub inventory_id: InventoryId,
    /// Business-facing identifier, unique within the inventory
    pub custom_id: Option<CustomId>,
    /// Optimistic-lock version, starting at 1
    pub version: ItemVersion,
    /// Insert time
    pub created_at: Timestamp,
}

/// Storage backend for templates, sequence counters and items.
///
/// Implementations must be safe to share between concurrently running
/// requests.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Loads the saved template of an inventory, `None` when there is none.
    ///
    /// Elements are returned in ascending `order`.
    async fn load_config(&self, inventory_id: &InventoryId) -> StoreResult<Option<CustomIdConfig>>;

    /// Replaces the whole template of an inventory in one atomic step.
    ///
    /// # Returns
    /// The stored template with its new version (1 on first save).
    ///
    /// # Errors
    /// * `StoreError::ConfigVersionConflict` - If `expected` does not admit
    ///   the stored version
    async fn replace_config(
        &self,
        inventory_id: &InventoryId,
        elements: Vec<CustomIdElement>,
        expected: ExpectedVersion,
    ) -> StoreResult<CustomIdConfig>;

    /// Lists every custom ID currently used in an inventory.
    async fn custom_ids(&self, inventory_id: &InventoryId) -> StoreResult<Vec<CustomId>>;

    /// Checks whether `custom_id` is used in the inventory by any item other
    /// than `except`.
    async fn custom_id_taken(
        &self,
        inventory_id: &InventoryId,
        custom_id: &CustomId,
        except: Option<ItemId>,
    ) -> StoreResult<bool>;

    /// Reserves the next sequence number of an inventory.
    ///
    /// Atomically stores and returns `max(counter, floor) + 1`, where
    /// `counter` is the last reserved value (0 when nothing was reserved).
    /// Concurrent callers always receive distinct values.
    async fn advance_sequence(&self, inventory_id: &InventoryId, floor: u64) -> StoreResult<u64>;

    /// Returns the last reserved sequence number (0 when none) without
    /// changing it.
    async fn peek_sequence(&self, inventory_id: &InventoryId) -> StoreResult<u64>;

    /// Loads an item.
    ///
    /// # Errors
    /// * `StoreError::ItemNotFound` - If the item does not exist
    async fn load_item(&self, item_id: ItemId) -> StoreResult<InventoryItem>;

    /// Inserts an item at version 1.
    ///
    /// # Errors
    /// * `StoreError::DuplicateCustomId` - If the custom ID is already used in
    ///   the inventory
    async fn insert_item(&self, item: NewItem) -> StoreResult<InventoryItem>;

    /// Changes the custom ID of an item and bumps its version.
    ///
    /// # Errors
    /// * `StoreError::ItemNotFound` - If the item does not exist
    /// * `StoreError::ItemVersionConflict` - If `expected` is set and differs
    ///   from the stored version
    /// * `StoreError::DuplicateCustomId` - If another item of the inventory
    ///   already uses the custom ID
    async fn set_item_custom_id(
        &self,
        item_id: ItemId,
        custom_id: Option<CustomId>,
        expected: Option<ItemVersion>,
    ) -> StoreResult<InventoryItem>;

    /// Deletes an item. The sequence counter is left untouched.
    ///
    /// # Errors
    /// * `StoreError::ItemNotFound` - If the item does not exist
    async fn delete_item(&self, item_id: ItemId) -> StoreResult<()>;

    /// Deletes the template, the sequence counter and every item of an
    /// inventory. Deleting an unknown inventory is not an error.
    async fn delete_inventory(&self, inventory_id: &InventoryId) -> StoreResult<()>;
}

#[async_trait]
impl<T> InventoryStore for Arc<T>
where
    T: InventoryStore + ?Sized,
{
    async fn load_config(&self, inventory_id: &InventoryId) -> StoreResult<Option<CustomIdConfig>> {
        (**self).load_config(inventory_id).await
    }

    async fn replace_config(
        &self,
        inventory_id: &InventoryId,
        elements: Vec<CustomIdElement>,
        expected: ExpectedVersion,
    ) -> StoreResult<CustomIdConfig> {
        (**self)
            .replace_config(inventory_id, elements, expected)
            .await
    }

    async fn custom_ids(&self, inventory_id: &InventoryId) -> StoreResult<Vec<CustomId>> {
        (**self).custom_ids(inventory_id).await
    }

    async fn custom_id_taken(
        &self,
        inventory_id: &InventoryId,
        custom_id: &CustomId,
        except: Option<ItemId>,
    ) -> StoreResult<bool> {
        (**self)
            .custom_id_taken(inventory_id, custom_id, except)
            .await
    }

    async fn advance_sequence(&self, inventory_id: &InventoryId, floor: u64) -> StoreResult<u64> {
        (**self).advance_sequence(inventory_id, floor).await
    }

    async fn peek_sequence(&self, inventory_id: &InventoryId) -> StoreResult<u64> {
        (**self).peek_sequence(inventory_id).await
    }

    async fn load_item(&self, item_id: ItemId) -> StoreResult<InventoryItem> {
        (**self).load_item(item_id).await
    }

    async fn insert_item(&self, item: NewItem) -> StoreResult<InventoryItem> {
        (**self).insert_item(item).await
    }

    async fn set_item_custom_id(
        &self,
        item_id: ItemId,
        custom_id: Option<CustomId>,
        expected: Option<ItemVersion>,
    ) -> StoreResult<InventoryItem> {
        (**self)
            .set_item_custom_id(item_id, custom_id, expected)
            .await
    }

    async fn delete_item(&self, item_id: ItemId) -> StoreResult<()> {
        (**self).delete_item(item_id).await
    }

    async fn delete_inventory(&self, inventory_id: &InventoryId) -> StoreResult<()> {
        (**self).delete_inventory(inventory_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_version_admits() {
        let v1 = ConfigVersion::initial();
        let v2 = v1.next();

        assert!(ExpectedVersion::New.admits(None));
        assert!(!ExpectedVersion::New.admits(Some(v1)));

        assert!(ExpectedVersion::Exact(v1).admits(Some(v1)));
        assert!(!ExpectedVersion::Exact(v1).admits(Some(v2)));
        assert!(!ExpectedVersion::Exact(v1).admits(None));

        assert!(ExpectedVersion::Any.admits(None));
        assert!(ExpectedVersion::Any.admits(Some(v2)));
    }

    #[test]
    fn new_items_get_distinct_ids() {
        let inventory = InventoryId::try_new("inv").unwrap();
        let first = NewItem::new(inventory.clone(), None);
        let second = NewItem::new(inventory, None);
        assert_ne!(first.item_id, second.item_id);
    }
}
