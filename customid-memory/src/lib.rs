//! In-memory adapter for the `customid` engine
//!
//! This crate provides an in-memory implementation of the `InventoryStore`
//! trait from the customid crate, useful for testing and development
//! scenarios where persistence is not required. It enforces the same
//! constraints as the database adapter: unique custom IDs per inventory,
//! atomic sequence reservation and optimistic versions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use customid::errors::{StoreError, StoreResult};
use customid::store::{ExpectedVersion, InventoryItem, InventoryStore, NewItem};
use customid::types::{ConfigVersion, CustomId, InventoryId, ItemId, ItemVersion, Timestamp};
use customid::{CustomIdConfig, CustomIdElement};
use parking_lot::RwLock;
use tracing::trace;

#[derive(Debug, Default)]
struct State {
    configs: HashMap<InventoryId, CustomIdConfig>,
    // Last reserved sequence value per inventory
    sequences: HashMap<InventoryId, u64>,
    items: HashMap<ItemId, InventoryItem>,
    // Unique index over (inventory, custom ID)
    custom_ids: HashMap<(InventoryId, CustomId), ItemId>,
}

/// Thread-safe in-memory inventory store for testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryInventoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently stored across all inventories
    pub fn item_count(&self) -> usize {
        self.state.read().items.len()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn load_config(&self, inventory_id: &InventoryId) -> StoreResult<Option<CustomIdConfig>> {
        Ok(self.state.read().configs.get(inventory_id).cloned())
    }

    async fn replace_config(
        &self,
        inventory_id: &InventoryId,
        mut elements: Vec<CustomIdElement>,
        expected: ExpectedVersion,
    ) -> StoreResult<CustomIdConfig> {
        let mut state = self.state.write();

        let current = state.configs.get(inventory_id).map(|config| config.version);
        if !expected.admits(current) {
            return Err(StoreError::ConfigVersionConflict {
                inventory_id: inventory_id.clone(),
                expected: expected.expected(),
                current,
            });
        }

        elements.sort_by_key(|element| element.order);
        let config = CustomIdConfig {
            inventory_id: inventory_id.clone(),
            elements,
            version: current.map_or_else(ConfigVersion::initial, ConfigVersion::next),
            updated_at: Timestamp::now(),
        };
        state.configs.insert(inventory_id.clone(), config.clone());
        trace!(inventory = %inventory_id, version = %config.version, "[memory.replace_config]");
        Ok(config)
    }

    async fn custom_ids(&self, inventory_id: &InventoryId) -> StoreResult<Vec<CustomId>> {
        let state = self.state.read();
        let mut custom_ids: Vec<CustomId> = state
            .custom_ids
            .keys()
            .filter(|(inventory, _)| inventory == inventory_id)
            .map(|(_, custom_id)| custom_id.clone())
            .collect();
        custom_ids.sort();
        Ok(custom_ids)
    }

    async fn custom_id_taken(
        &self,
        inventory_id: &InventoryId,
        custom_id: &CustomId,
        except: Option<ItemId>,
    ) -> StoreResult<bool> {
        let state = self.state.read();
        let key = (inventory_id.clone(), custom_id.clone());
        Ok(state
            .custom_ids
            .get(&key)
            .is_some_and(|owner| Some(*owner) != except))
    }

    async fn advance_sequence(&self, inventory_id: &InventoryId, floor: u64) -> StoreResult<u64> {
        let mut state = self.state.write();
        let last = state.sequences.entry(inventory_id.clone()).or_insert(0);
        *last = (*last).max(floor).saturating_add(1);
        Ok(*last)
    }

    async fn peek_sequence(&self, inventory_id: &InventoryId) -> StoreResult<u64> {
        Ok(self
            .state
            .read()
            .sequences
            .get(inventory_id)
            .copied()
            .unwrap_or(0))
    }

    async fn load_item(&self, item_id: ItemId) -> StoreResult<InventoryItem> {
        self.state
            .read()
            .items
            .get(&item_id)
            .cloned()
            .ok_or(StoreError::ItemNotFound(item_id))
    }

    async fn insert_item(&self, item: NewItem) -> StoreResult<InventoryItem> {
        let mut state = self.state.write();

        if let Some(custom_id) = &item.custom_id {
            let key = (item.inventory_id.clone(), custom_id.clone());
            if state.custom_ids.contains_key(&key) {
                return Err(StoreError::DuplicateCustomId {
                    inventory_id: item.inventory_id,
                    custom_id: custom_id.clone(),
                });
            }
            state.custom_ids.insert(key, item.item_id);
        }

        let stored = InventoryItem {
            id: item.item_id,
            inventory_id: item.inventory_id,
            custom_id: item.custom_id,
            version: ItemVersion::initial(),
            created_at: Timestamp::now(),
        };
        state.items.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn set_item_custom_id(
        &self,
        item_id: ItemId,
        custom_id: Option<CustomId>,
        expected: Option<ItemVersion>,
    ) -> StoreResult<InventoryItem> {
        let mut state = self.state.write();

        let (inventory_id, previous, current_version) = {
            let item = state
                .items
                .get(&item_id)
                .ok_or(StoreError::ItemNotFound(item_id))?;
            (item.inventory_id.clone(), item.custom_id.clone(), item.version)
        };

        if let Some(expected) = expected {
            if expected != current_version {
                return Err(StoreError::ItemVersionConflict {
                    item_id,
                    expected,
                    current: current_version,
                });
            }
        }

        if let Some(custom_id) = &custom_id {
            let key = (inventory_id.clone(), custom_id.clone());
            if state
                .custom_ids
                .get(&key)
                .is_some_and(|owner| *owner != item_id)
            {
                return Err(StoreError::DuplicateCustomId {
                    inventory_id,
                    custom_id: custom_id.clone(),
                });
            }
        }

        if let Some(previous) = previous {
            state.custom_ids.remove(&(inventory_id.clone(), previous));
        }
        if let Some(custom_id) = &custom_id {
            state
                .custom_ids
                .insert((inventory_id.clone(), custom_id.clone()), item_id);
        }

        let item = state
            .items
            .get_mut(&item_id)
            .ok_or(StoreError::ItemNotFound(item_id))?;
        item.custom_id = custom_id;
        item.version = current_version.next();
        Ok(item.clone())
    }

    async fn delete_item(&self, item_id: ItemId) -> StoreResult<()> {
        let mut state = self.state.write();
        let item = state
            .items
            .remove(&item_id)
            .ok_or(StoreError::ItemNotFound(item_id))?;
        if let Some(custom_id) = item.custom_id {
            state.custom_ids.remove(&(item.inventory_id, custom_id));
        }
        Ok(())
    }

    async fn delete_inventory(&self, inventory_id: &InventoryId) -> StoreResult<()> {
        let mut state = self.state.write();
        state.configs.remove(inventory_id);
        state.sequences.remove(inventory_id);
        state
            .items
            .retain(|_, item| &item.inventory_id != inventory_id);
        state
            .custom_ids
            .retain(|(inventory, _), _| inventory != inventory_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use customid::element::Element;

    fn inventory(name: &str) -> InventoryId {
        InventoryId::try_new(name).unwrap()
    }

    fn custom_id(text: &str) -> CustomId {
        CustomId::try_new(text).unwrap()
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryInventoryStore::new();
        assert_eq!(store.item_count(), 0);
        assert_eq!(store.load_config(&inventory("inv")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clone_shares_storage() {
        let first = InMemoryInventoryStore::new();
        let second = first.clone();

        assert!(Arc::ptr_eq(&first.state, &second.state));
    }

    #[tokio::test]
    async fn test_replace_config_increments_version() {
        let store = InMemoryInventoryStore::new();
        let inv = inventory("inv");
        let elements = vec![CustomIdElement::new(Element::Sequence, "D4", 0)];

        let first = store
            .replace_config(&inv, elements.clone(), ExpectedVersion::New)
            .await
            .unwrap();
        assert_eq!(first.version, ConfigVersion::initial());

        let second = store
            .replace_config(&inv, elements, ExpectedVersion::Exact(first.version))
            .await
            .unwrap();
        assert_eq!(second.version, first.version.next());
    }

    #[tokio::test]
    async fn test_replace_config_sorts_elements() {
        let store = InMemoryInventoryStore::new();
        let inv = inventory("inv");
        let elements = vec![
            CustomIdElement::new(Element::Sequence, "D4", 3),
            CustomIdElement::new(Element::FixedText("A-".into()), "", 1),
        ];

        let config = store
            .replace_config(&inv, elements, ExpectedVersion::Any)
            .await
            .unwrap();
        let orders: Vec<u32> = config.elements.iter().map(|e| e.order).collect();
        assert_eq!(orders, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_advance_sequence_respects_floor() {
        let store = InMemoryInventoryStore::new();
        let inv = inventory("inv");

        assert_eq!(store.advance_sequence(&inv, 0).await.unwrap(), 1);
        assert_eq!(store.advance_sequence(&inv, 0).await.unwrap(), 2);
        assert_eq!(store.advance_sequence(&inv, 10).await.unwrap(), 11);
        assert_eq!(store.advance_sequence(&inv, 3).await.unwrap(), 12);
        assert_eq!(store.peek_sequence(&inv).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_set_item_custom_id_frees_previous_id() {
        let store = InMemoryInventoryStore::new();
        let inv = inventory("inv");
        let item = store
            .insert_item(NewItem::new(inv.clone(), Some(custom_id("A-1"))))
            .await
            .unwrap();

        let updated = store
            .set_item_custom_id(item.id, Some(custom_id("A-2")), Some(item.version))
            .await
            .unwrap();
        assert_eq!(updated.version, item.version.next());

        assert!(!store
            .custom_id_taken(&inv, &custom_id("A-1"), None)
            .await
            .unwrap());
        assert!(store
            .custom_id_taken(&inv, &custom_id("A-2"), None)
            .await
            .unwrap());
        assert!(!store
            .custom_id_taken(&inv, &custom_id("A-2"), Some(item.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete_inventory_leaves_other_inventories() {
        let store = InMemoryInventoryStore::new();
        let kept = inventory("kept");
        let dropped = inventory("dropped");

        store
            .insert_item(NewItem::new(kept.clone(), Some(custom_id("X-1"))))
            .await
            .unwrap();
        store
            .insert_item(NewItem::new(dropped.clone(), Some(custom_id("X-1"))))
            .await
            .unwrap();
        store.advance_sequence(&dropped, 0).await.unwrap();

        store.delete_inventory(&dropped).await.unwrap();

        assert_eq!(store.item_count(), 1);
        assert_eq!(store.custom_ids(&kept).await.unwrap(), vec![custom_id("X-1")]);
        assert!(store.custom_ids(&dropped).await.unwrap().is_empty());
        assert_eq!(store.peek_sequence(&dropped).await.unwrap(), 0);
    }
}
