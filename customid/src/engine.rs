//! The custom ID engine.
//!
//! [`CustomIdEngine`] owns a store, a clock, a random source and the engine
//! configuration, and exposes every custom ID operation. It is cheap to share
//! behind an `Arc`; the random source is locked only while an ID is rendered.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, instrument, warn};

use crate::assembler::{Assembler, AssemblyMode};
use crate::config::EngineConfig;
use crate::config_store::ConfigStore;
use crate::element::{CustomIdConfig, CustomIdElement, ElementDraft};
use crate::errors::{ConflictError, CustomIdError, CustomIdResult, StoreError};
use crate::generate::{Clock, SystemClock};
use crate::guard::UniquenessGuard;
use crate::sequence::SequenceResolver;
use crate::store::{ExpectedVersion, InventoryItem, InventoryStore, NewItem};
use crate::types::{CustomId, InventoryId, ItemId, ItemVersion};
use crate::validation::validate_preview_elements;

/// Custom ID generation over an [`InventoryStore`].
#[derive(Debug)]
pub struct CustomIdEngine<S> {
    store: S,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl<S> CustomIdEngine<S>
where
    S: InventoryStore,
{
    /// Creates an engine with the default configuration, the system clock and
    /// an OS-seeded random source.
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Replaces the clock used by `DATE_TIME` elements.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replaces the random source with one seeded from `seed`.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn config_store(&self) -> ConfigStore<'_, S> {
        ConfigStore::new(&self.store)
    }

    fn assembler(&self) -> Assembler<'_, S> {
        Assembler::new(
            &self.store,
            self.config.sequence_strategy,
            self.clock.as_ref(),
            &self.rng,
        )
    }

    fn guard(&self) -> UniquenessGuard<'_, S> {
        UniquenessGuard::new(
            &self.store,
            self.assembler(),
            self.config.generation_attempts.into_inner(),
            self.config.suggestion_attempts.into_inner(),
        )
    }

    /// The saved template of an inventory, `None` when it has none.
    pub async fn load_config(
        &self,
        inventory_id: &InventoryId,
    ) -> CustomIdResult<Option<CustomIdConfig>> {
        Ok(self.config_store().load(inventory_id).await?)
    }

    /// Validates and saves the template of an inventory, replacing any
    /// previous one.
    pub async fn save_config(
        &self,
        inventory_id: &InventoryId,
        drafts: &[ElementDraft],
        expected: ExpectedVersion,
    ) -> CustomIdResult<CustomIdConfig> {
        self.config_store()
            .save(inventory_id, drafts, expected)
            .await
    }

    /// Renders an unsaved template for display.
    ///
    /// Fixed-text elements may still be empty. With an inventory the
    /// sequence shows the value the next item would get; without one it shows
    /// a placeholder. Nothing is reserved.
    #[instrument(name = "engine.preview", skip(self, drafts))]
    pub async fn preview(
        &self,
        drafts: &[ElementDraft],
        inventory_id: Option<&InventoryId>,
    ) -> CustomIdResult<String> {
        let elements = validate_preview_elements(drafts)?;
        Ok(self
            .assembler()
            .assemble(&elements, AssemblyMode::Preview(inventory_id))
            .await?)
    }

    /// Assembles validated elements in the given mode.
    pub async fn assemble(
        &self,
        elements: &[CustomIdElement],
        mode: AssemblyMode<'_>,
    ) -> CustomIdResult<String> {
        Ok(self.assembler().assemble(elements, mode).await?)
    }

    /// Reserves the next sequence number of an inventory.
    pub async fn next_sequence(&self, inventory_id: &InventoryId) -> CustomIdResult<u64> {
        Ok(SequenceResolver::new(&self.store, self.config.sequence_strategy)
            .next(inventory_id)
            .await?)
    }

    /// The sequence number the next item would get, without reserving it.
    pub async fn peek_sequence(&self, inventory_id: &InventoryId) -> CustomIdResult<u64> {
        Ok(SequenceResolver::new(&self.store, self.config.sequence_strategy)
            .peek(inventory_id)
            .await?)
    }

    /// Decides the custom ID of a new item without inserting it.
    ///
    /// See [`UniquenessGuard::resolve`] for the rules.
    pub async fn resolve_custom_id(
        &self,
        inventory_id: &InventoryId,
        explicit: Option<CustomId>,
    ) -> CustomIdResult<Option<CustomId>> {
        self.guard().resolve(inventory_id, explicit).await
    }

    /// Creates an item, generating its custom ID from the inventory template
    /// unless one is given.
    ///
    /// # Errors
    /// * `ConflictError::DuplicateCustomId` - If the ID is taken, including
    ///   when another writer inserted it between the check and the insert
    #[instrument(name = "engine.create_item", skip(self, explicit))]
    pub async fn create_item(
        &self,
        inventory_id: &InventoryId,
        explicit: Option<CustomId>,
    ) -> CustomIdResult<InventoryItem> {
        let guard = self.guard();
        let custom_id = guard.resolve(inventory_id, explicit).await?;
        let item = NewItem::new(inventory_id.clone(), custom_id);

        match self.store.insert_item(item).await {
            Ok(item) => {
                info!(
                    item = %item.id,
                    custom_id = ?item.custom_id.as_deref(),
                    "[engine.item_created] item created"
                );
                Ok(item)
            }
            Err(StoreError::DuplicateCustomId { custom_id, .. }) => {
                warn!(custom_id = %custom_id, "[engine.insert_race] custom ID taken between check and insert");
                let config = self.store.load_config(inventory_id).await?;
                Err(guard
                    .conflict(inventory_id, custom_id, config.as_ref())
                    .await?
                    .into())
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Changes the custom ID of an existing item of `inventory_id`.
    ///
    /// The new ID must not be used by any other item of the inventory.
    /// `expected` guards against overwriting a concurrent change.
    ///
    /// # Errors
    /// * `StoreError::ItemNotFound` - If the item does not exist in the
    ///   inventory
    /// * `ConflictError::StaleItem` - If `expected` differs from the stored
    ///   version
    /// * `ConflictError::DuplicateCustomId` - If the new ID is taken
    #[instrument(name = "engine.change_custom_id", skip(self, custom_id))]
    pub async fn change_custom_id(
        &self,
        inventory_id: &InventoryId,
        item_id: ItemId,
        custom_id: CustomId,
        expected: Option<ItemVersion>,
    ) -> CustomIdResult<InventoryItem> {
        let item = self.store.load_item(item_id).await?;
        if &item.inventory_id != inventory_id {
            return Err(StoreError::ItemNotFound(item_id).into());
        }
        if let Some(expected) = expected {
            if expected != item.version {
                return Err(ConflictError::StaleItem {
                    item_id,
                    expected,
                    current: item.version,
                }
                .into());
            }
        }

        let guard = self.guard();
        let custom_id = guard
            .check_explicit(inventory_id, custom_id, Some(item_id))
            .await?;

        match self
            .store
            .set_item_custom_id(item_id, Some(custom_id), expected)
            .await
        {
            Ok(updated) => Ok(updated),
            Err(StoreError::ItemVersionConflict {
                item_id,
                expected,
                current,
            }) => Err(ConflictError::StaleItem {
                item_id,
                expected,
                current,
            }
            .into()),
            Err(StoreError::DuplicateCustomId { custom_id, .. }) => {
                let config = self.store.load_config(inventory_id).await?;
                Err(guard
                    .conflict(inventory_id, custom_id, config.as_ref())
                    .await?
                    .into())
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Deletes an item. Its sequence number is not handed out again under the
    /// persisted counter strategy.
    pub async fn delete_item(&self, item_id: ItemId) -> CustomIdResult<()> {
        Ok(self.store.delete_item(item_id).await?)
    }

    /// Deletes an inventory's template, sequence counter and items.
    #[instrument(name = "engine.delete_inventory", skip(self))]
    pub async fn delete_inventory(&self, inventory_id: &InventoryId) -> CustomIdResult<()> {
        self.store.delete_inventory(inventory_id).await?;
        info!("[engine.inventory_deleted] custom ID state removed");
        Ok(())
    }
}

impl CustomIdError {
    /// The suggested alternative carried by a duplicate conflict.
    pub const fn suggestion(&self) -> Option<&CustomId> {
        match self {
            Self::Conflict(ConflictError::DuplicateCustomId {
                suggestion: Some(suggestion),
                ..
            }) => Some(suggestion),
            _ => None,
        }
    }
}
