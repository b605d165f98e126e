//! Uniqueness of custom IDs within an inventory.
//!
//! The guard checks an ID before it is written and, on collision, offers a
//! freshly generated alternative that was free when it was checked. The
//! check is advisory: two writers can pass it with the same ID, which is why
//! every store also enforces uniqueness on insert.

use tracing::{debug, instrument, warn};

use crate::assembler::{Assembler, AssemblyMode};
use crate::element::CustomIdConfig;
use crate::errors::{ConflictError, CustomIdResult, StoreResult, ValidationError};
use crate::store::InventoryStore;
use crate::types::{CustomId, InventoryId, ItemId};

/// Collision checks and suggestions for one store.
#[derive(Debug)]
pub struct UniquenessGuard<'a, S: ?Sized> {
    store: &'a S,
    assembler: Assembler<'a, S>,
    generation_attempts: u32,
    suggestion_attempts: u32,
}

impl<'a, S> UniquenessGuard<'a, S>
where
    S: InventoryStore + ?Sized,
{
    /// Creates a guard generating candidates with `assembler`.
    pub const fn new(
        store: &'a S,
        assembler: Assembler<'a, S>,
        generation_attempts: u32,
        suggestion_attempts: u32,
    ) -> Self {
        Self {
            store,
            assembler,
            generation_attempts,
            suggestion_attempts,
        }
    }

    /// Decides the custom ID of a new item.
    ///
    /// * explicit ID, free: returned as is
    /// * explicit ID, taken: `DuplicateCustomId` with a suggestion
    /// * no explicit ID, template saved: a generated ID, retried up to the
    ///   configured number of attempts while it collides
    /// * no explicit ID, no template: `None`
    #[instrument(name = "guard.resolve", skip(self, explicit))]
    pub async fn resolve(
        &self,
        inventory_id: &InventoryId,
        explicit: Option<CustomId>,
    ) -> CustomIdResult<Option<CustomId>> {
        if let Some(custom_id) = explicit {
            return self
                .check_explicit(inventory_id, custom_id, None)
                .await
                .map(Some);
        }

        let Some(config) = self.store.load_config(inventory_id).await? else {
            debug!("[guard.no_template] inventory has no custom ID template");
            return Ok(None);
        };

        let mut last = None;
        for attempt in 1..=self.generation_attempts.max(1) {
            let candidate = self.generate(&config).await?;
            if !self.is_taken(inventory_id, &candidate, None).await? {
                return Ok(Some(candidate));
            }
            debug!(attempt, candidate = %candidate, "[guard.collision] generated ID already in use");
            last = Some(candidate);
        }

        match last {
            Some(custom_id) => Err(self
                .conflict(inventory_id, custom_id, Some(&config))
                .await?
                .into()),
            None => Ok(None),
        }
    }

    /// Accepts `custom_id` for an item unless another item of the inventory
    /// already uses it. `except` is the item being updated, if any.
    pub async fn check_explicit(
        &self,
        inventory_id: &InventoryId,
        custom_id: CustomId,
        except: Option<ItemId>,
    ) -> CustomIdResult<CustomId> {
        if !self.is_taken(inventory_id, &custom_id, except).await? {
            return Ok(custom_id);
        }
        let config = self.store.load_config(inventory_id).await?;
        Err(self
            .conflict(inventory_id, custom_id, config.as_ref())
            .await?
            .into())
    }

    /// Whether another item of the inventory uses `custom_id`.
    pub async fn is_taken(
        &self,
        inventory_id: &InventoryId,
        custom_id: &CustomId,
        except: Option<ItemId>,
    ) -> StoreResult<bool> {
        self.store
            .custom_id_taken(inventory_id, custom_id, except)
            .await
    }

    /// Builds the duplicate conflict for `custom_id`, with a suggestion
    /// generated from `config` when one turns up free.
    pub async fn conflict(
        &self,
        inventory_id: &InventoryId,
        custom_id: CustomId,
        config: Option<&CustomIdConfig>,
    ) -> CustomIdResult<ConflictError> {
        let suggestion = match config {
            Some(config) => self.suggest(inventory_id, config).await?,
            None => None,
        };
        warn!(
            inventory = %inventory_id,
            custom_id = %custom_id,
            suggestion = ?suggestion.as_deref(),
            "[custom_id.conflict] custom ID already exists"
        );
        Ok(ConflictError::DuplicateCustomId {
            inventory_id: inventory_id.clone(),
            custom_id,
            suggestion,
        })
    }

    /// A freshly generated ID that is free right now, or `None` when every
    /// attempt collided.
    pub async fn suggest(
        &self,
        inventory_id: &InventoryId,
        config: &CustomIdConfig,
    ) -> CustomIdResult<Option<CustomId>> {
        for _ in 0..self.suggestion_attempts.max(1) {
            let candidate = self.generate(config).await?;
            if !self.is_taken(inventory_id, &candidate, None).await? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    async fn generate(&self, config: &CustomIdConfig) -> CustomIdResult<CustomId> {
        let text = self
            .assembler
            .assemble(&config.elements, AssemblyMode::Final(&config.inventory_id))
            .await?;
        CustomId::try_new(text).map_err(|_| ValidationError::EmptyCustomId.into())
    }
}
