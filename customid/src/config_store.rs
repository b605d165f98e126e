//! Template persistence with validation and optimistic locking.

use tracing::{info, instrument, warn};

use crate::element::{CustomIdConfig, ElementDraft};
use crate::errors::{ConflictError, CustomIdResult, StoreError, StoreResult};
use crate::store::{ExpectedVersion, InventoryStore};
use crate::types::InventoryId;
use crate::validation::validate_elements;

/// Reads and replaces inventory templates.
#[derive(Debug)]
pub struct ConfigStore<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> ConfigStore<'a, S>
where
    S: InventoryStore + ?Sized,
{
    /// Creates a config store over `store`.
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The saved template of `inventory_id`, elements in ascending order.
    pub async fn load(&self, inventory_id: &InventoryId) -> StoreResult<Option<CustomIdConfig>> {
        self.store.load_config(inventory_id).await
    }

    /// Validates `drafts` and replaces the whole template in one step.
    ///
    /// # Errors
    /// * `ValidationError` - If the drafts break a template rule; nothing is
    ///   written
    /// * `ConflictError::StaleConfig` - If `expected` does not admit the
    ///   stored version
    #[instrument(name = "config.save", skip(self, drafts), fields(elements = drafts.len()))]
    pub async fn save(
        &self,
        inventory_id: &InventoryId,
        drafts: &[ElementDraft],
        expected: ExpectedVersion,
    ) -> CustomIdResult<CustomIdConfig> {
        let elements = validate_elements(drafts)?;
        match self
            .store
            .replace_config(inventory_id, elements, expected)
            .await
        {
            Ok(config) => {
                info!(version = %config.version, "[config.saved] custom ID template replaced");
                Ok(config)
            }
            Err(StoreError::ConfigVersionConflict {
                inventory_id,
                expected,
                current,
            }) => {
                warn!(?expected, ?current, "[config.stale] custom ID template was modified concurrently");
                Err(ConflictError::StaleConfig {
                    inventory_id,
                    expected,
                    current,
                }
                .into())
            }
            Err(other) => Err(other.into()),
        }
    }
}
