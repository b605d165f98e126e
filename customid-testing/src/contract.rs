//! Behavioral contract for `InventoryStore` implementations.
//!
//! Each scenario builds its own store with `make_store` and works in
//! inventories named after the scenario plus a fresh UUID, so scenarios can
//! run in parallel against one shared database.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use customid::element::Element;
use customid::errors::StoreError;
use customid::store::{ExpectedVersion, InventoryStore, NewItem};
use customid::types::{ConfigVersion, CustomId, InventoryId, ItemId};
use customid::CustomIdElement;
use uuid::Uuid;

/// A violated contract expectation.
#[derive(Debug)]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn store_error(scenario: &'static str, operation: &'static str, error: StoreError) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }

    fn assertion(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self::new(scenario, detail)
    }
}

impl fmt::Display for ContractTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scenario, self.detail)
    }
}

impl std::error::Error for ContractTestFailure {}

/// Outcome of one contract scenario.
pub type ContractTestResult = Result<(), ContractTestFailure>;

fn contract_inventory_id(
    scenario: &'static str,
    label: &str,
) -> Result<InventoryId, ContractTestFailure> {
    // Include UUID for parallel test execution against shared database
    let raw = format!("contract::{scenario}::{label}::{}", Uuid::now_v7());

    InventoryId::try_new(raw.clone()).map_err(|error| {
        ContractTestFailure::assertion(
            scenario,
            format!("unable to construct inventory id `{raw}`: {error}"),
        )
    })
}

fn contract_custom_id(scenario: &'static str, raw: &str) -> Result<CustomId, ContractTestFailure> {
    CustomId::try_new(raw).map_err(|error| {
        ContractTestFailure::assertion(
            scenario,
            format!("unable to construct custom id `{raw}`: {error}"),
        )
    })
}

fn sample_elements() -> Vec<CustomIdElement> {
    vec![
        CustomIdElement::new(Element::FixedText("INV-".to_string()), "", 0),
        CustomIdElement::new(Element::DateTime, "yyyyMMdd", 1),
        CustomIdElement::new(Element::Sequence, "D4", 2),
    ]
}

/// A replaced template reads back unchanged, at version 1.
pub async fn test_config_round_trip<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: InventoryStore + 'static,
{
    const SCENARIO: &str = "config_round_trip";

    let store = make_store();
    let inventory_id = contract_inventory_id(SCENARIO, "inventory")?;

    let missing = store
        .load_config(&inventory_id)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "load_config", error))?;
    if missing.is_some() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "expected no template before the first save",
        ));
    }

    let saved = store
        .replace_config(&inventory_id, sample_elements(), ExpectedVersion::New)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "replace_config", error))?;
    if saved.version != ConfigVersion::initial() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected first save at version 1, observed {}", saved.version),
        ));
    }

    let loaded = store
        .load_config(&inventory_id)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "load_config", error))?;
    match loaded {
        Some(loaded) if loaded.elements == sample_elements() && loaded.version == saved.version => {
            Ok(())
        }
        other => Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected the saved template to read back unchanged, observed {other:?}"),
        )),
    }
}

/// Replacing with a stale expected version fails and leaves the template
/// untouched.
pub async fn test_config_version_conflict<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: InventoryStore + 'static,
{
    const SCENARIO: &str = "config_version_conflict";

    let store = make_store();
    let inventory_id = contract_inventory_id(SCENARIO, "inventory")?;

    let first = store
        .replace_config(&inventory_id, sample_elements(), ExpectedVersion::New)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "replace_config", error))?;
    let second = store
        .replace_config(
            &inventory_id,
            vec![CustomIdElement::new(Element::Guid, "", 0)],
            ExpectedVersion::Exact(first.version),
        )
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "replace_config", error))?;

    match store
        .replace_config(
            &inventory_id,
            sample_elements(),
            ExpectedVersion::Exact(first.version),
        )
        .await
    {
        Err(StoreError::ConfigVersionConflict { current, .. }) if current == Some(second.version) => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(
                SCENARIO,
                "replace_config",
                error,
            ))
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected version conflict but replace succeeded",
            ))
        }
    }

    match store
        .replace_config(&inventory_id, sample_elements(), ExpectedVersion::New)
        .await
    {
        Err(StoreError::ConfigVersionConflict { .. }) => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(
                SCENARIO,
                "replace_config",
                error,
            ))
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected ExpectedVersion::New to fail on an existing template",
            ))
        }
    }

    let current = store
        .load_config(&inventory_id)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "load_config", error))?;
    match current {
        Some(config) if config.version == second.version => Ok(()),
        other => Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected rejected writes to leave version {}, observed {other:?}", second.version),
        )),
    }
}

/// Two items of one inventory cannot share a custom ID; items of different
/// inventories can.
pub async fn test_duplicate_custom_id_rejected<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: InventoryStore + 'static,
{
    const SCENARIO: &str = "duplicate_custom_id_rejected";

    let store = make_store();
    let left = contract_inventory_id(SCENARIO, "left")?;
    let right = contract_inventory_id(SCENARIO, "right")?;
    let custom_id = contract_custom_id(SCENARIO, "INV-0001")?;

    let _ = store
        .insert_item(NewItem::new(left.clone(), Some(custom_id.clone())))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert_item", error))?;

    match store
        .insert_item(NewItem::new(left.clone(), Some(custom_id.clone())))
        .await
    {
        Err(StoreError::DuplicateCustomId { .. }) => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "insert_item", error)),
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected duplicate custom id to be rejected",
            ))
        }
    }

    let _ = store
        .insert_item(NewItem::new(right, Some(custom_id.clone())))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert_item", error))?;

    // Items without a custom ID never collide.
    for _ in 0..2 {
        let _ = store
            .insert_item(NewItem::new(left.clone(), None))
            .await
            .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert_item", error))?;
    }

    let taken = store
        .custom_id_taken(&left, &custom_id, None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "custom_id_taken", error))?;
    let ids = store
        .custom_ids(&left)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "custom_ids", error))?;

    if taken && ids == vec![custom_id] {
        Ok(())
    } else {
        Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected exactly the first custom id in use, observed taken={taken} ids={ids:?}"),
        ))
    }
}

/// Concurrent reservations never return the same sequence value.
pub async fn test_sequence_reservations_are_distinct<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: InventoryStore + 'static,
{
    const SCENARIO: &str = "sequence_reservations_are_distinct";
    const RESERVATIONS: u64 = 25;

    let store = Arc::new(make_store());
    let inventory_id = contract_inventory_id(SCENARIO, "inventory")?;

    let handles: Vec<_> = (0..RESERVATIONS)
        .map(|_| {
            let store = Arc::clone(&store);
            let inventory_id = inventory_id.clone();
            tokio::spawn(async move { store.advance_sequence(&inventory_id, 0).await })
        })
        .collect();

    let mut values = HashSet::new();
    for handle in handles {
        let value = handle
            .await
            .map_err(|error| {
                ContractTestFailure::assertion(SCENARIO, format!("reservation task failed: {error}"))
            })?
            .map_err(|error| ContractTestFailure::store_error(SCENARIO, "advance_sequence", error))?;
        if !values.insert(value) {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                format!("sequence value {value} was handed out twice"),
            ));
        }
    }

    let expected: HashSet<u64> = (1..=RESERVATIONS).collect();
    if values != expected {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected values 1..={RESERVATIONS}, observed {values:?}"),
        ));
    }

    let peeked = store
        .peek_sequence(&inventory_id)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "peek_sequence", error))?;
    if peeked == RESERVATIONS {
        Ok(())
    } else {
        Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected peek to report {RESERVATIONS}, observed {peeked}"),
        ))
    }
}

/// The counter jumps past the floor and never moves backwards.
pub async fn test_sequence_respects_floor<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: InventoryStore + 'static,
{
    const SCENARIO: &str = "sequence_respects_floor";

    let store = make_store();
    let inventory_id = contract_inventory_id(SCENARIO, "inventory")?;

    let mut observed = Vec::new();
    for floor in [0, 41, 5] {
        observed.push(
            store
                .advance_sequence(&inventory_id, floor)
                .await
                .map_err(|error| {
                    ContractTestFailure::store_error(SCENARIO, "advance_sequence", error)
                })?,
        );
    }

    if observed == [1_u64, 42, 43] {
        Ok(())
    } else {
        Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected reservations [1, 42, 43], observed {observed:?}"),
        ))
    }
}

/// Item updates honour the expected version and the custom ID constraint.
pub async fn test_item_custom_id_update<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: InventoryStore + 'static,
{
    const SCENARIO: &str = "item_custom_id_update";

    let store = make_store();
    let inventory_id = contract_inventory_id(SCENARIO, "inventory")?;
    let first_id = contract_custom_id(SCENARIO, "A-1")?;
    let second_id = contract_custom_id(SCENARIO, "A-2")?;
    let renamed_id = contract_custom_id(SCENARIO, "A-3")?;

    let first = store
        .insert_item(NewItem::new(inventory_id.clone(), Some(first_id.clone())))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert_item", error))?;
    let _ = store
        .insert_item(NewItem::new(inventory_id.clone(), Some(second_id.clone())))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert_item", error))?;

    match store
        .set_item_custom_id(first.id, Some(second_id), Some(first.version))
        .await
    {
        Err(StoreError::DuplicateCustomId { .. }) => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(
                SCENARIO,
                "set_item_custom_id",
                error,
            ))
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected update onto a used custom id to be rejected",
            ))
        }
    }

    let updated = store
        .set_item_custom_id(first.id, Some(renamed_id.clone()), Some(first.version))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "set_item_custom_id", error))?;
    if updated.version != first.version.next() || updated.custom_id.as_ref() != Some(&renamed_id) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected renamed item at the next version, observed {updated:?}"),
        ));
    }

    match store
        .set_item_custom_id(first.id, Some(first_id.clone()), Some(first.version))
        .await
    {
        Err(StoreError::ItemVersionConflict { .. }) => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(
                SCENARIO,
                "set_item_custom_id",
                error,
            ))
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected stale item version to be rejected",
            ))
        }
    }

    let freed = store
        .custom_id_taken(&inventory_id, &first_id, None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "custom_id_taken", error))?;
    if freed {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "expected the previous custom id to be free after the rename",
        ));
    }

    let own = store
        .custom_id_taken(&inventory_id, &renamed_id, Some(first.id))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "custom_id_taken", error))?;
    if own {
        Err(ContractTestFailure::assertion(
            SCENARIO,
            "expected an item's own custom id not to count as taken",
        ))
    } else {
        Ok(())
    }
}

/// Unknown items are reported as not found.
pub async fn test_missing_item_reported<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: InventoryStore + 'static,
{
    const SCENARIO: &str = "missing_item_reported";

    let store = make_store();
    let item_id = ItemId::generate();

    match store.load_item(item_id).await {
        Err(StoreError::ItemNotFound(missing)) if missing == item_id => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "load_item", error)),
        Ok(item) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                format!("expected no item, observed {item:?}"),
            ))
        }
    }

    match store.set_item_custom_id(item_id, None, None).await {
        Err(StoreError::ItemNotFound(_)) => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(
                SCENARIO,
                "set_item_custom_id",
                error,
            ))
        }
        Ok(item) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                format!("expected update of a missing item to fail, observed {item:?}"),
            ))
        }
    }

    match store.delete_item(item_id).await {
        Err(StoreError::ItemNotFound(_)) => Ok(()),
        Err(error) => Err(ContractTestFailure::store_error(SCENARIO, "delete_item", error)),
        Ok(()) => Err(ContractTestFailure::assertion(
            SCENARIO,
            "expected delete of a missing item to fail",
        )),
    }
}

/// Deleting an item keeps the counter; deleting the inventory drops
/// everything it owns.
pub async fn test_delete_semantics<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: InventoryStore + 'static,
{
    const SCENARIO: &str = "delete_semantics";

    let store = make_store();
    let inventory_id = contract_inventory_id(SCENARIO, "inventory")?;
    let custom_id = contract_custom_id(SCENARIO, "INV-0001")?;

    let _ = store
        .replace_config(&inventory_id, sample_elements(), ExpectedVersion::Any)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "replace_config", error))?;
    let _ = store
        .advance_sequence(&inventory_id, 0)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "advance_sequence", error))?;
    let item = store
        .insert_item(NewItem::new(inventory_id.clone(), Some(custom_id.clone())))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert_item", error))?;

    store
        .delete_item(item.id)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "delete_item", error))?;
    let counter = store
        .peek_sequence(&inventory_id)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "peek_sequence", error))?;
    if counter != 1 {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected item delete to keep the counter at 1, observed {counter}"),
        ));
    }

    let _ = store
        .insert_item(NewItem::new(inventory_id.clone(), Some(custom_id)))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert_item", error))?;

    store
        .delete_inventory(&inventory_id)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "delete_inventory", error))?;

    let config = store
        .load_config(&inventory_id)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "load_config", error))?;
    let ids = store
        .custom_ids(&inventory_id)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "custom_ids", error))?;
    let counter = store
        .peek_sequence(&inventory_id)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "peek_sequence", error))?;

    if config.is_none() && ids.is_empty() && counter == 0 {
        Ok(())
    } else {
        Err(ContractTestFailure::assertion(
            SCENARIO,
            format!(
                "expected inventory delete to remove everything, observed config={config:?} ids={ids:?} counter={counter}"
            ),
        ))
    }
}

/// Expands the full store contract into a test module.
///
/// ```ignore
/// inventory_store_contract_tests! {
///     suite = in_memory,
///     make_store = customid_memory::InMemoryInventoryStore::new,
/// }
/// ```
///
/// Leading attributes are copied onto every generated test, e.g.
/// `#[ignore = "Requires PostgreSQL"]` for adapters that need a server.
#[macro_export]
macro_rules! inventory_store_contract_tests {
    ($(#[$attr:meta])* suite = $suite:ident, make_store = $make_store:expr $(,)?) => {
        mod $suite {
            use $crate::contract::{
                test_config_round_trip, test_config_version_conflict, test_delete_semantics,
                test_duplicate_custom_id_rejected, test_item_custom_id_update,
                test_missing_item_reported, test_sequence_reservations_are_distinct,
                test_sequence_respects_floor,
            };

            #[tokio::test(flavor = "multi_thread")]
            $(#[$attr])*
            async fn config_round_trip_contract() {
                test_config_round_trip($make_store)
                    .await
                    .expect("inventory store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $(#[$attr])*
            async fn config_version_conflict_contract() {
                test_config_version_conflict($make_store)
                    .await
                    .expect("inventory store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $(#[$attr])*
            async fn duplicate_custom_id_rejected_contract() {
                test_duplicate_custom_id_rejected($make_store)
                    .await
                    .expect("inventory store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $(#[$attr])*
            async fn sequence_reservations_are_distinct_contract() {
                test_sequence_reservations_are_distinct($make_store)
                    .await
                    .expect("inventory store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $(#[$attr])*
            async fn sequence_respects_floor_contract() {
                test_sequence_respects_floor($make_store)
                    .await
                    .expect("inventory store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $(#[$attr])*
            async fn item_custom_id_update_contract() {
                test_item_custom_id_update($make_store)
                    .await
                    .expect("inventory store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $(#[$attr])*
            async fn missing_item_reported_contract() {
                test_missing_item_reported($make_store)
                    .await
                    .expect("inventory store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $(#[$attr])*
            async fn delete_semantics_contract() {
                test_delete_semantics($make_store)
                    .await
                    .expect("inventory store contract failed");
            }
        }
    };
}

pub use inventory_store_contract_tests;
