//! End-to-end engine behavior over the in-memory store.

use chrono::{FixedOffset, TimeZone};
use customid::{
    AssemblyMode, ConflictError, CustomId, CustomIdEngine, CustomIdError, ElementDraft,
    ElementType, EngineConfig, ExpectedVersion, FixedClock, InventoryId, InventoryStore,
    SequenceStrategy, StoreError, ValidationError,
};
use customid_memory::InMemoryInventoryStore;
use regex::Regex;

fn inventory(name: &str) -> InventoryId {
    InventoryId::try_new(name).unwrap()
}

fn custom_id(text: &str) -> CustomId {
    CustomId::try_new(text).unwrap()
}

fn engine() -> CustomIdEngine<InMemoryInventoryStore> {
    CustomIdEngine::new(InMemoryInventoryStore::new()).with_seed(7)
}

fn october_15() -> FixedClock {
    FixedClock::new(
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 10, 15, 9, 30, 0)
            .unwrap(),
    )
}

fn inv_sequence_template() -> Vec<ElementDraft> {
    vec![
        ElementDraft::fixed_text("INV-"),
        ElementDraft::new(ElementType::Sequence, "D4"),
    ]
}

#[tokio::test]
async fn sequence_continues_from_existing_items() {
    let engine = engine();
    let inv = inventory("books");
    engine
        .save_config(&inv, &inv_sequence_template(), ExpectedVersion::Any)
        .await
        .unwrap();
    for existing in ["INV-0001", "INV-0002"] {
        engine
            .create_item(&inv, Some(custom_id(existing)))
            .await
            .unwrap();
    }

    let item = engine.create_item(&inv, None).await.unwrap();

    assert_eq!(item.custom_id, Some(custom_id("INV-0003")));
}

#[tokio::test]
async fn next_sequence_uses_the_highest_trailing_number() {
    for strategy in [SequenceStrategy::PersistedCounter, SequenceStrategy::ScanExisting] {
        let engine = CustomIdEngine::with_config(
            InMemoryInventoryStore::new(),
            EngineConfig::default().with_sequence_strategy(strategy),
        );
        let inv = inventory("parts");
        for existing in ["A-001", "A-007", "A-003"] {
            engine
                .create_item(&inv, Some(custom_id(existing)))
                .await
                .unwrap();
        }

        assert_eq!(engine.next_sequence(&inv).await.unwrap(), 8, "{strategy:?}");
    }
}

#[tokio::test]
async fn next_sequence_starts_at_one() {
    let engine = engine();
    assert_eq!(engine.next_sequence(&inventory("empty")).await.unwrap(), 1);
}

#[tokio::test]
async fn date_and_random_preview_matches_the_clock() {
    let engine = engine().with_clock(october_15());
    let drafts = vec![
        ElementDraft::new(ElementType::DateTime, "yyyyMMdd"),
        ElementDraft::new(ElementType::Random6Digit, "D6"),
    ];

    let preview = engine.preview(&drafts, None).await.unwrap();

    let pattern = Regex::new(r"^20251015\d{6}$").unwrap();
    assert!(pattern.is_match(&preview), "unexpected preview {preview}");
}

#[tokio::test]
async fn preview_without_inventory_uses_placeholder_sequence() {
    let engine = engine();
    let drafts = vec![
        ElementDraft::fixed_text(""),
        ElementDraft::new(ElementType::Sequence, "D5"),
    ];

    assert_eq!(engine.preview(&drafts, None).await.unwrap(), "00123");
}

#[tokio::test]
async fn preview_peeks_without_reserving() {
    let engine = engine();
    let inv = inventory("books");
    engine
        .create_item(&inv, Some(custom_id("INV-0041")))
        .await
        .unwrap();

    let drafts = inv_sequence_template();
    let first = engine.preview(&drafts, Some(&inv)).await.unwrap();
    let second = engine.preview(&drafts, Some(&inv)).await.unwrap();

    assert_eq!(first, "INV-0042");
    assert_eq!(second, "INV-0042");
    assert_eq!(engine.store().peek_sequence(&inv).await.unwrap(), 0);
}

#[tokio::test]
async fn sequence_value_is_shared_within_one_id() {
    let engine = engine();
    let inv = inventory("books");
    let drafts = vec![
        ElementDraft::new(ElementType::Sequence, "D2"),
        ElementDraft::fixed_text("/"),
        ElementDraft::new(ElementType::Sequence, "X2"),
    ];
    let config = engine
        .save_config(&inv, &drafts, ExpectedVersion::New)
        .await
        .unwrap();

    let id = engine
        .assemble(&config.elements, AssemblyMode::Final(&inv))
        .await
        .unwrap();

    assert_eq!(id, "01/01");
    assert_eq!(engine.next_sequence(&inv).await.unwrap(), 2);
}

#[tokio::test]
async fn duplicate_explicit_id_suggests_a_free_alternative() {
    let engine = engine();
    let inv = inventory("books");
    engine
        .save_config(&inv, &inv_sequence_template(), ExpectedVersion::Any)
        .await
        .unwrap();
    engine
        .create_item(&inv, Some(custom_id("INV-0001")))
        .await
        .unwrap();

    let error = engine
        .create_item(&inv, Some(custom_id("INV-0001")))
        .await
        .unwrap_err();

    let suggestion = match &error {
        CustomIdError::Conflict(ConflictError::DuplicateCustomId {
            custom_id: taken,
            suggestion: Some(suggestion),
            ..
        }) => {
            assert_eq!(taken, &custom_id("INV-0001"));
            suggestion.clone()
        }
        other => panic!("expected duplicate conflict with suggestion, got {other:?}"),
    };
    assert_eq!(error.suggestion(), Some(&suggestion));
    assert!(engine
        .resolve_custom_id(&inv, Some(suggestion.clone()))
        .await
        .is_ok());

    let item = engine.create_item(&inv, Some(suggestion)).await.unwrap();
    assert!(item.custom_id.is_some());
}

#[tokio::test]
async fn duplicate_without_template_has_no_suggestion() {
    let engine = engine();
    let inv = inventory("loose");
    engine
        .create_item(&inv, Some(custom_id("X")))
        .await
        .unwrap();

    let error = engine
        .create_item(&inv, Some(custom_id("X")))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        CustomIdError::Conflict(ConflictError::DuplicateCustomId {
            suggestion: None,
            ..
        })
    ));
}

#[tokio::test]
async fn inventory_without_template_creates_items_without_custom_id() {
    let engine = engine();
    let inv = inventory("plain");

    assert_eq!(engine.resolve_custom_id(&inv, None).await.unwrap(), None);
    let item = engine.create_item(&inv, None).await.unwrap();
    assert_eq!(item.custom_id, None);
}

#[tokio::test]
async fn colliding_generated_ids_are_retried() {
    let engine = CustomIdEngine::with_config(
        InMemoryInventoryStore::new(),
        EngineConfig::default()
            .with_sequence_strategy(SequenceStrategy::ScanExisting)
            .with_generation_attempts(customid::GenerationAttempts::try_new(3).unwrap()),
    );
    let inv = inventory("fixed");
    engine
        .save_config(&inv, &[ElementDraft::fixed_text("ONLY")], ExpectedVersion::Any)
        .await
        .unwrap();

    engine.create_item(&inv, None).await.unwrap();
    let error = engine.create_item(&inv, None).await.unwrap_err();

    assert!(matches!(
        error,
        CustomIdError::Conflict(ConflictError::DuplicateCustomId {
            suggestion: None,
            ..
        })
    ));
}

#[tokio::test]
async fn load_config_is_idempotent() {
    let engine = engine();
    let inv = inventory("books");
    engine
        .save_config(&inv, &inv_sequence_template(), ExpectedVersion::Any)
        .await
        .unwrap();

    let first = engine.load_config(&inv).await.unwrap();
    let second = engine.load_config(&inv).await.unwrap();

    assert!(first.is_some());
    assert_eq!(first, second);
}

#[tokio::test]
async fn invalid_templates_are_not_saved() {
    let engine = engine();
    let inv = inventory("books");
    let drafts: Vec<ElementDraft> = (0..11)
        .map(|_| ElementDraft::new(ElementType::Guid, ""))
        .collect();

    let error = engine
        .save_config(&inv, &drafts, ExpectedVersion::Any)
        .await
        .unwrap_err();

    assert_eq!(
        error,
        CustomIdError::Validation(ValidationError::TooManyElements { count: 11, max: 10 })
    );
    assert_eq!(engine.load_config(&inv).await.unwrap(), None);
}

#[tokio::test]
async fn stale_config_version_is_rejected() {
    let engine = engine();
    let inv = inventory("books");
    let first = engine
        .save_config(&inv, &inv_sequence_template(), ExpectedVersion::New)
        .await
        .unwrap();
    engine
        .save_config(
            &inv,
            &[ElementDraft::new(ElementType::Guid, "")],
            ExpectedVersion::Exact(first.version),
        )
        .await
        .unwrap();

    let error = engine
        .save_config(
            &inv,
            &inv_sequence_template(),
            ExpectedVersion::Exact(first.version),
        )
        .await
        .unwrap_err();

    match error {
        CustomIdError::Conflict(ConflictError::StaleConfig {
            expected, current, ..
        }) => {
            assert_eq!(expected, Some(first.version));
            assert_eq!(current, Some(first.version.next()));
        }
        other => panic!("expected stale config, got {other:?}"),
    }
}

#[tokio::test]
async fn last_writer_wins_without_expected_version() {
    let engine = engine();
    let inv = inventory("books");
    engine
        .save_config(&inv, &inv_sequence_template(), ExpectedVersion::Any)
        .await
        .unwrap();
    let replaced = engine
        .save_config(
            &inv,
            &[ElementDraft::new(ElementType::Guid, "")],
            ExpectedVersion::Any,
        )
        .await
        .unwrap();

    assert_eq!(replaced.version.into_inner(), 2);
    assert_eq!(replaced.elements.len(), 1);
}

#[tokio::test]
async fn counter_does_not_reuse_numbers_after_delete() {
    let engine = engine();
    let inv = inventory("books");
    engine
        .save_config(&inv, &inv_sequence_template(), ExpectedVersion::Any)
        .await
        .unwrap();
    engine.create_item(&inv, None).await.unwrap();
    let highest = engine.create_item(&inv, None).await.unwrap();
    assert_eq!(highest.custom_id, Some(custom_id("INV-0002")));

    engine.delete_item(highest.id).await.unwrap();
    let next = engine.create_item(&inv, None).await.unwrap();

    assert_eq!(next.custom_id, Some(custom_id("INV-0003")));
}

#[tokio::test]
async fn oversized_explicit_number_does_not_stall_the_counter() {
    let engine = engine();
    let inv = inventory("barcodes");
    engine
        .create_item(&inv, Some(custom_id("BARCODE-18446744073709551614")))
        .await
        .unwrap();
    engine
        .save_config(
            &inv,
            &[
                ElementDraft::fixed_text("X-"),
                ElementDraft::new(ElementType::Sequence, ""),
            ],
            ExpectedVersion::Any,
        )
        .await
        .unwrap();

    let first = engine.create_item(&inv, None).await.unwrap();
    let second = engine.create_item(&inv, None).await.unwrap();

    assert_eq!(first.custom_id, Some(custom_id("X-1")));
    assert_eq!(second.custom_id, Some(custom_id("X-2")));
}

#[tokio::test]
async fn scan_strategy_reuses_numbers_after_delete() {
    let engine = CustomIdEngine::with_config(
        InMemoryInventoryStore::new(),
        EngineConfig::default().with_sequence_strategy(SequenceStrategy::ScanExisting),
    );
    let inv = inventory("books");
    engine
        .save_config(&inv, &inv_sequence_template(), ExpectedVersion::Any)
        .await
        .unwrap();
    engine.create_item(&inv, None).await.unwrap();
    let highest = engine.create_item(&inv, None).await.unwrap();

    engine.delete_item(highest.id).await.unwrap();
    let next = engine.create_item(&inv, None).await.unwrap();

    assert_eq!(next.custom_id, Some(custom_id("INV-0002")));
}

#[tokio::test]
async fn change_custom_id_checks_uniqueness_and_version() {
    let engine = engine();
    let inv = inventory("books");
    let first = engine
        .create_item(&inv, Some(custom_id("A-1")))
        .await
        .unwrap();
    engine
        .create_item(&inv, Some(custom_id("A-2")))
        .await
        .unwrap();

    let duplicate = engine
        .change_custom_id(&inv, first.id, custom_id("A-2"), Some(first.version))
        .await
        .unwrap_err();
    assert!(matches!(
        duplicate,
        CustomIdError::Conflict(ConflictError::DuplicateCustomId { .. })
    ));

    let unchanged = engine
        .change_custom_id(&inv, first.id, custom_id("A-1"), Some(first.version))
        .await
        .unwrap();
    assert_eq!(unchanged.version, first.version.next());

    let stale = engine
        .change_custom_id(&inv, first.id, custom_id("A-9"), Some(first.version))
        .await
        .unwrap_err();
    assert!(matches!(
        stale,
        CustomIdError::Conflict(ConflictError::StaleItem { .. })
    ));
}

#[tokio::test]
async fn change_custom_id_rejects_items_of_other_inventories() {
    let engine = engine();
    let item = engine
        .create_item(&inventory("books"), Some(custom_id("A-1")))
        .await
        .unwrap();

    let error = engine
        .change_custom_id(&inventory("music"), item.id, custom_id("A-2"), None)
        .await
        .unwrap_err();

    assert_eq!(error, CustomIdError::Store(StoreError::ItemNotFound(item.id)));
}

#[tokio::test]
async fn delete_inventory_removes_template_and_counter() {
    let engine = engine();
    let inv = inventory("books");
    engine
        .save_config(&inv, &inv_sequence_template(), ExpectedVersion::Any)
        .await
        .unwrap();
    engine.create_item(&inv, None).await.unwrap();

    engine.delete_inventory(&inv).await.unwrap();

    assert_eq!(engine.load_config(&inv).await.unwrap(), None);
    assert_eq!(engine.next_sequence(&inv).await.unwrap(), 1);
}
