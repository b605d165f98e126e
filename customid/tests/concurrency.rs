//! Concurrent generation against one inventory.

use std::collections::HashSet;
use std::sync::Arc;

use customid::{CustomIdEngine, ElementDraft, ElementType, ExpectedVersion, InventoryId};
use customid_memory::InMemoryInventoryStore;
use futures::future::join_all;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_final_generations_get_distinct_sequences() {
    let engine = Arc::new(CustomIdEngine::new(InMemoryInventoryStore::new()));
    let inv = InventoryId::try_new("concurrent").unwrap();
    engine
        .save_config(
            &inv,
            &[
                ElementDraft::fixed_text("C-"),
                ElementDraft::new(ElementType::Sequence, "D5"),
            ],
            ExpectedVersion::New,
        )
        .await
        .unwrap();

    let tasks = (0..50).map(|_| {
        let engine = Arc::clone(&engine);
        let inv = inv.clone();
        tokio::spawn(async move { engine.create_item(&inv, None).await })
    });
    let items: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let ids: HashSet<String> = items
        .iter()
        .map(|item| item.custom_id.as_ref().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 50);

    let expected: HashSet<String> = (1..=50).map(|n| format!("C-{n:05}")).collect();
    assert_eq!(ids, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sequence_reservations_are_distinct() {
    let engine = Arc::new(CustomIdEngine::new(InMemoryInventoryStore::new()));
    let inv = InventoryId::try_new("reservations").unwrap();

    let tasks = (0..100).map(|_| {
        let engine = Arc::clone(&engine);
        let inv = inv.clone();
        tokio::spawn(async move { engine.next_sequence(&inv).await })
    });
    let values: HashSet<u64> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(values, (1..=100).collect());
}
