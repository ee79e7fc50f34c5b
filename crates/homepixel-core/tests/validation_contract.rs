//! Contract Test: Validation Rejection
//!
//! Constraints verified:
//! - Entries with a bad timestamp, an empty location or node id, or a status
//!   outside {0, 1} never reach the store
//! - Rejected entries still advance the cursor
//! - Each rejection is reported as an event

mod common;

use common::*;
use homepixel_core::schema::NodeKind;
use homepixel_core::{ChannelClient, ClientEvent, FeedEntry};

async fn run_single_cycle(feeds: Vec<FeedEntry>) -> (CountingRecordStore, Vec<ClientEvent>, Option<FeedEntry>) {
    let source = ScriptedFeedSource::new();
    source.push(feeds);
    let store = CountingRecordStore::new(NodeKind::LightClapper);

    let (client, mut events) = ChannelClient::new(
        Box::new(source),
        Box::new(store.clone()),
        &client_config(NodeKind::LightClapper),
    )
    .await
    .unwrap();

    client.poll_cycle().await.unwrap();
    let cursor = client.cursor().await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    (store, seen, cursor)
}

#[tokio::test]
async fn entry_missing_node_id_is_rejected() {
    let mut entry = light_entry("2020-11-21T20:05:45Z", "room", "node_1", 1).with_entry_id(7);
    entry.fields.remove("field2");

    let (store, events, cursor) = run_single_cycle(vec![entry.clone()]).await;

    assert!(store.rows().await.is_empty());
    assert_eq!(cursor, Some(entry), "cursor advances past rejected entries");
    assert!(events.iter().any(|e| matches!(
        e,
        ClientEvent::EntryRejected { entry_id: Some(7), .. }
    )));
}

#[tokio::test]
async fn only_valid_entries_are_stored() {
    let mut bad_date = light_entry("2020-11-21T20:05:46Z", "room", "node_1", 1);
    bad_date.created_at = Some("not-a-date".to_string());

    let feeds = vec![
        light_entry("2020-11-21T20:05:45Z", "room", "node_1", 1),
        bad_date,
        light_entry("2020-11-21T20:05:47Z", "", "node_1", 1),
        light_entry("2020-11-21T20:05:48Z", "room", "", 1),
        light_entry("2020-11-21T20:05:49Z", "room", "node_1", 5),
        light_entry("2020-11-21T20:05:50Z", "room", "node_1", 0),
    ];

    let (store, events, _) = run_single_cycle(feeds).await;

    let rows = store.rows().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].time, "20:05:45");
    assert_eq!(rows[1].time, "20:05:50");

    let rejected = events
        .iter()
        .filter(|e| matches!(e, ClientEvent::EntryRejected { .. }))
        .count();
    assert_eq!(rejected, 4);
    assert!(events.contains(&ClientEvent::CycleCompleted {
        parsed: 2,
        inserted: 2,
        duplicates: 0,
    }));
}

#[tokio::test]
async fn all_rejected_cycle_skips_the_store() {
    let (store, events, cursor) =
        run_single_cycle(vec![light_entry("2020-11-21T20:05:45Z", "", "", 3)]).await;

    assert!(cursor.is_some());
    assert_eq!(store.persist_calls(), 0);
    assert!(events.contains(&ClientEvent::CycleCompleted {
        parsed: 0,
        inserted: 0,
        duplicates: 0,
    }));
}
