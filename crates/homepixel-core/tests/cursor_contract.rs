//! Contract Test: Cursor Monotonicity
//!
//! Constraints verified:
//! - The cursor equals the last raw entry of the most recent non-empty fetch
//! - An empty fetch leaves the cursor unchanged
//! - Only entries past the cursor are parsed

mod common;

use common::*;
use homepixel_core::schema::NodeKind;
use homepixel_core::{ChannelClient, ClientEvent};

#[tokio::test]
async fn cursor_tracks_last_raw_entry() {
    let first = light_entry("2020-11-22T12:00:14Z", "my_room", "lightclapper_21", 0);
    let second = light_entry("2020-11-22T12:00:15Z", "my_room", "lightclapper_21", 1);
    let third = light_entry("2020-11-22T12:00:16Z", "my_room", "lightclapper_21", 0);

    let source = ScriptedFeedSource::new();
    source.push(vec![first.clone()]);
    source.push(Vec::new());
    source.push(vec![first.clone(), second.clone(), third.clone()]);
    let store = CountingRecordStore::new(NodeKind::LightClapper);

    let (client, _events) = ChannelClient::new(
        Box::new(source),
        Box::new(store.clone()),
        &client_config(NodeKind::LightClapper),
    )
    .await
    .unwrap();

    assert_eq!(client.read_new_records().await.unwrap().len(), 1);
    assert_eq!(client.cursor().await, Some(first.clone()));

    assert!(client.read_new_records().await.unwrap().is_empty());
    assert_eq!(client.cursor().await, Some(first), "empty fetch keeps the cursor");

    let records = client.read_new_records().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].time, "12:00:15");
    assert_eq!(records[1].time, "12:00:16");
    assert_eq!(client.cursor().await, Some(third));
}

#[tokio::test]
async fn no_new_data_is_reported() {
    let source = ScriptedFeedSource::new();
    source.push(vec![light_entry("2020-11-22T12:00:14Z", "my_room", "lightclapper_21", 0)]);

    let (client, mut events) = ChannelClient::new(
        Box::new(source),
        Box::new(CountingRecordStore::new(NodeKind::LightClapper)),
        &client_config(NodeKind::LightClapper),
    )
    .await
    .unwrap();

    client.poll_cycle().await.unwrap();
    client.poll_cycle().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.last(), Some(&ClientEvent::NoNewData));
}
