//! Test doubles and common utilities for contract tests
//!
//! These doubles script the remote channel and the hardware so the client
//! and node loops can be driven deterministically.

#![allow(dead_code)]

use homepixel_core::error::{Error, Result};
use homepixel_core::feed::FeedEntry;
use homepixel_core::schema::{NodeKind, StoredRecord};
use homepixel_core::store::MemoryRecordStore;
use homepixel_core::traits::{
    Actuator, ChannelFields, ChannelPublisher, FeedSource, Notifier, PersistOutcome,
    PublishResponse, RecordStore, Sensor, SensorReading,
};
use homepixel_core::{ChannelConfig, ClientConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A feed source that replays scripted responses
///
/// Each fetch takes the next scripted response; once the script runs out
/// the last response is repeated.
#[derive(Clone)]
pub struct ScriptedFeedSource {
    script: Arc<Mutex<VecDeque<std::result::Result<Vec<FeedEntry>, String>>>>,
    last: Arc<Mutex<Vec<FeedEntry>>>,
    fetch_count: Arc<AtomicUsize>,
}

impl ScriptedFeedSource {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            last: Arc::new(Mutex::new(Vec::new())),
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a successful fetch
    pub fn push(&self, feeds: Vec<FeedEntry>) {
        self.script.lock().unwrap().push_back(Ok(feeds));
    }

    /// Queue a failed fetch
    pub fn push_failure(&self, message: &str) {
        self.script.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FeedSource for ScriptedFeedSource {
    async fn fetch(&self, _limit: Option<u32>) -> Result<Vec<FeedEntry>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(feeds)) => {
                *self.last.lock().unwrap() = feeds.clone();
                Ok(feeds)
            }
            Some(Err(message)) => Err(Error::transport(message)),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A record store that counts calls and delegates to memory
#[derive(Clone)]
pub struct CountingRecordStore {
    inner: MemoryRecordStore,
    persist_calls: Arc<AtomicUsize>,
    ensure_calls: Arc<AtomicUsize>,
}

impl CountingRecordStore {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            inner: MemoryRecordStore::new(kind.schema()),
            persist_calls: Arc::new(AtomicUsize::new(0)),
            ensure_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    pub async fn rows(&self) -> Vec<StoredRecord> {
        self.inner.records().await.unwrap()
    }
}

#[async_trait::async_trait]
impl RecordStore for CountingRecordStore {
    async fn ensure_table(&self) -> Result<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_table().await
    }

    async fn persist(&self, records: &[StoredRecord]) -> Result<PersistOutcome> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.persist(records).await
    }

    async fn records(&self) -> Result<Vec<StoredRecord>> {
        self.inner.records().await
    }
}

/// A publisher that records every field-set and answers with a fixed status
#[derive(Clone)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<ChannelFields>>>,
    response: PublishResponse,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::answering(PublishResponse::new(200, "OK"))
    }

    pub fn answering(response: PublishResponse) -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            response,
        }
    }

    pub fn published(&self) -> Vec<ChannelFields> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChannelPublisher for RecordingPublisher {
    async fn publish(&self, fields: &ChannelFields) -> PublishResponse {
        self.published.lock().unwrap().push(fields.clone());
        self.response.clone()
    }
}

/// A sensor that replays scripted readings, then waits forever
pub struct ScriptedSensor {
    readings: VecDeque<Result<SensorReading>>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSensor {
    pub fn new(readings: Vec<SensorReading>) -> Self {
        Self {
            readings: readings.into_iter().map(Ok).collect(),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail with a hardware error after the scripted readings
    pub fn then_fail(mut self, message: &str) -> Self {
        self.readings.push_back(Err(Error::hardware(message)));
        self
    }

    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

#[async_trait::async_trait]
impl Sensor for ScriptedSensor {
    async fn read(&mut self) -> Result<SensorReading> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.readings.pop_front() {
            Some(reading) => reading,
            None => std::future::pending().await,
        }
    }
}

/// An actuator whose state and history are visible to the test
#[derive(Clone, Default)]
pub struct SharedActuator {
    on: Arc<Mutex<bool>>,
    history: Arc<Mutex<Vec<bool>>>,
}

impl SharedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every value passed to `set`, in order
    pub fn history(&self) -> Vec<bool> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Actuator for SharedActuator {
    async fn set(&mut self, on: bool) -> Result<()> {
        *self.on.lock().unwrap() = on;
        self.history.lock().unwrap().push(on);
        Ok(())
    }

    fn is_on(&self) -> bool {
        *self.on.lock().unwrap()
    }
}

/// A notifier that records messages
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// A light clapper feed entry
pub fn light_entry(created_at: &str, location: &str, node_id: &str, status: i64) -> FeedEntry {
    FeedEntry::new(created_at)
        .with_field("field1", location)
        .with_field("field2", node_id)
        .with_field("field3", status)
}

/// Client configuration against a dummy channel
pub fn client_config(kind: NodeKind) -> ClientConfig {
    ClientConfig::new(kind, ChannelConfig::new("1150656").with_read_key("TESTKEY"))
}
