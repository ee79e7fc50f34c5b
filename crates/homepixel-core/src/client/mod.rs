//! Channel client loop
//!
//! The ChannelClient mirrors one remote channel into a local record store:
//! - Fetches the channel's entries via FeedSource
//! - Diffs them against the last entry seen (the cursor)
//! - Validates the new entries against the node schema
//! - Persists the valid ones via RecordStore
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ FeedSource  │─── Vec<FeedEntry> ───┐
//! └─────────────┘                      │
//!                                      ▼
//!                             ┌───────────────┐
//!                             │ ChannelClient │  cursor
//!                             └───────────────┘
//!                                      │
//!                  ┌───────────────────┼───────────────────┐
//!                  │                   │                   │
//!                  ▼                   ▼                   ▼
//!          ┌──────────────┐    ┌──────────────┐    ┌─────────────┐
//!          │ parse_entry  │    │ RecordStore  │    │   Events    │
//!          │ (validate)   │    │ (persist)    │    │  (notify)   │
//!          └──────────────┘    └──────────────┘    └─────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Fetch the feed list
//! 2. Empty list, or last entry equal to the cursor: nothing new
//! 3. Start one past the cursor's position, or at 0 if the cursor is unset
//!    or no longer in the list
//! 4. Validate each new entry; rejected entries are logged and dropped
//! 5. Move the cursor to the last raw entry
//! 6. Insert each valid record unless an identical row exists
//! 7. Sleep, repeat

use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::feed::{FeedEntry, parse_entry};
use crate::schema::{NodeSchema, StoredRecord};
use crate::traits::{FeedSource, PersistOutcome, RecordStore};

/// Events emitted by the ChannelClient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Client started
    Started { table: String },

    /// A cycle found new entries and persisted the valid ones
    CycleCompleted {
        parsed: usize,
        inserted: usize,
        duplicates: usize,
    },

    /// A cycle found nothing past the cursor
    NoNewData,

    /// A new entry failed validation and was dropped
    EntryRejected {
        entry_id: Option<u64>,
        reason: String,
    },

    /// A cycle failed; the loop carries on after the sleep
    CycleFailed { error: String },

    /// Client stopped
    Stopped { reason: String },
}

/// Lifecycle of a client loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Sleeping between cycles
    Idle,
    /// Inside a cycle
    Polling,
    /// Loop exited
    Stopped,
}

/// Poll-diff-persist loop for one channel
///
/// ## Lifecycle
///
/// 1. Create with [`ChannelClient::new()`], which also ensures the table
/// 2. Start with [`ChannelClient::run()`]
/// 3. The client polls until a shutdown signal is received
///
/// Shutdown is observed between cycles and during the sleep, never in the
/// middle of a cycle.
pub struct ChannelClient {
    /// Remote channel
    source: Box<dyn FeedSource>,

    /// Local table
    store: Box<dyn RecordStore>,

    schema: NodeSchema,

    /// Sleep between cycles
    poll_interval: Duration,

    /// Only fetch the last `n` entries
    fetch_limit: Option<u32>,

    /// Last raw entry of the most recent non-empty fetch
    cursor: Mutex<Option<FeedEntry>>,

    state: watch::Sender<ClientState>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ClientEvent>,
}

impl ChannelClient {
    /// Create a new client
    ///
    /// # Parameters
    ///
    /// - `source`: Remote channel reader
    /// - `store`: Record store for the node's table
    /// - `config`: Client configuration
    ///
    /// # Returns
    ///
    /// A tuple of (client, event_receiver) where event_receiver yields client events
    pub async fn new(
        source: Box<dyn FeedSource>,
        store: Box<dyn RecordStore>,
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>)> {
        config.validate()?;

        let schema = config.node_kind.schema();
        store.ensure_table().await?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let (state, _) = watch::channel(ClientState::Idle);

        let client = Self {
            source,
            store,
            schema,
            poll_interval: config.poll_interval(),
            fetch_limit: config.fetch_limit,
            cursor: Mutex::new(None),
            state,
            event_tx: tx,
        };

        Ok((client, rx))
    }

    /// Override the sleep between cycles
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Last raw entry seen
    pub async fn cursor(&self) -> Option<FeedEntry> {
        self.cursor.lock().await.clone()
    }

    pub fn schema(&self) -> &NodeSchema {
        &self.schema
    }

    /// Run the client
    ///
    /// Polls until Ctrl-C is received.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the client with a controlled shutdown signal
    ///
    /// # Parameters
    ///
    /// - `shutdown_rx`: Stops the loop when fired or dropped. `None` waits
    ///   for Ctrl-C like [`ChannelClient::run()`].
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        info!(
            "Client started for {} (every {:?})",
            self.schema.table, self.poll_interval
        );
        self.emit_event(ClientEvent::Started {
            table: self.schema.table.clone(),
        });

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            self.state.send_replace(ClientState::Polling);
            if let Err(e) = self.poll_cycle().await {
                error!("Cycle failed for {}: {}", self.schema.table, e);
                self.emit_event(ClientEvent::CycleFailed {
                    error: e.to_string(),
                });
            }
            self.state.send_replace(ClientState::Idle);

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.state.send_replace(ClientState::Stopped);
        self.emit_event(ClientEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
        info!("Client stopped for {}", self.schema.table);

        Ok(())
    }

    /// Run one fetch-diff-persist cycle
    ///
    /// # Returns
    ///
    /// What the store did with the new records (all zero when nothing was
    /// new).
    pub async fn poll_cycle(&self) -> Result<PersistOutcome> {
        let Some(records) = self.diff().await? else {
            debug!("No new data for {}", self.schema.table);
            self.emit_event(ClientEvent::NoNewData);
            return Ok(PersistOutcome::default());
        };

        let outcome = if records.is_empty() {
            PersistOutcome::default()
        } else {
            self.store.persist(&records).await?
        };

        info!(
            "{}: {} new record(s), {} inserted, {} duplicate(s)",
            self.schema.table,
            records.len(),
            outcome.inserted,
            outcome.duplicates
        );
        self.emit_event(ClientEvent::CycleCompleted {
            parsed: records.len(),
            inserted: outcome.inserted,
            duplicates: outcome.duplicates,
        });

        Ok(outcome)
    }

    /// Fetch the channel and return the valid records past the cursor
    ///
    /// Advances the cursor. Does not touch the store.
    pub async fn read_new_records(&self) -> Result<Vec<StoredRecord>> {
        Ok(self.diff().await?.unwrap_or_default())
    }

    /// `None` when nothing is past the cursor
    async fn diff(&self) -> Result<Option<Vec<StoredRecord>>> {
        let feeds = self.source.fetch(self.fetch_limit).await?;
        debug!(
            "Fetched {} entries from {}",
            feeds.len(),
            self.source.source_name()
        );

        let mut cursor = self.cursor.lock().await;

        let Some(last) = feeds.last() else {
            return Ok(None);
        };
        if cursor.as_ref() == Some(last) {
            return Ok(None);
        }

        let start = match cursor.as_ref() {
            Some(seen) => match feeds.iter().position(|entry| entry == seen) {
                Some(idx) => idx + 1,
                None => {
                    warn!("Cursor no longer in the feed list, re-reading all entries");
                    0
                }
            },
            None => 0,
        };

        let mut records = Vec::with_capacity(feeds.len() - start);
        for entry in &feeds[start..] {
            match parse_entry(&self.schema, entry) {
                Ok(record) => {
                    debug!("Parsed {} {}", record.date, record.time);
                    records.push(record);
                }
                Err(e) => {
                    warn!("Rejected entry {:?}: {}", entry.entry_id, e);
                    self.emit_event(ClientEvent::EntryRejected {
                        entry_id: entry.entry_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        *cursor = Some(last.clone());
        Ok(Some(records))
    }

    /// Emit a client event
    fn emit_event(&self, event: ClientEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("No event receiver, dropping event");
            }
        }
    }
}
