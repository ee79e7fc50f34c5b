// # homepixeld - HomePixel Client Daemon
//
// Mirrors one node type's ThingSpeak channel into its local SQLite table.
//
// The homepixeld daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the ThingSpeak reader and the SQLite store into a client loop
// 4. Running the loop until SIGTERM/SIGINT
//
// All polling, diffing and persistence logic lives in homepixel-core.
//
// ## Configuration
//
// - `HOMEPIXEL_NODE_KIND`: lightclapper, securitysystem or tempsensor (required)
// - `HOMEPIXEL_FEED_ID`: ThingSpeak channel id (required)
// - `HOMEPIXEL_READ_KEY`: Channel read key
// - `HOMEPIXEL_BASE_URL`: API root (default https://api.thingspeak.com)
// - `HOMEPIXEL_DB_PATH`: SQLite file (default `<kind>.db`)
// - `HOMEPIXEL_POLL_INTERVAL_SECS`: Sleep between cycles (default 5, tempsensor 10)
// - `HOMEPIXEL_FETCH_LIMIT`: Only fetch the last n entries (field1 only)
// - `HOMEPIXEL_HTTP_TIMEOUT_SECS`: Request timeout (default 30)
// - `HOMEPIXEL_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export HOMEPIXEL_NODE_KIND=lightclapper
// export HOMEPIXEL_FEED_ID=1150656
// export HOMEPIXEL_READ_KEY=your_read_key
// export HOMEPIXEL_DB_PATH=/var/lib/homepixel/lightclapper.db
//
// homepixeld
// ```

use anyhow::{Context, Result};
use homepixel_core::store::SqliteRecordStore;
use homepixel_core::{ChannelClient, ChannelConfig, ClientConfig, ClientEvent, NodeKind};
use homepixel_thingspeak::ThingSpeakReader;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum HomePixelExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<HomePixelExitCode> for ExitCode {
    fn from(code: HomePixelExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    client: ClientConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let node_kind: NodeKind = lookup("HOMEPIXEL_NODE_KIND")
            .context("HOMEPIXEL_NODE_KIND is required (lightclapper, securitysystem, tempsensor)")?
            .parse()?;

        let mut channel = ChannelConfig::new(lookup("HOMEPIXEL_FEED_ID").unwrap_or_default())
            .with_read_key(lookup("HOMEPIXEL_READ_KEY").unwrap_or_default());
        if let Some(base_url) = lookup("HOMEPIXEL_BASE_URL") {
            channel = channel.with_base_url(base_url);
        }

        let mut client = ClientConfig::new(node_kind, channel);
        client.database_path = lookup("HOMEPIXEL_DB_PATH").map(PathBuf::from);
        client.poll_interval_secs = parse_var(&lookup, "HOMEPIXEL_POLL_INTERVAL_SECS")?;
        client.fetch_limit = parse_var(&lookup, "HOMEPIXEL_FETCH_LIMIT")?;
        if let Some(timeout) = parse_var(&lookup, "HOMEPIXEL_HTTP_TIMEOUT_SECS")? {
            client.http_timeout_secs = timeout;
        }

        Ok(Self {
            client,
            log_level: lookup("HOMEPIXEL_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.client.channel.feed_id.is_empty() {
            anyhow::bail!(
                "HOMEPIXEL_FEED_ID is required. \
                Set it via: export HOMEPIXEL_FEED_ID=your_channel_id"
            );
        }

        if let Some(interval) = self.client.poll_interval_secs
            && !(1..=3600).contains(&interval)
        {
            anyhow::bail!(
                "HOMEPIXEL_POLL_INTERVAL_SECS must be between 1 and 3600 seconds. Got: {}",
                interval
            );
        }

        if !(1..=300).contains(&self.client.http_timeout_secs) {
            anyhow::bail!(
                "HOMEPIXEL_HTTP_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.client.http_timeout_secs
            );
        }

        if self.client.fetch_limit.is_some() {
            eprintln!(
                "WARNING: HOMEPIXEL_FETCH_LIMIT reads only field1 per entry. \
                Entries without every field are rejected."
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "HOMEPIXEL_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.client.validate()?;
        Ok(())
    }
}

/// Parse an optional numeric variable, rejecting malformed values
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{} is not a valid number: '{}'", name, raw))
        })
        .transpose()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return HomePixelExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return HomePixelExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return HomePixelExitCode::ConfigError.into();
    }

    info!("Starting homepixeld for {}", config.client.node_kind);
    debug!("Configuration: {:?}", config.client);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HomePixelExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            HomePixelExitCode::RuntimeError
        } else {
            HomePixelExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let client_config = config.client;

    let reader = ThingSpeakReader::from_config(&client_config)?;
    let store =
        SqliteRecordStore::new(client_config.database_path(), client_config.node_kind.schema())
            .await?;
    info!("Using database {}", store.path().display());

    let (client, events) =
        ChannelClient::new(Box::new(reader), Box::new(store), &client_config).await?;
    tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    client.run_with_shutdown(Some(shutdown_rx)).await?;
    info!("Shutting down daemon");

    Ok(())
}

/// Surface client events in the log
async fn log_events(mut events: mpsc::Receiver<ClientEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::CycleFailed { error } => warn!("Cycle failed: {}", error),
            other => debug!("Client event: {:?}", other),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
