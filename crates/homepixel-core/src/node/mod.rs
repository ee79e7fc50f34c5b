// # Node Loop
//
// Drives one physical node: read the sensor, decide the actuator state and
// optionally publish the new state to the node's channel.
//
// ## Behaviour per node type
//
// - LightClapper: a clap inverts the LED; the new state is published
// - SecuritySystem: motion triggers a recording, an alert and a publish of
//   the detection time
// - TempSensor: the fan runs iff the reading is above the threshold; every
//   reading is published
//
// ## Shutdown
//
// Outputs are switched off on every exit path. A LightClapper that publishes
// also publishes its final (off) state.

use chrono::Local;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::schema::{
    LOCATION_COLUMN, NODE_ID_COLUMN, NodeKind, NodeSchema, STATUS_OFF, STATUS_ON, TimestampSource,
};
use crate::traits::{Actuator, ChannelFields, ChannelPublisher, Notifier, Sensor, SensorReading};

/// Sleep after an idle digital read
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Length of a security camera recording
const CAMERA_RECORD_TIME: Duration = Duration::from_secs(10);

/// Sleeps between sensor reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeTiming {
    /// After a toggle, a detection or a temperature reading
    pub settle: Duration,
    /// After a digital read that detected nothing
    pub idle: Duration,
    /// How long the camera records after a detection
    pub record: Duration,
}

impl NodeTiming {
    /// Timing used by the deployed nodes
    pub fn for_kind(kind: NodeKind) -> Self {
        let settle = match kind {
            NodeKind::LightClapper => Duration::from_millis(500),
            NodeKind::SecuritySystem => Duration::from_millis(3500),
            NodeKind::TempSensor => Duration::from_secs(5),
        };
        let record = match kind {
            NodeKind::SecuritySystem => CAMERA_RECORD_TIME,
            _ => Duration::ZERO,
        };
        Self {
            settle,
            idle: IDLE_POLL,
            record,
        }
    }

    /// No sleeping at all
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            idle: Duration::ZERO,
            record: Duration::ZERO,
        }
    }
}

/// Sensor/actuator loop for one node
pub struct NodeLoop {
    config: NodeConfig,
    schema: NodeSchema,
    sensor: Box<dyn Sensor>,
    actuator: Box<dyn Actuator>,
    publisher: Box<dyn ChannelPublisher>,
    notifier: Option<Box<dyn Notifier>>,
    timing: NodeTiming,
}

impl NodeLoop {
    /// Create a node loop
    ///
    /// `publisher` is only used when `config.write_enabled` is set.
    pub fn new(
        config: NodeConfig,
        sensor: Box<dyn Sensor>,
        actuator: Box<dyn Actuator>,
        publisher: Box<dyn ChannelPublisher>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            schema: config.node_kind.schema(),
            timing: NodeTiming::for_kind(config.node_kind),
            config,
            sensor,
            actuator,
            publisher,
            notifier: None,
        })
    }

    /// Alert channel for detections
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_timing(mut self, timing: NodeTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Run until Ctrl-C, then switch outputs off
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run until `shutdown_rx` fires (or Ctrl-C when `None`)
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        info!(
            "{} running at {} (write mode: {})",
            self.config.node_id, self.config.location, self.config.write_enabled
        );

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

        let result = loop {
            let reading = tokio::select! {
                reading = self.sensor.read() => reading,
                _ = &mut shutdown => break Ok(()),
            };

            let reading = match reading {
                Ok(reading) => reading,
                Err(e) => break Err(e),
            };

            // A detection may hold the camera on for a while
            let pause = tokio::select! {
                handled = self.handle_reading(reading) => match handled {
                    Ok(pause) => pause,
                    Err(e) => break Err(e),
                },
                _ = &mut shutdown => break Ok(()),
            };

            if pause.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = &mut shutdown => break Ok(()),
            }
        };

        match &result {
            Ok(()) => info!("Exiting"),
            Err(e) => error!("{} stopped: {}", self.config.node_id, e),
        }

        self.shut_down_outputs().await;
        result
    }

    /// Act on one sensor reading
    ///
    /// # Returns
    ///
    /// How long to sleep before the next read.
    pub async fn handle_reading(&mut self, reading: SensorReading) -> Result<Duration> {
        match (self.config.node_kind, reading) {
            (NodeKind::LightClapper, SensorReading::Detected(true)) => {
                let on = !self.actuator.is_on();
                self.actuator.set(on).await?;
                info!("Clap detected, light {}", if on { "on" } else { "off" });

                if self.config.write_enabled {
                    self.publish_status(None).await;
                }
                Ok(self.timing.settle)
            }

            (NodeKind::SecuritySystem, SensorReading::Detected(true)) => {
                let now = Local::now();
                let date = now.format("%Y-%m-%d").to_string();
                let time = now.format("%H:%M:%S").to_string();
                info!("Motion detected at {} {}", date, time);

                self.actuator.set(true).await?;
                debug!("Recording for {:?}", self.timing.record);
                tokio::time::sleep(self.timing.record).await;
                self.actuator.set(false).await?;

                if let Some(notifier) = &self.notifier {
                    let message = format!("Motion Detected at {} {}", date, time);
                    if let Err(e) = notifier.notify(&message).await {
                        warn!("Failed to send alert: {}", e);
                    }
                }

                if self.config.write_enabled {
                    self.publish_status(Some(format!("{} {}", date, time))).await;
                }
                Ok(self.timing.settle)
            }

            (NodeKind::TempSensor, SensorReading::Value(temp)) => {
                let hot = temp > self.config.temp_threshold;
                info!(
                    "Temperature {}, fan {}",
                    temp,
                    if hot { "on" } else { "off" }
                );
                self.actuator.set(hot).await?;

                if self.config.write_enabled {
                    self.publish_reading(temp).await;
                }
                Ok(self.timing.settle)
            }

            (NodeKind::LightClapper | NodeKind::SecuritySystem, SensorReading::Detected(false)) => {
                Ok(self.timing.idle)
            }

            (kind, reading) => Err(Error::hardware(format!(
                "{} cannot handle reading {:?}",
                kind, reading
            ))),
        }
    }

    /// Fields common to every publish
    fn base_fields(&self) -> ChannelFields {
        let mut fields = ChannelFields::new();
        if let Some(column) = self.schema.column(LOCATION_COLUMN) {
            fields.insert(column.field.to_string(), self.config.location.clone());
        }
        if let Some(column) = self.schema.column(NODE_ID_COLUMN) {
            fields.insert(column.field.to_string(), self.config.node_id.to_string());
        }
        fields
    }

    fn status_value(&self) -> String {
        let status = if self.actuator.is_on() { STATUS_ON } else { STATUS_OFF };
        status.to_string()
    }

    /// Publish the actuator state, or the detection time for schemas that
    /// take their timestamp from a field
    async fn publish_status(&self, detected_at: Option<String>) {
        let mut fields = self.base_fields();

        if let Some(column) = self.schema.status_column() {
            fields.insert(column.field.to_string(), self.status_value());
        }
        if let (TimestampSource::Field(field), Some(at)) = (self.schema.timestamp, detected_at) {
            fields.insert(field.to_string(), at);
        }

        self.publish(&fields).await;
    }

    async fn publish_reading(&self, value: f64) {
        let mut fields = self.base_fields();

        if let Some(column) = self.schema.status_column() {
            fields.insert(column.field.to_string(), self.status_value());
        }
        if let Some(column) = self.schema.value_column() {
            fields.insert(column.field.to_string(), value.to_string());
        }

        self.publish(&fields).await;
    }

    async fn publish(&self, fields: &ChannelFields) {
        let response = self.publisher.publish(fields).await;
        if response.is_success() {
            debug!("Published {} field(s)", fields.len());
        } else {
            error!(
                "Write to channel was unsuccessful: {:?} {:?}",
                response.status, response.reason
            );
        }
    }

    async fn shut_down_outputs(&mut self) {
        if let Err(e) = self.actuator.set(false).await {
            error!("Failed to switch {} off: {}", self.config.node_id, e);
        }

        if self.config.node_kind == NodeKind::LightClapper && self.config.write_enabled {
            self.publish_status(None).await;
        }
    }
}
