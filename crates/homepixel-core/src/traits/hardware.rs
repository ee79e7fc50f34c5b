// # Hardware Collaborators
//
// Node programs talk to their sensor and actuator through these traits.
// Concrete GPIO, camera and SMS/email bindings live outside this workspace;
// the node loop only depends on the control contract.

use async_trait::async_trait;

/// A single sensor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    /// Digital input (clap heard, motion seen)
    Detected(bool),
    /// Analogue reading (temperature)
    Value(f64),
}

/// Input capability of a node
#[async_trait]
pub trait Sensor: Send + Sync {
    /// Sample the input once
    async fn read(&mut self) -> Result<SensorReading, crate::Error>;
}

/// Output capability of a node
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Drive the output on or off
    async fn set(&mut self, on: bool) -> Result<(), crate::Error>;

    /// Current output state
    fn is_on(&self) -> bool;
}

/// Out-of-band alert capability (SMS, email)
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send an alert
    async fn notify(&self, message: &str) -> Result<(), crate::Error>;
}
