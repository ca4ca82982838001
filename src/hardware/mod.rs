//! Device Channel Layer
//!
//! Traits describing the device communication channel, a description of the controlled
//! device, and a simulated channel for tests and demos.

pub mod capabilities;
pub mod mock;

pub use capabilities::{SampleHandler, SampleSource};
pub use mock::{MockSampleSource, SignalPattern};

use serde::{Deserialize, Serialize};

/// Description of one controlled device.
///
/// The controller holds it behind an `Arc` and never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDevice {
    /// Unique identifier; also names the device's recording.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Channel address understood by the communication layer (opaque here).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl ControlDevice {
    /// Device named after its id, without an address.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            address: None,
        }
    }

    /// Set the human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the channel address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}
