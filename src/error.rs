//! Custom error types for the acquisition core.
//!
//! This module defines the primary error type, `AcquisitionError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the failures that can occur while configuring a recording, opening a device channel,
//! or loading configuration.
//!
//! ## Error Hierarchy
//!
//! - **`Channel`**: The device channel refused to activate or deactivate. Raised
//!   synchronously from `connect()` and surfaced to the caller.
//! - **`InvalidConfiguration`**: An out-of-range timing value (e.g. a zero scan interval)
//!   or a semantically invalid configuration file.
//! - **`InvalidState`**: An operation was requested in a lifecycle state that does not
//!   allow it (e.g. executing an acquisition run twice).
//! - **`Config`**: Wraps `figment::Error` from parsing/extracting configuration.
//!
//! [`DeliveryFailure`] is not a variant: failures reported asynchronously
//! by the channel are swallowed at the controller boundary and only observable through
//! logging, the failure counter and the optional failure hook.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, AcquisitionError>;

// =============================================================================
// Channel Errors
// =============================================================================

/// Why a device channel rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelErrorKind {
    /// The communication medium (or this channel) is already closed.
    Closed,
    /// The transport refused the activation request.
    Rejected,
    /// Any other transport-level failure.
    Transport,
}

impl std::fmt::Display for ChannelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChannelErrorKind::Closed => "closed",
            ChannelErrorKind::Rejected => "rejected",
            ChannelErrorKind::Transport => "transport",
        };
        write!(f, "{}", label)
    }
}

/// Synchronous failure to open or close a device channel.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Channel '{channel}' {kind} error: {message}")]
pub struct ChannelError {
    /// Channel identifier.
    pub channel: String,
    /// Failure category.
    pub kind: ChannelErrorKind,
    /// Transport-provided detail.
    pub message: String,
}

impl ChannelError {
    /// Build a channel error.
    pub fn new(
        channel: impl Into<String>,
        kind: ChannelErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a [`ChannelErrorKind::Closed`] error.
    pub fn closed(channel: impl Into<String>) -> Self {
        Self::new(channel, ChannelErrorKind::Closed, "channel is closed")
    }
}

// =============================================================================
// Delivery Failures
// =============================================================================

/// Category of an asynchronous delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailureKind {
    /// The asynchronous read from the device failed.
    Read,
    /// A frame arrived but could not be decoded into samples.
    Decode,
}

impl std::fmt::Display for DeliveryFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryFailureKind::Read => write!(f, "read"),
            DeliveryFailureKind::Decode => write!(f, "decode"),
        }
    }
}

/// A failed batch delivery reported by the channel's completion handler.
///
/// Best-effort: acquisition continues when individual batches are lost.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Sample delivery {kind} failure: {message}")]
pub struct DeliveryFailure {
    /// Failure category.
    pub kind: DeliveryFailureKind,
    /// Transport-provided detail.
    pub message: String,
}

impl DeliveryFailure {
    /// Build a delivery failure.
    pub fn new(kind: DeliveryFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

// =============================================================================
// Crate Error
// =============================================================================

/// Primary error type for the acquisition core.
///
/// There is no fatal class: every variant is recoverable by correcting the input
/// or retrying the corresponding operation.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// The device channel refused a request.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// An out-of-range value or invalid configuration file.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The operation is not allowed in the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration could not be loaded or extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for AcquisitionError {
    fn from(value: figment::Error) -> Self {
        AcquisitionError::Config(Box::new(value))
    }
}

impl AcquisitionError {
    /// Whether retrying the same operation may succeed without changing inputs.
    pub fn is_transient(&self) -> bool {
        match self {
            AcquisitionError::Channel(err) => err.kind != ChannelErrorKind::Closed,
            AcquisitionError::InvalidConfiguration(_)
            | AcquisitionError::InvalidState(_)
            | AcquisitionError::Config(_) => false,
        }
    }
}
